//! Live options and the config file watcher that feeds them.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use shared_types::Options;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::scheduler::PollScheduler;

const CONFIG_DEBOUNCE: Duration = Duration::from_millis(250);

/// Current options, shared with the dispatcher through a watch channel
pub struct Settings {
    options: watch::Sender<Options>,
    scheduler: Arc<PollScheduler>,
}

impl Settings {
    pub fn new(options: watch::Sender<Options>, scheduler: Arc<PollScheduler>) -> Self {
        options.send_modify(|current| *current = current.clone().normalized());
        Self { options, scheduler }
    }

    pub fn current(&self) -> Options {
        self.options.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Options> {
        self.options.subscribe()
    }

    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    /// Replace the options wholesale. The alarm is re-armed when the
    /// interval changed. Returns the options as stored.
    pub fn replace(&self, options: Options) -> Options {
        let options = options.normalized();
        let previous = self.options.send_replace(options.clone());

        if previous.poll_interval_minutes != options.poll_interval_minutes {
            tracing::info!(
                "Poll interval changed from {} to {} min",
                previous.poll_interval_minutes,
                options.poll_interval_minutes
            );
            self.scheduler.schedule(options.poll_interval_minutes);
        }

        options
    }

    /// Re-arm the alarm with the current interval
    pub fn reschedule(&self) -> Duration {
        self.scheduler.schedule(self.current().poll_interval_minutes)
    }

    /// Arm the alarm and poll once now
    pub fn activate(&self) {
        self.scheduler.activate(self.current().poll_interval_minutes);
    }
}

/// Watch the directory holding `path` and signal whenever the file changes.
///
/// The directory is watched rather than the file because editors often
/// save by replacing it.
pub fn watch_config(path: &Path) -> notify::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let file_name = path.file_name().map(|n| n.to_os_string());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        let touches_config = event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
        if touches_config {
            let _ = tx.send(());
        }
    })?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    Ok((watcher, rx))
}

/// Reload the config on every signal and apply its `[options]` section.
/// Runs until the sending side is dropped.
pub async fn follow_config_changes(
    settings: Arc<Settings>,
    path: PathBuf,
    mut changes: mpsc::UnboundedReceiver<()>,
) {
    while changes.recv().await.is_some() {
        // One save produces a burst of events
        tokio::time::sleep(CONFIG_DEBOUNCE).await;
        while changes.try_recv().is_ok() {}

        match Config::load(&path) {
            Ok(config) if config.options == settings.current() => {
                tracing::debug!("Config saved, options unchanged");
            }
            Ok(config) => {
                let applied = settings.replace(config.options);
                tracing::info!("Options reloaded from {}: {:?}", path.display(), applied);
            }
            Err(e) => tracing::warn!("Ignoring config change: {:#}", e),
        }
    }
}
