//! Recurring poll alarm.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::pipeline::{PollOutcome, PollPipeline};

pub const POLL_ALARM_NAME: &str = "security-code-poll";

struct Alarm {
    period: Duration,
    handle: JoinHandle<()>,
}

/// Owns the single named alarm that fires poll cycles.
///
/// Every poll runs in its own task, so re-arming the alarm never cancels a
/// cycle that is already in flight.
pub struct PollScheduler {
    pipeline: Arc<PollPipeline>,
    alarm: Mutex<Option<Alarm>>,
}

impl PollScheduler {
    pub fn new(pipeline: Arc<PollPipeline>) -> Self {
        Self {
            pipeline,
            alarm: Mutex::new(None),
        }
    }

    pub fn period_for(interval_minutes: u32) -> Duration {
        Duration::from_secs(u64::from(interval_minutes.max(1)) * 60)
    }

    /// Arm the alarm, replacing any previous one. The first firing is one
    /// period from now.
    pub fn schedule(&self, interval_minutes: u32) -> Duration {
        let period = Self::period_for(interval_minutes);
        let pipeline = self.pipeline.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                tracing::debug!("Alarm {} fired", POLL_ALARM_NAME);
                spawn_poll(pipeline.clone());
            }
        });

        if let Some(previous) = self.slot().replace(Alarm { period, handle }) {
            previous.handle.abort();
        }

        tracing::info!(
            "Alarm {} armed (every {} min)",
            POLL_ALARM_NAME,
            period.as_secs() / 60
        );
        period
    }

    /// Arm the alarm and run one poll right away
    pub fn activate(&self, interval_minutes: u32) -> JoinHandle<PollOutcome> {
        self.schedule(interval_minutes);
        self.trigger()
    }

    /// Run one poll outside the alarm
    pub fn trigger(&self) -> JoinHandle<PollOutcome> {
        spawn_poll(self.pipeline.clone())
    }

    pub fn cancel(&self) {
        if let Some(alarm) = self.slot().take() {
            alarm.handle.abort();
            tracing::info!("Alarm {} cleared", POLL_ALARM_NAME);
        }
    }

    pub fn period(&self) -> Option<Duration> {
        self.slot().as_ref().map(|alarm| alarm.period)
    }

    pub fn is_armed(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Alarm>> {
        self.alarm.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(alarm) = self.slot().take() {
            alarm.handle.abort();
        }
    }
}

fn spawn_poll(pipeline: Arc<PollPipeline>) -> JoinHandle<PollOutcome> {
    tokio::spawn(async move {
        let outcome = pipeline.run_poll().await;
        tracing::debug!("Poll finished: {}", outcome);
        outcome
    })
}
