use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use code_poller::config::Config;
use code_poller::dispatch::{
    DesktopSink, HttpPageBridge, NotificationDispatcher, SystemClipboard, SystemNotifier,
};
use code_poller::gateway::{GmailRestClient, GoogleTokenProvider, MailGateway, TokenProvider};
use code_poller::pipeline::PollPipeline;
use code_poller::scheduler::PollScheduler;
use code_poller::server::{build_router, AppState};
use code_poller::settings::{follow_config_changes, watch_config, Settings};
use code_poller::state::JsonFileStore;

#[derive(Parser)]
#[command(name = "code-poller")]
#[command(about = "Polls Gmail for security code emails and surfaces the newest code")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(
        short,
        long,
        default_value = "code-poller.toml",
        env = "CODE_POLLER_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start polling and serve the local API (default)
    Run,

    /// Authorize Gmail access in the browser and cache the token
    Connect,

    /// Print an example configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_poller=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cli.config).await,
        Command::Connect => connect(&cli.config).await,
        Command::InitConfig => {
            print!("{}", Config::example().to_toml()?);
            Ok(())
        }
    }
}

fn token_provider(config: &Config) -> GoogleTokenProvider {
    GoogleTokenProvider::new(
        config.gmail.credentials_path.clone(),
        config.gmail.token_cache_path.clone(),
    )
}

async fn connect(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let tokens = token_provider(&config);

    println!("Opening Google consent flow for Gmail read access...");
    tokens
        .token(true)
        .await
        .context("Gmail authorization failed")?;

    println!(
        "Gmail connected. Token cached at {}",
        config.gmail.token_cache_path.display()
    );
    Ok(())
}

async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    tracing::info!("Starting code poller ({})", config.search_query().expression());

    let (options_tx, options_rx) = watch::channel(config.options.clone());

    let mail = GmailRestClient::new(&config.gmail.api_base, config.request_timeout())
        .context("Failed to create Gmail client")?;
    let gateway = MailGateway::new(
        Arc::new(token_provider(&config)),
        Arc::new(mail),
        config.search_query(),
    );

    let store = Arc::new(JsonFileStore::new(config.state.path.clone()));
    tracing::info!("Seen state at {}", config.state.path.display());

    let desktop = DesktopSink::new(Arc::new(SystemNotifier::new("code-poller")))
        .with_clipboard(Arc::new(SystemClipboard::new()));
    let mut dispatcher = NotificationDispatcher::new(options_rx).with_desktop_sink(desktop);
    if let Some(bridge) = &config.bridge {
        let bridge = HttpPageBridge::new(&bridge.url, Duration::from_secs(bridge.timeout_secs))
            .context("Failed to create page bridge client")?;
        dispatcher = dispatcher.with_toast(Arc::new(bridge));
    } else {
        tracing::info!("No page bridge configured, toasts disabled");
    }

    let pipeline = Arc::new(PollPipeline::new(gateway, store, dispatcher));
    let scheduler = Arc::new(PollScheduler::new(pipeline.clone()));
    let settings = Arc::new(Settings::new(options_tx, scheduler));

    settings.activate();

    // Keep the watcher alive for the lifetime of the server
    let _watcher = match watch_config(config_path) {
        Ok((watcher, changes)) => {
            tokio::spawn(follow_config_changes(
                settings.clone(),
                config_path.to_path_buf(),
                changes,
            ));
            Some(watcher)
        }
        Err(e) => {
            tracing::warn!("Config file changes will not be picked up: {}", e);
            None
        }
    };

    let app = build_router(
        AppState {
            pipeline,
            settings: settings.clone(),
        },
        &config.server.allowed_origins,
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Server listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    settings.scheduler().cancel();
    tracing::info!("Code poller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, stopping...");
}
