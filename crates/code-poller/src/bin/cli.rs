use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use code_poller::dispatch::{ClipboardSink, SystemClipboard};
use reqwest::Client;
use shared_types::{LastCodeView, MessageResponse, Options, RuntimeMessage, ToastPosition};

#[derive(Parser)]
#[command(name = "code-cli")]
#[command(about = "CLI for the code poller: check for a code, show the last one, edit options")]
struct Cli {
    /// Code poller server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://127.0.0.1:8787",
        env = "CODE_POLLER_URL"
    )]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll Gmail now and report whether the check succeeded
    Check,

    /// Show the most recently surfaced code and when it arrived
    Last {
        /// Also copy the code to the clipboard
        #[arg(short, long)]
        copy: bool,
    },

    /// Show or change the poller options
    Options {
        #[command(subcommand)]
        action: OptionsAction,
    },
}

#[derive(Subcommand)]
enum OptionsAction {
    /// Print the current options
    Show,

    /// Change one or more options. Unspecified options keep their value.
    Set {
        /// Minutes between polls (minimum 1)
        #[arg(short, long, value_name = "MINUTES")]
        interval: Option<u32>,

        /// Show a desktop notification for new codes
        #[arg(long, value_name = "BOOL")]
        desktop: Option<bool>,

        /// Show a toast in the active browser tab for new codes
        #[arg(long, value_name = "BOOL")]
        toast: Option<bool>,

        /// Toast corner: topRight, topLeft, bottomRight or bottomLeft
        #[arg(short, long, value_parser = parse_position)]
        position: Option<ToastPosition>,
    },
}

fn parse_position(s: &str) -> Result<ToastPosition, String> {
    ToastPosition::from_str(s).ok_or_else(|| {
        format!(
            "unknown position '{}', expected topRight, topLeft, bottomRight or bottomLeft",
            s
        )
    })
}

/// Age of a code the way the popup shows it
fn format_age(received_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(received_at);
    if age.num_seconds() < 60 {
        return "Just now".to_string();
    }
    if age.num_minutes() < 60 {
        return format!("{} min ago", age.num_minutes());
    }

    let local = received_at.with_timezone(&Local);
    if age.num_hours() < 24 {
        local.format("%H:%M").to_string()
    } else {
        local.format("%b %-d, %H:%M").to_string()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Check => check(&client, &cli.base_url).await?,
        Commands::Last { copy } => last(&client, &cli.base_url, copy).await?,
        Commands::Options { action } => handle_options(&client, &cli.base_url, action).await?,
    }

    Ok(())
}

async fn check(client: &Client, base_url: &str) -> anyhow::Result<()> {
    println!("Checking for a new code...");
    let response: MessageResponse = client
        .post(format!("{}/api/messages", base_url))
        .json(&RuntimeMessage::CheckNow)
        .send()
        .await
        .context("Failed to reach the code poller")?
        .error_for_status()?
        .json()
        .await?;

    if response.ok {
        println!("Check complete.");
        last(client, base_url, false).await
    } else {
        anyhow::bail!(
            "Check failed: {}",
            response.error.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

async fn last(client: &Client, base_url: &str, copy: bool) -> anyhow::Result<()> {
    let view: LastCodeView = client
        .get(format!("{}/api/last-code", base_url))
        .send()
        .await
        .context("Failed to reach the code poller")?
        .error_for_status()?
        .json()
        .await?;

    match view.last_code {
        Some(code) => {
            println!("{}", code);
            if let Some(at) = view.last_received_at {
                println!("    {}", format_age(at, Utc::now()));
            }
            if copy {
                SystemClipboard::new().copy(&code).await?;
                println!("Copied to clipboard.");
            }
        }
        None => println!("No code received yet."),
    }
    Ok(())
}

async fn handle_options(
    client: &Client,
    base_url: &str,
    action: OptionsAction,
) -> anyhow::Result<()> {
    let url = format!("{}/api/options", base_url);

    let options = match action {
        OptionsAction::Show => client
            .get(&url)
            .send()
            .await
            .context("Failed to reach the code poller")?
            .error_for_status()?
            .json::<Options>()
            .await?,
        OptionsAction::Set {
            interval,
            desktop,
            toast,
            position,
        } => {
            let mut options: Options = client
                .get(&url)
                .send()
                .await
                .context("Failed to reach the code poller")?
                .error_for_status()?
                .json()
                .await?;

            if let Some(minutes) = interval {
                options.poll_interval_minutes = minutes;
            }
            if let Some(enabled) = desktop {
                options.notify_desktop = enabled;
            }
            if let Some(enabled) = toast {
                options.notify_toast = enabled;
            }
            if let Some(position) = position {
                options.toast_position = position;
            }

            let saved: Options = client
                .put(&url)
                .json(&options)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("Options saved.");
            saved
        }
    };

    println!("Poll interval:  {} min", options.poll_interval_minutes);
    println!("Desktop:        {}", on_off(options.notify_desktop));
    println!("Toast:          {}", on_off(options.notify_toast));
    println!("Toast position: {}", options.toast_position.as_str());
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
