use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use frigate_api::FrigateClient;
use frigate_relay::bot::BotService;
use frigate_relay::bus::EventBusSubscriber;
use frigate_relay::config::{AppConfig, DEFAULT_CONFIG_FILE};
use frigate_relay::health::HealthMonitor;
use frigate_relay::notification::{TelegramChannel, TelegramConfig};
use frigate_relay::relay::RelayPipeline;
use frigate_relay::state::SharedState;
use frigate_relay::{logging, panic_hook};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grace period for background tasks after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "frigate-relay", version, about = "Frigate events to Telegram")]
struct Args {
    /// Path to the JSON config file.
    #[arg(short, long, env = "FRIGATE_RELAY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    let logging_guard = logging::init_logging(&config.logging)?;
    panic_hook::install();

    info!(
        config = %args.config.display(),
        bot_token = %mask_secret(&config.telegram.bot_token),
        chat_id = %config.chat_id(),
        thread_id = ?config.telegram.message_thread_id,
        mqtt = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        topic = %config.mqtt.events_topic(),
        frigate = %config.frigate_api.base_url,
        labels = ?config.filters.allowed_labels,
        zones = ?config.filters.allowed_zones,
        "Starting frigate-relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = SharedState::new();
    let frigate = Arc::new(
        FrigateClient::new(
            &config.frigate_api.base_url,
            config.frigate_api.request_timeout(),
        )
        .context("failed to build Frigate API client")?,
    );
    let telegram = Arc::new(
        TelegramChannel::new(TelegramConfig::from_settings(&config.telegram))
            .context("failed to build Telegram client")?,
    );

    let pipeline = RelayPipeline::new(
        config.filters.clone(),
        state.mute.clone(),
        state.dedup.clone(),
        frigate.clone(),
        telegram.clone(),
    )
    .with_timeouts(
        config.notifications.enrichment_timeout(),
        config.notifications.dispatch_timeout(),
    );

    let cancel_token = CancellationToken::new();

    let bus = EventBusSubscriber::new(
        config.mqtt.clone(),
        Arc::new(pipeline),
        state.connectivity.clone(),
        telegram.clone(),
    )
    .spawn(cancel_token.clone());

    let health = HealthMonitor::new(
        frigate.clone(),
        state.connectivity.clone(),
        telegram.clone(),
        config.frigate_api.health_check_interval(),
    )
    .spawn(cancel_token.clone());

    let bot = Arc::new(BotService::new(
        telegram,
        frigate,
        state.mute.clone(),
        state.connectivity.clone(),
        config.filters.clone(),
        config.notifications.default_mute_minutes,
    ))
    .spawn(cancel_token.clone());

    logging_guard.start_retention_cleanup(cancel_token.clone());

    shutdown_signal().await;
    cancel_token.cancel();

    let join_all = async {
        let _ = tokio::join!(bus, health, bot);
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, join_all).await.is_err() {
        warn!("Background tasks did not stop within {:?}", SHUTDOWN_GRACE);
    }

    info!("frigate-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Keep the bot id, hide the secret half of a `<id>:<secret>` token.
fn mask_secret(token: &str) -> String {
    match token.split_once(':') {
        Some((id, _)) => format!("{id}:***"),
        None => "***".to_string(),
    }
}
