//! Periodic liveness probe of the Frigate HTTP API.
//!
//! Each tick writes the media-API connectivity state and pushes a chat
//! message when the rendered status changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use frigate_api::{FrigateClient, HealthProbe};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notification::Dispatcher;
use crate::relay::with_timeout;
use crate::state::{ConnectivityReporter, Dependency};

pub const RECOVERED_PREFIX: &str = "✅ Frigate восстановился.\n";
pub const UNREACHABLE_PREFIX: &str = "⚠️ Frigate HTTP API недоступен.\n";

const STATUS_SEND_TIMEOUT: Duration = Duration::from_secs(8);

/// A dependency that can be asked whether it is alive.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self) -> HealthProbe;
}

#[async_trait]
impl LivenessProbe for FrigateClient {
    async fn probe(&self) -> HealthProbe {
        self.check_health().await
    }
}

pub struct HealthMonitor {
    probe: Arc<dyn LivenessProbe>,
    connectivity: Arc<dyn ConnectivityReporter>,
    notifier: Arc<dyn Dispatcher>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        probe: Arc<dyn LivenessProbe>,
        connectivity: Arc<dyn ConnectivityReporter>,
        notifier: Arc<dyn Dispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            probe,
            connectivity,
            notifier,
            interval,
        }
    }

    /// Probe once. Returns the message pushed to the chat, if any.
    pub async fn check_once(&self) -> Option<String> {
        let result = self.probe.probe().await;
        if result.ok {
            debug!(message = %result.message, "Frigate health check passed");
        } else {
            warn!(message = %result.message, "Frigate health check failed");
        }

        let previous = self.connectivity.status_text(Dependency::MediaApi);
        self.connectivity.set_state(Dependency::MediaApi, result.ok);
        let current = self.connectivity.status_text(Dependency::MediaApi);
        if previous == current {
            return None;
        }

        let prefix = if result.ok {
            RECOVERED_PREFIX
        } else {
            UNREACHABLE_PREFIX
        };
        let text = format!("{prefix}{current}");
        let send = self.notifier.send_text(&text, None);
        if let Err(e) = with_timeout("Frigate status message", STATUS_SEND_TIMEOUT, send).await {
            error!(error = %e, "Failed to send Frigate health message");
        }
        Some(text)
    }

    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel_token))
    }

    /// Probe on every interval tick until cancelled. The first probe runs
    /// after one full interval.
    pub async fn run(self, cancel_token: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Frigate health monitor started");

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Frigate health monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }
    }
}
