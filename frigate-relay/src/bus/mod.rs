//! MQTT subscription for Frigate events.
//!
//! The subscriber owns the `rumqttc` event loop. Publishes on the events
//! topic are parsed and handed to an [`EventHandler`], one task per event, so
//! slow downstream I/O never stalls the read loop. Broker connection changes
//! are written to the connectivity tracker and reported to the chat on
//! transitions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MqttSettings;
use crate::event::RawEvent;
use crate::notification::Dispatcher;
use crate::relay::with_timeout;
use crate::state::{ConnectivityReporter, Dependency};

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Frigate events can carry large attribute lists.
const MAX_INCOMING_PACKET_SIZE: usize = 1024 * 1024;
const MAX_OUTGOING_PACKET_SIZE: usize = 64 * 1024;

/// Capacity of the request channel between client and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// rumqttc rejects shorter keep-alive intervals.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

const STATUS_SEND_TIMEOUT: Duration = Duration::from_secs(8);

pub const DISCONNECTED_PREFIX: &str = "⚠️ MQTT отключился.\n";
pub const RECONNECTED_PREFIX: &str = "✅ MQTT восстановился.\n";

/// Receives every parsed event from the bus.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: RawEvent);
}

/// What the event loop reported, reduced to what the subscriber acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusSignal {
    Connected,
    Disconnected(String),
    Message { topic: String, payload: Bytes },
}

impl BusSignal {
    fn from_poll(result: Result<Event, rumqttc::ConnectionError>) -> Option<Self> {
        match result {
            Ok(Event::Incoming(Packet::ConnAck(_))) => Some(Self::Connected),
            Ok(Event::Incoming(Packet::Publish(publish))) => Some(Self::Message {
                topic: publish.topic,
                payload: publish.payload,
            }),
            Ok(Event::Incoming(Packet::Disconnect)) => {
                Some(Self::Disconnected("broker sent DISCONNECT".to_string()))
            }
            Ok(_) => None,
            Err(e) => Some(Self::Disconnected(e.to_string())),
        }
    }
}

/// Subscribes to `<prefix>/events` and feeds the relay.
pub struct EventBusSubscriber {
    settings: MqttSettings,
    handler: Arc<dyn EventHandler>,
    connectivity: Arc<dyn ConnectivityReporter>,
    notifier: Arc<dyn Dispatcher>,
    topic: String,
    ever_connected: bool,
    tasks: JoinSet<()>,
}

impl EventBusSubscriber {
    pub fn new(
        settings: MqttSettings,
        handler: Arc<dyn EventHandler>,
        connectivity: Arc<dyn ConnectivityReporter>,
        notifier: Arc<dyn Dispatcher>,
    ) -> Self {
        let topic = settings.events_topic();
        Self {
            settings,
            handler,
            connectivity,
            notifier,
            topic,
            ever_connected: false,
            tasks: JoinSet::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(Duration::from_secs(
            self.settings.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
        ));
        options.set_max_packet_size(MAX_INCOMING_PACKET_SIZE, MAX_OUTGOING_PACKET_SIZE);
        if let Some(username) = self.settings.username.as_deref().filter(|u| !u.is_empty()) {
            options.set_credentials(
                username,
                self.settings.password.clone().unwrap_or_default(),
            );
        }
        options
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel_token))
    }

    /// Run the subscription loop until cancelled.
    pub async fn run(mut self, cancel_token: CancellationToken) {
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_CHANNEL_CAPACITY);
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            topic = %self.topic,
            "Starting MQTT subscription"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("MQTT subscriber shutting down");
                    break;
                }

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    log_task_result(joined);
                }

                polled = eventloop.poll() => {
                    let Some(signal) = BusSignal::from_poll(polled) else {
                        continue;
                    };
                    let disconnected = matches!(signal, BusSignal::Disconnected(_));
                    if matches!(signal, BusSignal::Connected) {
                        if let Err(e) = subscribe(&client, &self.topic) {
                            error!(topic = %self.topic, error = %e, "Failed to subscribe");
                        }
                    }
                    self.on_signal(signal);

                    if disconnected {
                        tokio::select! {
                            _ = cancel_token.cancelled() => {}
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not queued");
        }
        self.tasks.abort_all();
    }

    /// Apply one signal from the event loop.
    pub fn on_signal(&mut self, signal: BusSignal) {
        match signal {
            BusSignal::Connected => {
                info!(topic = %self.topic, "MQTT connected");
                let changed = self.connectivity.set_state(Dependency::EventBus, true);
                if changed && self.ever_connected {
                    self.push_status(RECONNECTED_PREFIX);
                }
                self.ever_connected = true;
            }
            BusSignal::Disconnected(reason) => {
                warn!(reason = %reason, "MQTT connection lost");
                if self.connectivity.set_state(Dependency::EventBus, false) {
                    self.push_status(DISCONNECTED_PREFIX);
                }
            }
            BusSignal::Message { topic, payload } => {
                if topic != self.topic {
                    return;
                }
                match RawEvent::from_slice(&payload) {
                    Ok(event) => {
                        let handler = self.handler.clone();
                        self.tasks
                            .spawn(async move { handler.handle_event(event).await });
                    }
                    Err(e) => {
                        warn!(error = %e, bytes = payload.len(), "Failed to parse event JSON");
                    }
                }
            }
        }
    }

    fn push_status(&mut self, prefix: &'static str) {
        let text = format!(
            "{prefix}{}",
            self.connectivity.status_text(Dependency::EventBus)
        );
        let notifier = self.notifier.clone();
        self.tasks.spawn(async move {
            let send = notifier.send_text(&text, None);
            if let Err(e) = with_timeout("MQTT status message", STATUS_SEND_TIMEOUT, send).await {
                error!(error = %e, "Failed to send MQTT status message");
            }
        });
    }

    /// Wait for all spawned event and status tasks.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            log_task_result(joined);
        }
    }
}

/// Queue the events subscription. Called after every ConnAck, since the
/// session is not persisted across reconnects.
fn subscribe(client: &AsyncClient, topic: &str) -> crate::Result<()> {
    client
        .try_subscribe(topic, QoS::AtMostOnce)
        .map_err(|e| crate::Error::Mqtt(e.to_string()))
}

fn log_task_result(joined: Result<(), tokio::task::JoinError>) {
    if let Err(join_err) = joined {
        if join_err.is_panic() {
            let payload = join_err.into_panic();
            error!(
                panic = %crate::panic_hook::caught_payload_to_string(payload.as_ref()),
                "Event task panicked"
            );
        } else {
            debug!(error = ?join_err, "Event task cancelled");
        }
    }
}
