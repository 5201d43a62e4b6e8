//! Up/down state of the external dependencies.

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use tracing::info;

use crate::event::DISPLAY_TIME_FORMAT;

/// An external dependency whose reachability is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// The MQTT broker.
    EventBus,
    /// The Frigate HTTP API.
    MediaApi,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventBus => "mqtt",
            Self::MediaApi => "frigate_api",
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub up: bool,
    /// Time of the last transition; `None` until the first one.
    pub since: Option<DateTime<Utc>>,
}

/// Last-known state of the event bus and the media API.
///
/// Both start down. Writing the current state again is a no-op.
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    event_bus: Mutex<ConnectivityState>,
    media_api: Mutex<ConnectivityState>,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, dependency: Dependency) -> &Mutex<ConnectivityState> {
        match dependency {
            Dependency::EventBus => &self.event_bus,
            Dependency::MediaApi => &self.media_api,
        }
    }

    /// Record the state. Returns `true` if it changed.
    pub fn set_state(&self, dependency: Dependency, up: bool) -> bool {
        self.set_state_at(dependency, up, Utc::now())
    }

    pub fn set_state_at(&self, dependency: Dependency, up: bool, now: DateTime<Utc>) -> bool {
        let mut state = self.slot(dependency).lock();
        if state.up == up {
            return false;
        }
        state.up = up;
        state.since = Some(now);
        drop(state);

        info!(
            dependency = %dependency,
            up,
            at = %now.to_rfc3339(),
            "Connectivity changed"
        );
        true
    }

    pub fn state(&self, dependency: Dependency) -> ConnectivityState {
        *self.slot(dependency).lock()
    }

    pub fn is_up(&self, dependency: Dependency) -> bool {
        self.state(dependency).up
    }

    /// Human-readable status line for one dependency.
    pub fn status_text(&self, dependency: Dependency) -> String {
        let state = self.state(dependency);
        let since = |prefix: &str| {
            state
                .since
                .map(|ts| {
                    format!(
                        " ({prefix} {})",
                        ts.with_timezone(&Local).format(DISPLAY_TIME_FORMAT)
                    )
                })
                .unwrap_or_default()
        };

        match (dependency, state.up) {
            (Dependency::EventBus, true) => format!("✅ MQTT: подключен{}", since("подключён с")),
            (Dependency::EventBus, false) => "❌ MQTT: отключен".to_string(),
            (Dependency::MediaApi, true) => {
                format!("✅ Frigate HTTP API: доступен{}", since("доступен с"))
            }
            (Dependency::MediaApi, false) => "❌ Frigate HTTP API: недоступен".to_string(),
        }
    }

    /// Both status lines, event bus first.
    pub fn summary(&self) -> String {
        format!(
            "{}\n{}",
            self.status_text(Dependency::EventBus),
            self.status_text(Dependency::MediaApi)
        )
    }
}
