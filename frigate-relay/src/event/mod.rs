//! Frigate detection events.
//!
//! Frigate publishes `{"type": ..., "before": {...}, "after": {...}}` on
//! `<prefix>/events`. The interesting fields live in `after` (falling back to
//! `before`); flat payloads without either are also accepted.

mod filter;
mod format;

pub use filter::{FilterConfig, FilterDecision, RejectReason, decide};
pub use format::{DISPLAY_TIME_FORMAT, format_notification, format_notification_in, human_label};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle stage of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    New,
    Update,
    End,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::New => write!(f, "new"),
            EventKind::Update => write!(f, "update"),
            EventKind::End => write!(f, "end"),
            EventKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detection state as carried in `before`/`after`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub sub_label: Option<Value>,
    #[serde(default)]
    pub current_zones: Option<Vec<String>>,
    #[serde(default)]
    pub entered_zones: Option<Vec<String>>,
    #[serde(default)]
    pub zones: Option<Vec<String>>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub frame_time: Option<f64>,
    #[serde(default)]
    pub recognized_license_plate: Option<String>,
}

/// An event exactly as received from the bus. Never mutated after parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<EventKind>,
    #[serde(default)]
    pub before: Option<EventBody>,
    #[serde(default)]
    pub after: Option<EventBody>,
    #[serde(flatten)]
    pub flat: EventBody,
}

/// The fields the relay cares about, extracted from a [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    pub id: Option<String>,
    pub kind: Option<EventKind>,
    pub camera: Option<String>,
    pub label: Option<String>,
    pub zones: Vec<String>,
}

impl RawEvent {
    /// Parse a bus message.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// `after`, else `before`, else the flat top-level fields.
    pub fn body(&self) -> &EventBody {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .unwrap_or(&self.flat)
    }

    /// Extract the relay-relevant fields.
    pub fn payload(&self) -> EventPayload {
        let body = self.body();
        EventPayload {
            id: body.event_id(),
            kind: self.kind,
            camera: body.camera.clone().filter(|c| !c.is_empty()),
            label: body.label.clone().filter(|l| !l.is_empty()),
            zones: body.zone_list().to_vec(),
        }
    }
}

impl EventBody {
    /// Event identifier as a string. Numeric ids are stringified.
    pub fn event_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `current_zones`, else `entered_zones`, else `zones`.
    pub fn zone_list(&self) -> &[String] {
        self.current_zones
            .as_deref()
            .or(self.entered_zones.as_deref())
            .or(self.zones.as_deref())
            .unwrap_or_default()
    }

    /// First element of `sub_label` when it is a `[name, score]` pair.
    pub fn sub_label_text(&self) -> Option<String> {
        match self.sub_label.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => match items.first()? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frigate_envelope() {
        let raw = br#"{
            "type": "update",
            "before": {"id": "old", "camera": "yard", "label": "car"},
            "after": {"id": "1718.5-abc", "camera": "yard", "label": "person",
                      "current_zones": ["Zone"], "entered_zones": ["Zone", "Gate"],
                      "start_time": 1718000000.5, "sub_label": ["Alice", 0.91]}
        }"#;
        let event = RawEvent::from_slice(raw).unwrap();
        let payload = event.payload();

        assert_eq!(payload.kind, Some(EventKind::Update));
        assert_eq!(payload.id.as_deref(), Some("1718.5-abc"));
        assert_eq!(payload.label.as_deref(), Some("person"));
        assert_eq!(payload.zones, vec!["Zone"]);
        assert_eq!(event.body().sub_label_text().as_deref(), Some("Alice"));
    }

    #[test]
    fn test_before_used_when_after_missing() {
        let raw = br#"{"type": "end", "before": {"id": "e9", "camera": "door", "label": "car",
                       "entered_zones": ["Driveway"]}, "after": null}"#;
        let payload = RawEvent::from_slice(raw).unwrap().payload();

        assert_eq!(payload.kind, Some(EventKind::End));
        assert_eq!(payload.id.as_deref(), Some("e9"));
        assert_eq!(payload.zones, vec!["Driveway"]);
    }

    #[test]
    fn test_flat_payload() {
        let raw = br#"{"type": "new", "id": "e1", "label": "person", "zones": ["Zone"]}"#;
        let payload = RawEvent::from_slice(raw).unwrap().payload();

        assert_eq!(payload.kind, Some(EventKind::New));
        assert_eq!(payload.id.as_deref(), Some("e1"));
        assert_eq!(payload.camera, None);
        assert_eq!(payload.zones, vec!["Zone"]);
    }

    #[test]
    fn test_unknown_type_and_numeric_id() {
        let raw = br#"{"type": "snapshot", "after": {"id": 42, "label": "dog"}}"#;
        let payload = RawEvent::from_slice(raw).unwrap().payload();

        assert_eq!(payload.kind, Some(EventKind::Unknown));
        assert_eq!(payload.id.as_deref(), Some("42"));
        assert!(payload.zones.is_empty());
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(RawEvent::from_slice(b"not json").is_err());
        assert!(RawEvent::from_slice(br#"{"after": {"current_zones": "Zone"}}"#).is_err());
    }

    #[test]
    fn test_sub_label_variants() {
        let mut body = EventBody {
            sub_label: Some(Value::String("Bob".into())),
            ..Default::default()
        };
        assert_eq!(body.sub_label_text().as_deref(), Some("Bob"));

        body.sub_label = Some(Value::Null);
        assert_eq!(body.sub_label_text(), None);

        body.sub_label = Some(serde_json::json!([]));
        assert_eq!(body.sub_label_text(), None);
    }
}
