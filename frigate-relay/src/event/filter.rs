//! Notify-worthiness decision for detection events.

use serde::{Deserialize, Deserializer, Serialize};

use super::{EventKind, RawEvent};

/// Labels and zones that deserve a notification.
///
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(
        default = "default_allowed_labels",
        deserialize_with = "deserialize_labels"
    )]
    pub allowed_labels: Vec<String>,
    #[serde(
        default = "default_allowed_zones",
        deserialize_with = "deserialize_zones"
    )]
    pub allowed_zones: Vec<String>,
}

fn default_allowed_labels() -> Vec<String> {
    ["person", "car", "truck"].map(String::from).to_vec()
}

fn default_allowed_zones() -> Vec<String> {
    vec!["Zone".to_string()]
}

/// String entries of a JSON array; `None` for anything else.
fn string_list(value: Option<serde_json::Value>) -> Option<Vec<String>> {
    match value? {
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn deserialize_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(string_list(value).unwrap_or_else(default_allowed_labels))
}

fn deserialize_zones<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(string_list(value).unwrap_or_else(default_allowed_zones))
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_labels: default_allowed_labels(),
            allowed_zones: default_allowed_zones(),
        }
    }
}

impl FilterConfig {
    pub fn new(labels: Vec<String>, zones: Vec<String>) -> Self {
        Self {
            allowed_labels: labels,
            allowed_zones: zones,
        }
    }

    pub fn allows_label(&self, label: &str) -> bool {
        self.allowed_labels.iter().any(|l| l == label)
    }

    pub fn allows_any_zone(&self, zones: &[String]) -> bool {
        zones.iter().any(|z| self.allowed_zones.contains(z))
    }
}

/// Why an event was not notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No event identifier could be extracted.
    NoPayload,
    /// `type == "end"`: the detection closed, nothing new happened.
    EventEnded,
    LabelNotAllowed,
    /// No zones at all, or none of them allowed.
    ZoneNotAllowed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPayload => "no_payload",
            Self::EventEnded => "event_ended",
            Self::LabelNotAllowed => "label_not_allowed",
            Self::ZoneNotAllowed => "zone_not_allowed",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Notify,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn should_notify(&self) -> bool {
        matches!(self, Self::Notify)
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Notify => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

/// Decide whether `event` deserves a notification. First failing rule wins.
pub fn decide(event: &RawEvent, filters: &FilterConfig) -> FilterDecision {
    let payload = event.payload();

    if payload.id.is_none() {
        return FilterDecision::Reject(RejectReason::NoPayload);
    }

    if payload.kind == Some(EventKind::End) {
        return FilterDecision::Reject(RejectReason::EventEnded);
    }

    match payload.label.as_deref() {
        Some(label) if filters.allows_label(label) => {}
        _ => return FilterDecision::Reject(RejectReason::LabelNotAllowed),
    }

    if payload.zones.is_empty() || !filters.allows_any_zone(&payload.zones) {
        return FilterDecision::Reject(RejectReason::ZoneNotAllowed);
    }

    FilterDecision::Notify
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBody;
    use serde_json::Value;

    fn event(kind: Option<EventKind>, label: &str, zones: &[&str]) -> RawEvent {
        RawEvent {
            kind,
            after: Some(EventBody {
                id: Some(Value::String("e1".into())),
                camera: Some("yard".into()),
                label: Some(label.into()),
                current_zones: Some(zones.iter().map(|z| z.to_string()).collect()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_allowed_label_in_allowed_zone() {
        let filters = FilterConfig::default();
        for kind in [Some(EventKind::New), Some(EventKind::Update), None] {
            for label in ["person", "car", "truck"] {
                let decision = decide(&event(kind, label, &["Zone"]), &filters);
                assert_eq!(decision, FilterDecision::Notify, "{kind:?} {label}");
            }
        }
    }

    #[test]
    fn test_end_events_never_notify() {
        let filters = FilterConfig::default();
        let decision = decide(&event(Some(EventKind::End), "person", &["Zone"]), &filters);
        assert_eq!(decision, FilterDecision::Reject(RejectReason::EventEnded));
        assert!(!decision.should_notify());
    }

    #[test]
    fn test_label_not_allowed() {
        let filters = FilterConfig::default();
        for label in ["cat", "Person", ""] {
            let decision = decide(&event(Some(EventKind::New), label, &["Zone"]), &filters);
            assert_eq!(
                decision.reject_reason(),
                Some(RejectReason::LabelNotAllowed),
                "{label}"
            );
        }
    }

    #[test]
    fn test_zone_rules() {
        let filters = FilterConfig::default();

        let none = decide(&event(Some(EventKind::New), "person", &[]), &filters);
        assert_eq!(none.reject_reason(), Some(RejectReason::ZoneNotAllowed));

        let other = decide(&event(Some(EventKind::New), "person", &["zone", "Gate"]), &filters);
        assert_eq!(other.reject_reason(), Some(RejectReason::ZoneNotAllowed));

        let mixed = decide(&event(Some(EventKind::New), "person", &["Gate", "Zone"]), &filters);
        assert!(mixed.should_notify());
    }

    #[test]
    fn test_missing_id_is_no_payload() {
        let filters = FilterConfig::default();
        let mut raw = event(Some(EventKind::End), "cat", &[]);
        if let Some(body) = raw.after.as_mut() {
            body.id = None;
        }
        assert_eq!(
            decide(&raw, &filters),
            FilterDecision::Reject(RejectReason::NoPayload)
        );
        assert_eq!(
            decide(&RawEvent::default(), &filters),
            FilterDecision::Reject(RejectReason::NoPayload)
        );
    }

    #[test]
    fn test_rule_order_end_before_label() {
        let filters = FilterConfig::default();
        let decision = decide(&event(Some(EventKind::End), "cat", &[]), &filters);
        assert_eq!(decision.reject_reason(), Some(RejectReason::EventEnded));
    }

    #[test]
    fn test_custom_filters() {
        let filters = FilterConfig::new(vec!["dog".into()], vec!["Porch".into()]);
        assert!(decide(&event(Some(EventKind::New), "dog", &["Porch"]), &filters).should_notify());
        assert!(!decide(&event(Some(EventKind::New), "person", &["Porch"]), &filters).should_notify());
        assert_eq!(RejectReason::ZoneNotAllowed.to_string(), "zone_not_allowed");
    }
}
