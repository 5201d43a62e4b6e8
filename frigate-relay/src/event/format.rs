//! Human-readable notification text.

use chrono::{DateTime, Local, TimeZone};

use super::RawEvent;

/// Display format for timestamps shown to the operator.
pub const DISPLAY_TIME_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

const FALLBACK_TEXT: &str = "Событие без данных.";

/// Localized label with an emoji, or the raw label when unknown.
pub fn human_label(label: &str) -> &str {
    match label {
        "person" => "🧍 Человек",
        "car" => "🚗 Машина",
        "truck" => "🚚 Грузовик",
        other => other,
    }
}

/// Notification text (also used as a photo caption), in local time.
pub fn format_notification(event: &RawEvent) -> String {
    format_notification_in(event, &Local)
}

/// Notification text rendered in the given timezone.
pub fn format_notification_in<Tz>(event: &RawEvent, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let payload = event.payload();
    let body = event.body();

    if payload.id.is_none() && payload.label.is_none() && payload.camera.is_none() {
        return FALLBACK_TEXT.to_string();
    }

    let label = payload.label.as_deref().map(human_label).unwrap_or("объект");
    let zones = if payload.zones.is_empty() {
        "неизвестная зона".to_string()
    } else {
        payload.zones.join(", ")
    };
    let camera = payload.camera.as_deref().unwrap_or("неизвестна");

    let time = body
        .start_time
        .or(body.frame_time)
        .filter(|ts| *ts > 0.0)
        .and_then(|ts| {
            let secs = ts.trunc() as i64;
            let nanos = (ts.fract() * 1e9) as u32;
            DateTime::from_timestamp(secs, nanos)
        })
        .map(|dt| dt.with_timezone(tz).format(DISPLAY_TIME_FORMAT).to_string())
        .unwrap_or_else(|| "неизвестно".to_string());

    let mut lines = vec![
        format!("{label} в зоне {zones} (камера {camera})."),
        format!("Время: {time}"),
    ];

    if let Some(sub_label) = body.sub_label_text() {
        lines.push(format!("Подпись: {sub_label}"));
    }

    if let Some(plate) = body
        .recognized_license_plate
        .as_deref()
        .filter(|p| !p.is_empty())
    {
        lines.push(format!("Номер: {plate}"));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parse(raw: &str) -> RawEvent {
        RawEvent::from_slice(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_full_notification() {
        let event = parse(
            r#"{"type": "new", "after": {"id": "e1", "camera": "yard", "label": "person",
                "current_zones": ["Zone", "Gate"], "start_time": 1700000000.25,
                "sub_label": ["Alice", 0.9]}}"#,
        );
        let text = format_notification_in(&event, &Utc);

        assert_eq!(
            text,
            "🧍 Человек в зоне Zone, Gate (камера yard).\n\
             Время: 14.11.2023, 22:13:20\n\
             Подпись: Alice"
        );
    }

    #[test]
    fn test_unknown_label_and_plate() {
        let event = parse(
            r#"{"type": "update", "after": {"id": "e2", "camera": "gate", "label": "bus",
                "entered_zones": ["Road"], "recognized_license_plate": "A123BC77"}}"#,
        );
        let text = format_notification_in(&event, &Utc);

        assert!(text.starts_with("bus в зоне Road (камера gate)."));
        assert!(text.contains("Время: неизвестно"));
        assert!(text.ends_with("Номер: A123BC77"));
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let text = format_notification_in(&parse(r#"{"type": "new", "id": "e1"}"#), &Utc);
        assert!(text.starts_with("объект в зоне неизвестная зона (камера неизвестна)."));

        assert_eq!(format_notification(&RawEvent::default()), FALLBACK_TEXT);
    }

    #[test]
    fn test_frame_time_fallback() {
        let event = parse(r#"{"after": {"id": "e3", "label": "car", "frame_time": 86400}}"#);
        let text = format_notification_in(&event, &Utc);
        assert!(text.contains("🚗 Машина"));
        assert!(text.contains("Время: 02.01.1970, 00:00:00"));

        let zero = parse(r#"{"after": {"id": "e4", "label": "car", "start_time": 0}}"#);
        assert!(format_notification_in(&zero, &Utc).contains("Время: неизвестно"));
    }

    #[test]
    fn test_human_label() {
        assert_eq!(human_label("truck"), "🚚 Грузовик");
        assert_eq!(human_label("dog"), "dog");
    }
}
