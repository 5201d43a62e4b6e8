//! Global notification mute window.

use chrono::{DateTime, Duration, Local, Utc};
use parking_lot::Mutex;
use tracing::info;

use crate::event::DISPLAY_TIME_FORMAT;

/// Holds at most one expiring mute window.
///
/// A new window replaces the previous one; windows never stack.
#[derive(Debug, Default)]
pub struct MuteTracker {
    until: Mutex<Option<DateTime<Utc>>>,
}

impl MuteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mute for `minutes` from now. Non-positive or non-finite values are ignored.
    pub fn mute(&self, minutes: f64) {
        self.mute_at(Utc::now(), minutes);
    }

    /// Mute for `minutes` counted from `now`.
    pub fn mute_at(&self, now: DateTime<Utc>, minutes: f64) {
        if !minutes.is_finite() || minutes <= 0.0 {
            return;
        }
        let millis = (minutes * 60_000.0).round();
        if millis > i64::MAX as f64 {
            return;
        }
        let Some(until) = Duration::try_milliseconds(millis as i64)
            .and_then(|d| now.checked_add_signed(d))
        else {
            return;
        };

        *self.until.lock() = Some(until);
        info!(minutes, until = %until.to_rfc3339(), "Notifications muted");
    }

    /// Clear the window unconditionally.
    pub fn unmute(&self) {
        *self.until.lock() = None;
        info!("Notifications unmuted");
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted_at(Utc::now())
    }

    /// Whether a window is active at `now`. An expired window is cleared.
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.active_until(now).is_some()
    }

    /// Expiry of the active window, if any.
    pub fn muted_until(&self) -> Option<DateTime<Utc>> {
        self.active_until(Utc::now())
    }

    fn active_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut until = self.until.lock();
        match *until {
            Some(expiry) if now < expiry => Some(expiry),
            Some(_) => {
                *until = None;
                None
            }
            None => None,
        }
    }

    pub fn status_text(&self) -> String {
        self.status_text_at(Utc::now())
    }

    pub fn status_text_at(&self, now: DateTime<Utc>) -> String {
        match self.active_until(now) {
            None => "Уведомления включены.".to_string(),
            Some(until) => format!(
                "Уведомления заглушены до {}.",
                until.with_timezone(&Local).format(DISPLAY_TIME_FORMAT)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mute_then_expire() {
        let tracker = MuteTracker::new();
        let now = Utc::now();

        tracker.mute_at(now, 30.0);
        assert!(tracker.is_muted_at(now));
        assert!(tracker.status_text_at(now).starts_with("Уведомления заглушены до "));

        let later = now + Duration::minutes(29);
        assert!(tracker.is_muted_at(later));

        let expired = now + Duration::minutes(30);
        assert!(!tracker.is_muted_at(expired));
        assert_eq!(tracker.status_text_at(expired), "Уведомления включены.");
        // Cleared lazily, so even an earlier instant no longer sees the window.
        assert!(!tracker.is_muted_at(now));
    }

    #[test]
    fn test_new_window_replaces_old() {
        let tracker = MuteTracker::new();
        let now = Utc::now();

        tracker.mute_at(now, 120.0);
        tracker.mute_at(now, 10.0);
        assert!(!tracker.is_muted_at(now + Duration::minutes(11)));
    }

    #[test]
    fn test_invalid_durations_ignored() {
        let tracker = MuteTracker::new();
        for minutes in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            tracker.mute(minutes);
            assert!(!tracker.is_muted(), "{minutes}");
        }
    }

    #[test]
    fn test_unmute() {
        let tracker = MuteTracker::new();
        tracker.mute(60.0);
        assert!(tracker.is_muted());
        assert!(tracker.muted_until().is_some());

        tracker.unmute();
        assert!(!tracker.is_muted());
        assert_eq!(tracker.status_text(), "Уведомления включены.");
    }

    #[test]
    fn test_fractional_minutes() {
        let tracker = MuteTracker::new();
        let now = Utc::now();
        tracker.mute_at(now, 0.5);
        assert!(tracker.is_muted_at(now + Duration::seconds(29)));
        assert!(!tracker.is_muted_at(now + Duration::seconds(30)));
    }
}
