//! Application configuration.
//!
//! Configuration is read once at startup from a JSON file, defaults are
//! applied for optional fields and required fields are validated. Any error
//! here is fatal: the process exits before a single component starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::event::FilterConfig;
use crate::{Error, Result};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `telegram.botToken`.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_TOPIC_PREFIX: &str = "frigate";
const DEFAULT_MUTE_MINUTES: f64 = 60.0;
const DEFAULT_FRIGATE_URL: &str = "http://127.0.0.1:5000";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub mqtt: MqttSettings,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub frigate_api: FrigateApiSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Telegram destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: String,
    /// Numeric ids and `@channel` names are both accepted.
    #[serde(default, deserialize_with = "deserialize_chat_id")]
    pub chat_id: Option<String>,
    /// Forum topic inside a supergroup. Non-integer values are ignored.
    #[serde(default, deserialize_with = "deserialize_thread_id")]
    pub message_thread_id: Option<i64>,
}

/// MQTT broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            topic_prefix: default_topic_prefix(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl MqttSettings {
    /// Topic carrying Frigate detection events.
    pub fn events_topic(&self) -> String {
        format!("{}/events", self.topic_prefix)
    }
}

/// Mute defaults and per-step timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(
        default = "default_mute_minutes",
        deserialize_with = "deserialize_mute_minutes"
    )]
    pub default_mute_minutes: f64,
    #[serde(default = "default_step_timeout_secs")]
    pub enrichment_timeout_secs: u64,
    #[serde(default = "default_step_timeout_secs")]
    pub dispatch_timeout_secs: u64,
}

impl NotificationSettings {
    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            default_mute_minutes: DEFAULT_MUTE_MINUTES,
            enrichment_timeout_secs: default_step_timeout_secs(),
            dispatch_timeout_secs: default_step_timeout_secs(),
        }
    }
}

/// Frigate HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrigateApiSettings {
    #[serde(default = "default_frigate_url")]
    pub base_url: String,
    #[serde(default = "default_health_interval_secs")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl FrigateApiSettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for FrigateApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_frigate_url(),
            health_check_interval_secs: default_health_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    #[serde(default)]
    pub filter: Option<String>,
    /// Directory for daily-rotated log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

fn default_client_id() -> String {
    "frigate-relay".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_mute_minutes() -> f64 {
    DEFAULT_MUTE_MINUTES
}

fn default_step_timeout_secs() -> u64 {
    8
}

fn default_frigate_url() -> String {
    DEFAULT_FRIGATE_URL.to_string()
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn deserialize_chat_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_thread_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64()))
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_u64())
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_MQTT_PORT))
}

fn deserialize_mute_minutes<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(DEFAULT_MUTE_MINUTES))
}

impl AppConfig {
    /// Load, default and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::config(format!(
                "Config file not found at {}. Create it based on config.example.json.",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::io_path("reading config file", path, e))?;
        let mut config = Self::from_json(&raw)?;

        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            if !token.is_empty() {
                debug!("Using Telegram bot token from {}", BOT_TOKEN_ENV);
                config.telegram.bot_token = token;
                config.validate()?;
            }
        }

        Ok(config)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: AppConfig = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("config is not valid JSON: {}", e)))?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        let mute = self.notifications.default_mute_minutes;
        if !mute.is_finite() || mute <= 0.0 {
            self.notifications.default_mute_minutes = DEFAULT_MUTE_MINUTES;
        }
        if self.mqtt.port == 0 {
            self.mqtt.port = DEFAULT_MQTT_PORT;
        }
        if self.mqtt.keep_alive_secs == 0 {
            self.mqtt.keep_alive_secs = default_keep_alive_secs();
        }
        if self.mqtt.topic_prefix.is_empty() {
            self.mqtt.topic_prefix = default_topic_prefix();
        }
        if self.frigate_api.base_url.trim().is_empty() {
            self.frigate_api.base_url = default_frigate_url();
        }
        if self.frigate_api.health_check_interval_secs == 0 {
            self.frigate_api.health_check_interval_secs = default_health_interval_secs();
        }
        if self.notifications.enrichment_timeout_secs == 0 {
            self.notifications.enrichment_timeout_secs = default_step_timeout_secs();
        }
        if self.notifications.dispatch_timeout_secs == 0 {
            self.notifications.dispatch_timeout_secs = default_step_timeout_secs();
        }
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            return Err(Error::config(
                "telegram.botToken is required and must be a non-empty string",
            ));
        }
        if self.telegram.chat_id.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config(
                "telegram.chatId is required and must be a number or string",
            ));
        }
        if self.mqtt.host.is_empty() {
            return Err(Error::config(
                "mqtt.host is required and must be a non-empty string",
            ));
        }
        frigate_api::normalize_base_url(&self.frigate_api.base_url)
            .map_err(|e| Error::validation(format!("frigateApi.baseUrl: {}", e)))?;
        Ok(())
    }

    /// Destination chat id. Guaranteed non-empty after validation.
    pub fn chat_id(&self) -> &str {
        self.telegram.chat_id.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "telegram": {"botToken": "123:ABC", "chatId": -1002339884405},
        "mqtt": {"host": "broker.local"}
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.chat_id(), "-1002339884405");
        assert_eq!(config.telegram.message_thread_id, None);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic_prefix, "frigate");
        assert_eq!(config.mqtt.events_topic(), "frigate/events");
        assert_eq!(config.filters.allowed_labels, vec!["person", "car", "truck"]);
        assert_eq!(config.filters.allowed_zones, vec!["Zone"]);
        assert_eq!(config.notifications.default_mute_minutes, 60.0);
        assert_eq!(config.notifications.enrichment_timeout(), Duration::from_secs(8));
        assert_eq!(config.frigate_api.base_url, "http://127.0.0.1:5000");
        assert_eq!(
            config.frigate_api.health_check_interval(),
            Duration::from_secs(60)
        );
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_explicit_values() {
        let raw = r#"{
            "telegram": {"botToken": "t", "chatId": "@alerts", "messageThreadId": 26177},
            "mqtt": {"host": "h", "port": 8883, "username": "u", "password": "p", "topicPrefix": "nvr"},
            "filters": {"allowedLabels": ["dog"], "allowedZones": ["Gate", "Porch"]},
            "notifications": {"defaultMuteMinutes": 15},
            "frigateApi": {"baseUrl": "nvr:5000", "healthCheckIntervalSecs": 30}
        }"#;
        let config = AppConfig::from_json(raw).unwrap();

        assert_eq!(config.chat_id(), "@alerts");
        assert_eq!(config.telegram.message_thread_id, Some(26177));
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.events_topic(), "nvr/events");
        assert_eq!(config.filters.allowed_labels, vec!["dog"]);
        assert_eq!(config.filters.allowed_zones, vec!["Gate", "Porch"]);
        assert_eq!(config.notifications.default_mute_minutes, 15.0);
        assert_eq!(config.frigate_api.health_check_interval_secs, 30);
    }

    #[test]
    fn test_invalid_optional_values_fall_back() {
        let raw = r#"{
            "telegram": {"botToken": "t", "chatId": 1, "messageThreadId": "abc"},
            "mqtt": {"host": "h", "port": -5},
            "notifications": {"defaultMuteMinutes": 0}
        }"#;
        let config = AppConfig::from_json(raw).unwrap();

        assert_eq!(config.telegram.message_thread_id, None);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.notifications.default_mute_minutes, 60.0);
    }

    #[test]
    fn test_mistyped_optional_values_fall_back() {
        let raw = r#"{
            "telegram": {"botToken": "t", "chatId": 1},
            "mqtt": {"host": "h", "port": "1884"},
            "filters": {"allowedLabels": "person", "allowedZones": ["Gate", 3, null]},
            "notifications": {"defaultMuteMinutes": "30"}
        }"#;
        let config = AppConfig::from_json(raw).unwrap();

        assert_eq!(config.notifications.default_mute_minutes, 60.0);
        assert_eq!(config.filters.allowed_labels, vec!["person", "car", "truck"]);
        assert_eq!(config.filters.allowed_zones, vec!["Gate"]);
        assert_eq!(config.mqtt.port, 1883);

        let raw = r#"{
            "telegram": {"botToken": "t", "chatId": 1},
            "mqtt": {"host": "h"},
            "filters": {"allowedLabels": null, "allowedZones": {"Zone": true}},
            "notifications": {"defaultMuteMinutes": null}
        }"#;
        let config = AppConfig::from_json(raw).unwrap();

        assert_eq!(config.notifications.default_mute_minutes, 60.0);
        assert_eq!(config.filters, FilterConfig::default());
    }

    #[test]
    fn test_missing_required_fields() {
        let no_token = r#"{"telegram": {"chatId": 1}, "mqtt": {"host": "h"}}"#;
        let err = AppConfig::from_json(no_token).unwrap_err();
        assert!(err.to_string().contains("botToken"));

        let no_chat = r#"{"telegram": {"botToken": "t"}, "mqtt": {"host": "h"}}"#;
        let err = AppConfig::from_json(no_chat).unwrap_err();
        assert!(err.to_string().contains("chatId"));

        let no_host = r#"{"telegram": {"botToken": "t", "chatId": 1}, "mqtt": {}}"#;
        let err = AppConfig::from_json(no_host).unwrap_err();
        assert!(err.to_string().contains("mqtt.host"));

        let bad_url = r#"{"telegram": {"botToken": "t", "chatId": 1}, "mqtt": {"host": "h"},
            "frigateApi": {"baseUrl": "ftp://nvr"}}"#;
        assert!(AppConfig::from_json(bad_url).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = AppConfig::from_json(include_str!("../../../config.example.json")).unwrap();
        assert_eq!(config.telegram.message_thread_id, None);
        assert_eq!(config.mqtt.username.as_deref(), Some("frigate"));
        assert_eq!(config.logging.directory, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_invalid_json() {
        let err = AppConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.mqtt.host, "broker.local");

        let missing = AppConfig::load(Path::new("/definitely/not/here/config.json"));
        assert!(matches!(missing, Err(Error::Configuration(_))));
    }
}
