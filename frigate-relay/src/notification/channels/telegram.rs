//! Telegram Bot API channel.
//!
//! Talks to `POST <api_base>/bot<token>/<method>`. JSON bodies are used for
//! text calls; photos and videos are uploaded as multipart forms. Every reply
//! is an envelope `{ok, result, description}`; `ok: false` becomes
//! [`Error::Telegram`]. Nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use frigate_api::MediaFile;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::TelegramSettings;
use crate::notification::{Dispatcher, ReplyMarkup};
use crate::{Error, Result};

/// Public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Telegram media caption limit (UTF-8 characters).
const TELEGRAM_CAPTION_LIMIT: usize = 1024;

/// Upper bound for a single non-polling request, uploads included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Content type of uploads whose own type is unknown.
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Extra time granted on top of the long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Destination chat (numeric id or `@channel`).
    pub chat_id: String,
    /// Forum topic inside the chat.
    pub message_thread_id: Option<i64>,
    /// Bot API base URL, without trailing slash.
    pub api_base: String,
}

impl TelegramConfig {
    pub fn from_settings(settings: &TelegramSettings) -> Self {
        Self {
            bot_token: settings.bot_token.clone(),
            chat_id: settings.chat_id.clone().unwrap_or_default(),
            message_thread_id: settings.message_thread_id,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// `Chat` object, reduced to what the bot needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// `Message` object, reduced to what the bot needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub message_thread_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// An inline button press.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    /// Message the button was attached to.
    #[serde(default)]
    pub message: Option<Message>,
}

/// One entry of `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// The message this update belongs to, for chat/thread checks.
    pub fn source_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or_else(|| self.callback_query.as_ref()?.message.as_ref())
    }
}

/// Telegram Bot API client bound to one destination chat.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = crate::utils::http_client::build_bot_client(Duration::from_secs(10))?;
        Ok(Self::with_client(config, client))
    }

    /// Reuse an existing client. Build it with
    /// [`build_bot_client`](crate::utils::http_client::build_bot_client) or
    /// after [`install_rustls_provider`](crate::utils::http_client::install_rustls_provider).
    pub fn with_client(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    /// `chat_id` plus `message_thread_id` when configured.
    fn destination(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("chat_id".into(), json!(self.config.chat_id));
        if let Some(thread_id) = self.config.message_thread_id {
            fields.insert("message_thread_id".into(), json!(thread_id));
        }
        fields
    }

    fn destination_form(&self) -> Form {
        let form = Form::new().text("chat_id", self.config.chat_id.clone());
        match self.config.message_thread_id {
            Some(thread_id) => form.text("message_thread_id", thread_id.to_string()),
            None => form,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await?;
        parse_response(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &'static str,
        form: Form,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        parse_response(method, response).await
    }

    /// `sendMessage` to the configured destination.
    pub async fn send_message(&self, text: &str, markup: Option<&ReplyMarkup>) -> Result<Message> {
        let mut payload = self.destination();
        payload.insert(
            "text".into(),
            json!(truncate_text(text, TELEGRAM_MESSAGE_LIMIT)),
        );
        if let Some(markup) = markup {
            payload.insert("reply_markup".into(), serde_json::to_value(markup)?);
        }

        let message = self
            .call("sendMessage", &Value::Object(payload), REQUEST_TIMEOUT)
            .await?;
        debug!("Telegram message sent");
        Ok(message)
    }

    async fn send_media(
        &self,
        method: &'static str,
        field: &'static str,
        media: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<Message> {
        let size = media.len();
        let part = media_part(media)?;

        let mut form = self
            .destination_form()
            .text("caption", truncate_text(caption, TELEGRAM_CAPTION_LIMIT))
            .part(field, part);
        if let Some(markup) = markup {
            form = form.text("reply_markup", serde_json::to_string(markup)?);
        }

        let message = self.call_multipart(method, form).await?;
        debug!(method, bytes = size, "Telegram media sent");
        Ok(message)
    }

    /// `sendPhoto` with a caption.
    pub async fn send_photo(
        &self,
        photo: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<Message> {
        self.send_media("sendPhoto", "photo", photo, caption, markup)
            .await
    }

    /// `sendVideo` with a caption.
    pub async fn send_video(
        &self,
        video: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<Message> {
        self.send_media("sendVideo", "video", video, caption, markup)
            .await
    }

    /// Replace the text (and inline keyboard) of an existing message.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": truncate_text(text, TELEGRAM_MESSAGE_LIMIT),
        });
        if let Some(markup) = markup {
            payload["reply_markup"] = serde_json::to_value(markup)?;
        }

        // The result is the edited Message, or `true` for inline messages.
        let _: Value = self
            .call("editMessageText", &payload, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Remove the inline keyboard from an existing message.
    pub async fn clear_reply_markup(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let payload = json!({"chat_id": chat_id, "message_id": message_id});
        let _: Value = self
            .call("editMessageReplyMarkup", &payload, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Acknowledge a button press, optionally with a toast text.
    pub async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        let mut payload = json!({"callback_query_id": query_id});
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let _: bool = self
            .call("answerCallbackQuery", &payload, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        self.call(
            "getUpdates",
            &payload,
            Duration::from_secs(timeout_secs) + POLL_GRACE,
        )
        .await
    }
}

async fn parse_response<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;

    let parsed: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
        Error::telegram(
            method,
            format!("HTTP {}: unexpected response body: {}", status, e),
        )
    })?;

    if !parsed.ok {
        let description = parsed
            .description
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(Error::telegram(method, description));
    }

    parsed
        .result
        .ok_or_else(|| Error::telegram(method, "response without result"))
}

#[async_trait]
impl Dispatcher for TelegramChannel {
    async fn send_text(&self, text: &str, markup: Option<&ReplyMarkup>) -> Result<()> {
        self.send_message(text, markup).await.map(drop)
    }

    async fn send_photo(
        &self,
        photo: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()> {
        TelegramChannel::send_photo(self, photo, caption, markup)
            .await
            .map(drop)
    }

    async fn send_video(
        &self,
        video: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()> {
        TelegramChannel::send_video(self, video, caption, markup)
            .await
            .map(drop)
    }
}

/// Multipart file part. A missing or unparsable content type becomes
/// `application/octet-stream`; Telegram sniffs the payload itself.
fn media_part(media: MediaFile) -> Result<Part> {
    let part = || Part::bytes(media.data.to_vec()).file_name(media.filename.clone());
    let content_type = media.content_type.trim();
    if !content_type.is_empty() {
        match part().mime_str(content_type) {
            Ok(part) => return Ok(part),
            Err(e) => {
                debug!(content_type, error = %e, "Invalid media content type, sending as binary");
            }
        }
    }
    Ok(part().mime_str(FALLBACK_MEDIA_TYPE)?)
}

/// Truncate a text to fit within a Telegram character limit.
fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "…";
    let truncated: String = text.chars().take(limit - 1).collect();
    format!("{truncated}{suffix}")
}
