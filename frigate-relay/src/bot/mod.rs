//! Operator command surface over Telegram long polling.
//!
//! Only updates from the configured chat (and thread, when one is set) are
//! handled. Handlers are thin calls into the mute and connectivity state and
//! the Frigate client; failures are logged and answered with a short text.

mod command;
mod menu;

pub use command::{BotCommand, CAMERA_CALLBACK_PREFIX, REVIEW_CAMERA_CALLBACK_PREFIX};

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use frigate_api::{FrigateClient, LatestFrameOptions, ReviewSummary};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event::FilterConfig;
use crate::notification::channels::{TelegramChannel, Update};
use crate::notification::ReplyMarkup;
use crate::state::{ConnectivityTracker, MuteControl};
use crate::Result;

/// `getUpdates` long-poll timeout.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Where a command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Text,
    Callback {
        query_id: String,
        /// Chat and message the button belongs to.
        message: Option<(i64, i64)>,
    },
}

impl Origin {
    fn is_callback(&self) -> bool {
        matches!(self, Self::Callback { .. })
    }
}

pub struct BotService {
    telegram: Arc<TelegramChannel>,
    frigate: Arc<FrigateClient>,
    mute: Arc<dyn MuteControl>,
    connectivity: Arc<ConnectivityTracker>,
    filters: FilterConfig,
    default_mute_minutes: f64,
}

impl BotService {
    pub fn new(
        telegram: Arc<TelegramChannel>,
        frigate: Arc<FrigateClient>,
        mute: Arc<dyn MuteControl>,
        connectivity: Arc<ConnectivityTracker>,
        filters: FilterConfig,
        default_mute_minutes: f64,
    ) -> Self {
        Self {
            telegram,
            frigate,
            mute,
            connectivity,
            filters,
            default_mute_minutes,
        }
    }

    pub fn spawn(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel_token))
    }

    /// Poll for updates until cancelled. Each update is handled on its own task.
    pub async fn run(self: Arc<Self>, cancel_token: CancellationToken) {
        let mut offset: Option<i64> = None;
        let mut tasks = JoinSet::new();
        info!("Telegram bot polling started");

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Telegram bot shutting down");
                    break;
                }

                polled = self.telegram.get_updates(offset, POLL_TIMEOUT_SECS) => {
                    // Reaped here so a finishing handler never interrupts the long poll.
                    while let Some(joined) = tasks.try_join_next() {
                        log_handler_result(joined);
                    }
                    match polled {
                        Ok(updates) => {
                            for update in updates {
                                offset = Some(update.update_id + 1);
                                let service = Arc::clone(&self);
                                tasks.spawn(async move { service.handle_update(update).await });
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to poll Telegram updates");
                            tokio::select! {
                                _ = cancel_token.cancelled() => {}
                                _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                            }
                        }
                    }
                }
            }
        }

        tasks.abort_all();
    }

    /// Whether `update` comes from the configured chat and thread.
    pub fn is_authorized(&self, update: &Update) -> bool {
        let Some(message) = update.source_message() else {
            return false;
        };
        let config = self.telegram.config();
        if message.chat.id.to_string() != config.chat_id {
            return false;
        }
        match config.message_thread_id {
            Some(thread_id) => message.message_thread_id == Some(thread_id),
            None => true,
        }
    }

    /// Route one update to its command.
    pub async fn handle_update(&self, update: Update) {
        if !self.is_authorized(&update) {
            debug!(update_id = update.update_id, "Ignoring update from another chat");
            return;
        }

        if let Some(query) = update.callback_query {
            let origin = Origin::Callback {
                query_id: query.id.clone(),
                message: query.message.as_ref().map(|m| (m.chat.id, m.message_id)),
            };
            match query.data.as_deref().and_then(BotCommand::parse_callback) {
                Some(command) => self.execute(command, origin).await,
                None => {
                    debug!(data = ?query.data, "Unknown callback");
                    self.answer(&origin, None).await;
                }
            }
            return;
        }

        let text = update.message.and_then(|m| m.text);
        if let Some(command) = text.as_deref().and_then(BotCommand::parse_text) {
            self.execute(command, Origin::Text).await;
        }
    }

    /// Run a command, answering with its failure text if it fails.
    pub async fn execute(&self, command: BotCommand, origin: Origin) {
        debug!(command = command.name(), callback = origin.is_callback(), "Bot command");

        if let Err(e) = self.dispatch(&command, &origin).await {
            error!(command = command.name(), error = %e, "Bot command failed");
            if let Err(e) = self.reply(&command.failure_text()).await {
                error!(command = command.name(), error = %e, "Failed to send failure reply");
            }
        }
    }

    async fn dispatch(&self, command: &BotCommand, origin: &Origin) -> Result<()> {
        match command {
            BotCommand::Start => {
                self.reply(&menu::start_text(&self.filters)).await?;
                self.send_main_menu().await
            }
            BotCommand::ShowMenu => {
                self.answer(origin, None).await;
                self.send_main_menu().await
            }
            BotCommand::MenuBack => {
                self.answer(origin, None).await;
                self.show(origin, menu::MAIN_MENU_TEXT, menu::main_menu_keyboard())
                    .await
            }
            BotCommand::MenuNotifications => {
                self.answer(origin, None).await;
                self.show(
                    origin,
                    menu::NOTIFICATIONS_MENU_TEXT,
                    menu::notifications_menu_keyboard(),
                )
                .await
            }
            BotCommand::MenuSystem => {
                self.answer(origin, None).await;
                self.show(origin, menu::SYSTEM_MENU_TEXT, menu::system_menu_keyboard())
                    .await
            }
            BotCommand::MenuReviews => {
                self.answer(origin, None).await;
                self.show(origin, menu::REVIEWS_MENU_TEXT, menu::reviews_menu_keyboard())
                    .await
            }
            BotCommand::MenuCameras => {
                // A query is answered once, so wait for the outcome.
                match self.frigate.camera_names().await {
                    Ok(cameras) => {
                        self.answer(origin, None).await;
                        let text = if cameras.is_empty() {
                            menu::NO_CAMERAS_TEXT
                        } else {
                            menu::PICK_CAMERA_TEXT
                        };
                        self.show(origin, text, menu::camera_menu_keyboard(&cameras))
                            .await
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to load cameras for menu");
                        self.answer(origin, Some("Ошибка загрузки камер")).await;
                        self.show(origin, &command.failure_text(), menu::main_menu_keyboard())
                            .await
                    }
                }
            }
            BotCommand::Help => {
                self.answer(origin, None).await;
                self.reply(menu::HELP_TEXT).await
            }
            BotCommand::Filters => {
                self.answer(origin, None).await;
                self.reply(&menu::filters_text(&self.filters)).await
            }
            BotCommand::Ping => {
                self.answer(origin, None).await;
                let probe = self.frigate.check_health().await;
                let time = Local::now().format("%H:%M:%S").to_string();
                self.reply(&menu::ping_text(&time, probe.ok)).await
            }
            BotCommand::Mute { minutes } => {
                let minutes = minutes.unwrap_or(self.default_mute_minutes);
                self.mute.mute(minutes);
                if origin.is_callback() {
                    self.answer(origin, Some(&format!("Мут на {minutes} минут")))
                        .await;
                    self.clear_markup(origin).await;
                }
                self.reply(&self.mute.status_text()).await
            }
            BotCommand::Unmute => {
                self.mute.unmute();
                if origin.is_callback() {
                    self.answer(origin, Some("Уведомления включены")).await;
                    self.clear_markup(origin).await;
                }
                self.reply(&self.mute.status_text()).await
            }
            BotCommand::Status => {
                self.answer(origin, None).await;
                self.reply(&self.mute.status_text()).await
            }
            BotCommand::Health => {
                self.answer(origin, None).await;
                self.reply(&self.connectivity.summary()).await
            }
            BotCommand::Cameras => {
                self.answer(origin, None).await;
                let cameras = self.frigate.camera_names().await?;
                if cameras.is_empty() {
                    return self.reply(menu::NO_CAMERAS_TEXT).await;
                }
                self.telegram
                    .send_message(menu::PICK_CAMERA_TEXT, Some(&menu::camera_picker(&cameras)))
                    .await
                    .map(drop)
            }
            BotCommand::Camera(name) => {
                self.answer(origin, None).await;
                let frame = self
                    .frigate
                    .latest_frame(name, &LatestFrameOptions::annotated())
                    .await?;
                self.telegram
                    .send_photo(frame, &menu::camera_frame_caption(name), None)
                    .await
                    .map(drop)
            }
            BotCommand::LastReview => {
                self.answer(origin, None).await;
                match self.frigate.latest_review(None).await? {
                    Some(review) => self.send_review(&review).await,
                    None => self.reply(menu::NO_REVIEWS_TEXT).await,
                }
            }
            BotCommand::PickReviewCamera => {
                self.answer(origin, None).await;
                let cameras = self.frigate.camera_names().await?;
                if cameras.is_empty() {
                    return self.reply(menu::NO_CAMERAS_TEXT).await;
                }
                self.telegram
                    .send_message(
                        menu::PICK_REVIEW_CAMERA_TEXT,
                        Some(&menu::review_camera_picker(&cameras)),
                    )
                    .await
                    .map(drop)
            }
            BotCommand::ReviewCamera(name) => {
                self.answer(origin, None).await;
                match self.frigate.latest_review(Some(name)).await? {
                    Some(review) => self.send_review(&review).await,
                    None => self.reply(&menu::no_reviews_for_camera_text(name)).await,
                }
            }
            BotCommand::EventClip(event_id) => {
                self.answer(origin, None).await;
                let clip = self.frigate.event_clip(event_id).await?;
                self.telegram
                    .send_video(clip, menu::CLIP_CAPTION, None)
                    .await
                    .map(drop)
            }
        }
    }

    /// Snapshot and clip of the review's latest detection.
    async fn send_review(&self, review: &ReviewSummary) -> Result<()> {
        let Some(event_id) = review.latest_detection() else {
            return self.reply(&menu::review_without_events_text(review)).await;
        };

        let snapshot = self.frigate.event_snapshot(event_id).await?;
        let clip = self.frigate.event_clip(event_id).await?;

        self.telegram
            .send_photo(snapshot, &menu::review_caption(review, event_id), None)
            .await?;
        self.telegram
            .send_video(clip, menu::CLIP_CAPTION, None)
            .await?;
        Ok(())
    }

    async fn send_main_menu(&self) -> Result<()> {
        self.telegram
            .send_message(menu::MAIN_MENU_TEXT, Some(&menu::main_menu_keyboard()))
            .await
            .map(drop)
    }

    /// Text reply with the persistent menu keyboard.
    async fn reply(&self, text: &str) -> Result<()> {
        self.telegram
            .send_message(text, Some(&ReplyMarkup::menu_keyboard()))
            .await
            .map(drop)
    }

    /// Edit the message a button belongs to, or send a new one.
    async fn show(&self, origin: &Origin, text: &str, markup: ReplyMarkup) -> Result<()> {
        match origin {
            Origin::Callback {
                message: Some((chat_id, message_id)),
                ..
            } => {
                self.telegram
                    .edit_message_text(*chat_id, *message_id, text, Some(&markup))
                    .await
            }
            _ => self
                .telegram
                .send_message(text, Some(&markup))
                .await
                .map(drop),
        }
    }

    /// Acknowledge a button press. Never fails; stale queries are ignored.
    async fn answer(&self, origin: &Origin, text: Option<&str>) {
        let Origin::Callback { query_id, .. } = origin else {
            return;
        };
        if let Err(e) = self.telegram.answer_callback_query(query_id, text).await {
            if e.is_stale_callback() {
                warn!(error = %e, "Ignoring old callback query");
            } else {
                error!(error = %e, "answerCallbackQuery failed");
            }
        }
    }

    async fn clear_markup(&self, origin: &Origin) {
        if let Origin::Callback {
            message: Some((chat_id, message_id)),
            ..
        } = origin
        {
            if let Err(e) = self.telegram.clear_reply_markup(*chat_id, *message_id).await {
                debug!(error = %e, "Failed to remove inline keyboard");
            }
        }
    }
}

fn log_handler_result(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(join_err) = joined {
        if join_err.is_panic() {
            let payload = join_err.into_panic();
            error!(
                panic = %crate::panic_hook::caught_payload_to_string(payload.as_ref()),
                "Bot update handler panicked"
            );
        }
    }
}
