//! Parsing of chat commands and inline button callbacks.

use crate::notification::MENU_BUTTON;
use crate::relay::{EVENT_CLIP_CALLBACK_PREFIX, SEND_MENU_CALLBACK};

/// Callback prefix of a camera in the live-frame picker.
pub const CAMERA_CALLBACK_PREFIX: &str = "camera:";

/// Callback prefix of a camera in the review picker.
pub const REVIEW_CAMERA_CALLBACK_PREFIX: &str = "review_cam:";

/// Something the operator asked for, by text or by button.
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    /// `/start`: greeting plus the main menu.
    Start,
    /// The `Меню` reply button, or the `send_menu` button under a notification.
    ShowMenu,
    MenuBack,
    MenuNotifications,
    MenuSystem,
    MenuCameras,
    MenuReviews,
    Help,
    Filters,
    Ping,
    /// Mute for the given minutes, or the configured default.
    Mute { minutes: Option<f64> },
    Unmute,
    Status,
    Health,
    /// Camera picker for live frames.
    Cameras,
    /// Latest annotated frame of one camera.
    Camera(String),
    /// Latest review across all cameras.
    LastReview,
    /// Camera picker for reviews.
    PickReviewCamera,
    /// Latest review of one camera.
    ReviewCamera(String),
    /// Clip of one event, from the button under its notification.
    EventClip(String),
}

impl BotCommand {
    /// Parse a text message. `None` for anything that is not a command.
    pub fn parse_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == MENU_BUTTON {
            return Some(Self::ShowMenu);
        }

        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        // Group chats address commands as `/cmd@BotName`.
        let name = head.split('@').next().unwrap_or(head);

        let command = match name {
            "start" => Self::Start,
            "mute_30m" => Self::Mute {
                minutes: Some(30.0),
            },
            "mute_1h" => Self::Mute {
                minutes: Some(60.0),
            },
            "mute" => Self::Mute {
                minutes: parts.next().and_then(|arg| arg.parse::<f64>().ok()),
            },
            "unmute" => Self::Unmute,
            "status" => Self::Status,
            "health" => Self::Health,
            "cameras" => Self::Cameras,
            "last_review" => Self::LastReview,
            "help" => Self::Help,
            _ => return None,
        };
        Some(command)
    }

    /// Parse inline button callback data.
    pub fn parse_callback(data: &str) -> Option<Self> {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        if let Some(camera) = data.strip_prefix(CAMERA_CALLBACK_PREFIX) {
            return non_empty(camera).map(Self::Camera);
        }
        if let Some(camera) = data.strip_prefix(REVIEW_CAMERA_CALLBACK_PREFIX) {
            return non_empty(camera).map(Self::ReviewCamera);
        }
        if let Some(event_id) = data.strip_prefix(EVENT_CLIP_CALLBACK_PREFIX) {
            return non_empty(event_id).map(Self::EventClip);
        }

        let command = match data {
            SEND_MENU_CALLBACK => Self::ShowMenu,
            "menu_back" => Self::MenuBack,
            "menu_notifications" => Self::MenuNotifications,
            "menu_system" => Self::MenuSystem,
            "menu_cameras" => Self::MenuCameras,
            "menu_reviews" => Self::MenuReviews,
            "help" => Self::Help,
            "filters" => Self::Filters,
            "ping" => Self::Ping,
            "unmute" => Self::Unmute,
            "mute_30" => Self::Mute {
                minutes: Some(30.0),
            },
            "status" => Self::Status,
            "health" => Self::Health,
            "cameras" => Self::Cameras,
            "last_review" => Self::PickReviewCamera,
            _ => return None,
        };
        Some(command)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ShowMenu => "menu",
            Self::MenuBack => "menu_back",
            Self::MenuNotifications => "menu_notifications",
            Self::MenuSystem => "menu_system",
            Self::MenuCameras => "menu_cameras",
            Self::MenuReviews => "menu_reviews",
            Self::Help => "help",
            Self::Filters => "filters",
            Self::Ping => "ping",
            Self::Mute { .. } => "mute",
            Self::Unmute => "unmute",
            Self::Status => "status",
            Self::Health => "health",
            Self::Cameras => "cameras",
            Self::Camera(_) => "camera",
            Self::LastReview => "last_review",
            Self::PickReviewCamera => "pick_review_camera",
            Self::ReviewCamera(_) => "review_camera",
            Self::EventClip(_) => "event_clip",
        }
    }

    /// Reply sent when handling the command fails.
    pub fn failure_text(&self) -> String {
        match self {
            Self::Cameras => "Не удалось получить список камер из Frigate.".to_string(),
            Self::MenuCameras => "Не удалось загрузить список камер.".to_string(),
            Self::Camera(name) => format!("Не удалось получить кадр камеры {name}."),
            Self::LastReview => {
                "Не удалось получить данные последнего обзора из Frigate.".to_string()
            }
            Self::PickReviewCamera => "Не удалось получить данные для обзора из Frigate.".to_string(),
            Self::ReviewCamera(name) => {
                format!("Не удалось получить данные последнего обзора для камеры {name}.")
            }
            Self::EventClip(_) => "Не удалось получить видео события.".to_string(),
            _ => "Не удалось выполнить команду.".to_string(),
        }
    }
}
