//! Menu texts and keyboards.

use frigate_api::ReviewSummary;

use super::command::{CAMERA_CALLBACK_PREFIX, REVIEW_CAMERA_CALLBACK_PREFIX};
use crate::event::FilterConfig;
use crate::notification::{InlineButton, ReplyMarkup};

pub const MAIN_MENU_TEXT: &str = "Главное меню:\n\n\
    Уведомления — мут/размут, статус.\n\
    Система — MQTT и Frigate API.\n\
    Камеры — живой кадр по камере.\n\
    Обзоры и события — последний обзор с фото и видео.";

pub const HELP_TEXT: &str = "Справка\n\n\
    Меню — кнопка «Меню» или команда /start.\n\
    Уведомления: /unmute, /mute_30m, /mute_1h, /mute <минуты>, /status.\n\
    Система: /health.\n\
    Камеры: /cameras.\n\
    Последний обзор: /last_review.\n\n\
    В меню: Уведомления (мут/размут), Система (MQTT + Frigate), Камеры, Обзоры.";

pub const NOTIFICATIONS_MENU_TEXT: &str = "Уведомления: мут, размут, статус.";
pub const SYSTEM_MENU_TEXT: &str = "Состояние MQTT и Frigate API.";
pub const REVIEWS_MENU_TEXT: &str = "Обзоры и события: последний обзор по камере (фото + видео).";
pub const PICK_CAMERA_TEXT: &str = "Выберите камеру:";
pub const PICK_REVIEW_CAMERA_TEXT: &str = "Выберите камеру для последнего обзора:";
pub const NO_CAMERAS_TEXT: &str = "Камеры не найдены в Frigate.";
pub const NO_REVIEWS_TEXT: &str = "Нет доступных событий для обзора.";
pub const CLIP_CAPTION: &str = "Видеофрагмент события (clip.mp4).";

fn back_button() -> InlineButton {
    InlineButton::callback("Назад", "menu_back")
}

pub fn start_text(filters: &FilterConfig) -> String {
    format!(
        "Привет! Я бот уведомлений Frigate.\n\
         Я буду присылать сработки ({}) из зон {} с фото и обводкой объекта.",
        join_or_dash(&filters.allowed_labels, " / "),
        join_or_dash(&filters.allowed_zones, ", "),
    )
}

pub fn main_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::inline(vec![
        vec![InlineButton::callback("Уведомления", "menu_notifications")],
        vec![InlineButton::callback("Система", "menu_system")],
        vec![InlineButton::callback("Камеры", "menu_cameras")],
        vec![InlineButton::callback("Обзоры и события", "menu_reviews")],
        vec![
            InlineButton::callback("Справка", "help"),
            InlineButton::callback("Фильтры", "filters"),
            InlineButton::callback("Пинг", "ping"),
        ],
    ])
}

pub fn notifications_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::inline_column([
        InlineButton::callback("Включить уведомления", "unmute"),
        InlineButton::callback("Мут 30 мин", "mute_30"),
        InlineButton::callback("Статус уведомлений", "status"),
        back_button(),
    ])
}

pub fn system_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::inline_column([
        InlineButton::callback("Состояние системы", "health"),
        back_button(),
    ])
}

pub fn reviews_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::inline_column([
        InlineButton::callback("Последний обзор", "last_review"),
        back_button(),
    ])
}

/// One button per camera opening its live frame.
pub fn camera_picker(cameras: &[String]) -> ReplyMarkup {
    picker(cameras, CAMERA_CALLBACK_PREFIX)
}

/// One button per camera opening its latest review.
pub fn review_camera_picker(cameras: &[String]) -> ReplyMarkup {
    picker(cameras, REVIEW_CAMERA_CALLBACK_PREFIX)
}

fn picker(cameras: &[String], prefix: &str) -> ReplyMarkup {
    ReplyMarkup::inline_column(
        cameras
            .iter()
            .map(|name| InlineButton::callback(name.as_str(), format!("{prefix}{name}"))),
    )
}

/// Camera picker inside the menu, with a back button.
pub fn camera_menu_keyboard(cameras: &[String]) -> ReplyMarkup {
    let mut rows: Vec<Vec<InlineButton>> = if cameras.is_empty() {
        vec![vec![InlineButton::callback("(нет камер)", "menu_back")]]
    } else {
        cameras
            .iter()
            .map(|name| {
                vec![InlineButton::callback(
                    name.as_str(),
                    format!("{CAMERA_CALLBACK_PREFIX}{name}"),
                )]
            })
            .collect()
    };
    rows.push(vec![back_button()]);
    ReplyMarkup::inline(rows)
}

pub fn filters_text(filters: &FilterConfig) -> String {
    format!(
        "Текущие фильтры:\n\nМетки: {}\nЗоны: {}",
        join_or_dash(&filters.allowed_labels, ", "),
        join_or_dash(&filters.allowed_zones, ", ")
    )
}

pub fn ping_text(time: &str, frigate_ok: bool) -> String {
    let frigate = if frigate_ok {
        "Frigate: OK"
    } else {
        "Frigate: недоступен"
    };
    format!("Понг. {time}\n{frigate}")
}

pub fn camera_frame_caption(camera: &str) -> String {
    format!("Текущее изображение камеры {camera}.")
}

pub fn review_caption(review: &ReviewSummary, event_id: &str) -> String {
    format!(
        "Последний обзор на камере {}.\nID обзора: {}\nID события: {}",
        review.camera, review.id, event_id
    )
}

pub fn review_without_events_text(review: &ReviewSummary) -> String {
    format!(
        "Последний обзор найден (камера {}), но нет связанных событий для показа.",
        review.camera
    )
}

pub fn no_reviews_for_camera_text(camera: &str) -> String {
    format!("Для камеры {camera} нет доступных событий для обзора.")
}

fn join_or_dash(items: &[String], sep: &str) -> String {
    if items.is_empty() {
        "—".to_string()
    } else {
        items.join(sep)
    }
}
