//! Notification channels.

mod telegram;

pub use telegram::{
    CallbackQuery, Chat, DEFAULT_API_BASE, Message, TelegramChannel, TelegramConfig, Update,
};
