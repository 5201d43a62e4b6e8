//! Outbound notifications.
//!
//! [`Dispatcher`] is the seam the relay pipeline and the background tasks
//! send through; [`channels::TelegramChannel`] is the production
//! implementation.

pub mod channels;
mod keyboard;

pub use channels::{TelegramChannel, TelegramConfig};
pub use keyboard::{InlineButton, KeyboardButton, MENU_BUTTON, ReplyMarkup};

use async_trait::async_trait;
use frigate_api::MediaFile;

use crate::Result;

/// Sends messages to the one configured destination.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send_text(&self, text: &str, markup: Option<&ReplyMarkup>) -> Result<()>;

    async fn send_photo(
        &self,
        photo: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()>;

    async fn send_video(
        &self,
        video: MediaFile,
        caption: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()>;
}
