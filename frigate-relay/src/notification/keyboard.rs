//! Telegram reply markup.

use serde::{Deserialize, Serialize};

/// Label of the persistent reply-keyboard button that opens the main menu.
pub const MENU_BUTTON: &str = "Меню";

/// An inline button carrying callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// `reply_markup` of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline {
        inline_keyboard: Vec<Vec<InlineButton>>,
    },
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
    },
}

impl ReplyMarkup {
    pub fn inline(rows: Vec<Vec<InlineButton>>) -> Self {
        Self::Inline {
            inline_keyboard: rows,
        }
    }

    /// One button per row.
    pub fn inline_column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self::inline(buttons.into_iter().map(|b| vec![b]).collect())
    }

    /// Resized reply keyboard with the single menu button.
    pub fn menu_keyboard() -> Self {
        Self::Keyboard {
            keyboard: vec![vec![KeyboardButton {
                text: MENU_BUTTON.to_string(),
            }]],
            resize_keyboard: true,
        }
    }

    /// Inline rows, if this is an inline keyboard.
    pub fn inline_rows(&self) -> Option<&[Vec<InlineButton>]> {
        match self {
            Self::Inline { inline_keyboard } => Some(inline_keyboard),
            Self::Keyboard { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_wire_format() {
        let markup = ReplyMarkup::inline(vec![vec![
            InlineButton::callback("▶️ Видео события", "event_clip:e1"),
            InlineButton::callback("Меню", "send_menu"),
        ]]);

        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            json!({"inline_keyboard": [[
                {"text": "▶️ Видео события", "callback_data": "event_clip:e1"},
                {"text": "Меню", "callback_data": "send_menu"}
            ]]})
        );
    }

    #[test]
    fn test_menu_keyboard_wire_format() {
        assert_eq!(
            serde_json::to_value(ReplyMarkup::menu_keyboard()).unwrap(),
            json!({"keyboard": [[{"text": "Меню"}]], "resize_keyboard": true})
        );
        assert!(ReplyMarkup::menu_keyboard().inline_rows().is_none());
    }

    #[test]
    fn test_inline_column() {
        let markup = ReplyMarkup::inline_column(["a", "b"].map(|n| InlineButton::callback(n, n)));
        assert_eq!(markup.inline_rows().map(|r| r.len()), Some(2));
    }
}
