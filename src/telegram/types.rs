//! Bot API Wire Types
//!
//! Just the subset of the Telegram Bot API the bot actually touches.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboardMarkup {
    /// Lay buttons out `per_row` wide.
    pub fn rows(buttons: Vec<InlineKeyboardButton>, per_row: usize) -> Self {
        let width = per_row.max(1);
        Self {
            inline_keyboard: buttons
                .chunks(width)
                .map(|chunk| chunk.to_vec())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub result: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_chunks_two_wide() {
        let kb = InlineKeyboardMarkup::rows(
            vec![
                InlineKeyboardButton::new("a", "1"),
                InlineKeyboardButton::new("b", "2"),
                InlineKeyboardButton::new("c", "3"),
            ],
            2,
        );
        assert_eq!(kb.inline_keyboard.len(), 2);
        assert_eq!(kb.inline_keyboard[0].len(), 2);
        assert_eq!(kb.inline_keyboard[1].len(), 1);
    }

    #[test]
    fn test_update_parses_callback() {
        let raw = r#"{
            "update_id": 42,
            "callback_query": {
                "id": "cb1",
                "data": "pm2_approve",
                "message": { "message_id": 7, "chat": { "id": 99 }, "text": "preview" }
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("pm2_approve"));
        assert_eq!(cb.message.unwrap().chat.id, 99);
    }
}
