//! Telegram Client
//!
//! Long-poll getUpdates plus the handful of send/edit calls the bot uses.
//! Messages go out in Markdown parse mode with web previews disabled.

pub mod types;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::constants::telegram as tg;
use crate::types::{PmError, Result, ResultExt};
pub use types::{
    ApiResponse, CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update,
};

pub struct TelegramClient {
    client: Client,
    token: SecretString,
    poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // Request timeout must outlive the long-poll hold
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .with_service("telegram")?;
        Ok(Self {
            client,
            token: SecretString::from(config.bot_token.clone()),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let url = format!(
            "https://api.telegram.org/bot{}/{}",
            self.token.expose_secret(),
            method
        );
        let response: ApiResponse<T> = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_service("telegram")?
            .json()
            .await
            .with_service("telegram")?;
        if !response.ok {
            return Err(PmError::external(
                "telegram",
                format!(
                    "{} failed: {}",
                    method,
                    response.description.unwrap_or_default()
                ),
            ));
        }
        response
            .result
            .ok_or_else(|| PmError::external("telegram", format!("{} returned no result", method)))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({ "offset": offset, "timeout": self.poll_timeout_secs }),
        )
        .await
    }

    /// Send a Markdown message, optionally with an inline keyboard.
    /// Returns the sent message id. Oversized text is hard-cut at the API
    /// limit; previews should already have been soft-truncated upstream.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": hard_cut(text),
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        if let Some(kb) = keyboard {
            payload["reply_markup"] = serde_json::to_value(kb).with_service("telegram")?;
        }
        let message: Message = self.call("sendMessage", &payload).await?;
        Ok(message.message_id)
    }

    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": hard_cut(text),
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        self.call::<Value>("editMessageText", &payload).await?;
        Ok(())
    }

    /// Strip the inline keyboard off a message. Failure is logged and
    /// swallowed; a leftover keyboard is cosmetic.
    pub async fn clear_keyboard(&self, chat_id: i64, message_id: i64) {
        let payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": { "inline_keyboard": [] },
        });
        if let Err(e) = self.call::<Value>("editMessageReplyMarkup", &payload).await {
            debug!(error = %e, "could not clear keyboard");
        }
    }

    /// Ack a callback so the client stops showing a spinner.
    pub async fn answer_callback(&self, callback_id: &str) {
        let payload = json!({ "callback_query_id": callback_id });
        if let Err(e) = self.call::<Value>("answerCallbackQuery", &payload).await {
            warn!(error = %e, "answerCallbackQuery failed");
        }
    }

    /// Delete a message, ignoring failures (it may already be gone).
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) {
        let payload = json!({ "chat_id": chat_id, "message_id": message_id });
        if let Err(e) = self.call::<Value>("deleteMessage", &payload).await {
            debug!(error = %e, "could not delete message");
        }
    }
}

/// Hard cut at the Bot API message limit, on a char boundary.
fn hard_cut(text: &str) -> String {
    if text.chars().count() <= tg::MESSAGE_LIMIT {
        text.to_string()
    } else {
        text.chars().take(tg::MESSAGE_LIMIT - 1).collect::<String>() + "…"
    }
}

/// Soft truncation for previews: keep room for links and buttons below the
/// hard limit, appending a notice when content was dropped.
pub fn soft_truncate(text: &str, notice: &str) -> String {
    if text.chars().count() <= tg::PREVIEW_SOFT_LIMIT {
        return text.to_string();
    }
    let kept: String = text
        .chars()
        .take(tg::PREVIEW_SOFT_LIMIT - notice.chars().count() - 1)
        .collect();
    format!("{}\n{}", kept, notice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_cut_limits_length() {
        let long = "x".repeat(5000);
        let cut = hard_cut(&long);
        assert_eq!(cut.chars().count(), tg::MESSAGE_LIMIT);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_hard_cut_passthrough() {
        assert_eq!(hard_cut("short"), "short");
    }

    #[test]
    fn test_soft_truncate_appends_notice() {
        let long = "y".repeat(4500);
        let out = soft_truncate(&long, "_(truncated)_");
        assert!(out.chars().count() <= tg::PREVIEW_SOFT_LIMIT);
        assert!(out.ends_with("_(truncated)_"));
    }

    #[test]
    fn test_soft_truncate_passthrough() {
        assert_eq!(soft_truncate("fine", "_(truncated)_"), "fine");
    }
}
