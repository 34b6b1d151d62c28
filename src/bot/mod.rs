//! Bot Loop
//!
//! Long-polls the Bot API and routes every update: commands, free text
//! (interpreted through the per-chat conversation state), and the inline
//! decision buttons. One update is handled to completion before the next,
//! so per-chat ordering holds by construction.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::pipeline::{PendingEntry, Pipeline};
use crate::telegram::{CallbackQuery, Message, TelegramClient, Update};
use crate::types::{Decision, PmError, Result, Stage, parse_callback};

const STALE_NOTICE: &str = "⚠️ That preview was already processed or expired.";

const HELP_TEXT: &str = "\
*Product pipeline bot*

Send any text to start: the idea is enriched, ticketed, and then walked \
through PRD → prototype → epic → tasks → engineering review → sprint, with \
an approval preview between every step.

*Commands*
/idea <text> — start the pipeline explicitly
/pending — list parked items with resume buttons
/update <KEY> <instruction> — backlog, archive, sprint moves, breakdowns, \
or any free-text field update
/done — clear the current conversation state
/help — this message

*Preview buttons*
✅ Approve moves on, 🔄 Changes regenerates with your instructions, \
⏸ Pending parks for later, ⛔ Reject stops the line.";

/// What the next plain-text message from a chat means.
#[derive(Debug, Clone)]
enum ChatState {
    AwaitingIdea,
    AwaitingInspiration { issue_key: String, summary: String },
    AwaitingChanges { stage: Stage, message_id: i64 },
}

pub struct Bot {
    pipeline: Arc<Pipeline>,
    telegram: Arc<TelegramClient>,
    states: DashMap<i64, ChatState>,
}

impl Bot {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let telegram = pipeline.telegram.clone();
        Self {
            pipeline,
            telegram,
            states: DashMap::new(),
        }
    }

    /// Poll forever. Each update is handled to completion; failures are
    /// reported to the chat and never kill the loop.
    pub async fn run(&self) -> Result<()> {
        info!("bot loop started");
        let mut offset = 0i64;
        loop {
            let updates = match self.telegram.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.dispatch(update).await;
            }
        }
    }

    async fn dispatch(&self, update: Update) {
        if let Some(message) = update.message {
            let chat_id = message.chat.id;
            if let Err(e) = self.handle_message(message).await {
                self.report(chat_id, &e).await;
            }
        } else if let Some(callback) = update.callback_query {
            let chat_id = callback.message.as_ref().map(|m| m.chat.id);
            if let Err(e) = self.handle_callback(callback).await
                && let Some(chat_id) = chat_id
            {
                self.report(chat_id, &e).await;
            }
        }
    }

    async fn report(&self, chat_id: i64, error: &PmError) {
        error!(%chat_id, %error, "update handling failed");
        let text = if error.is_stale() {
            STALE_NOTICE.to_string()
        } else {
            format!("❌ {}", error)
        };
        if let Err(e) = self.telegram.send_message(chat_id, &text, None).await {
            error!(error = %e, "could not report failure to chat");
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    async fn handle_message(&self, message: Message) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Some(rest) = command(text, "/start").or_else(|| command(text, "/help")) {
            let _ = rest;
            self.telegram.send_message(chat_id, HELP_TEXT, None).await?;
            return Ok(());
        }
        if let Some(rest) = command(text, "/idea") {
            if rest.is_empty() {
                self.states.insert(chat_id, ChatState::AwaitingIdea);
                self.telegram
                    .send_message(chat_id, "💡 Send me the idea.", None)
                    .await?;
            } else {
                self.states.remove(&chat_id);
                self.pipeline.process_idea(chat_id, rest).await?;
            }
            return Ok(());
        }
        if command(text, "/pending").is_some() {
            return self.pipeline.list_parked(chat_id).await;
        }
        if let Some(rest) = command(text, "/update") {
            return self.pipeline.handle_update(chat_id, rest).await;
        }
        if command(text, "/done").is_some() {
            self.states.remove(&chat_id);
            self.telegram
                .send_message(chat_id, "State cleared. Send a new idea any time.", None)
                .await?;
            return Ok(());
        }

        self.handle_plain_text(chat_id, text).await
    }

    async fn handle_plain_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let state = self.states.remove(&chat_id).map(|(_, s)| s);
        match state {
            Some(ChatState::AwaitingIdea) | None => {
                self.pipeline.process_idea(chat_id, text).await
            }
            Some(ChatState::AwaitingInspiration { issue_key, summary }) => {
                let inspiration = if text.eq_ignore_ascii_case("skip") {
                    ""
                } else {
                    text
                };
                self.pipeline
                    .process_prd(chat_id, &issue_key, &summary, inspiration)
                    .await
            }
            Some(ChatState::AwaitingChanges { stage, message_id }) => {
                let Some(entry) = self.pipeline.pending.take(message_id) else {
                    return Err(PmError::Stale(format!(
                        "{} preview is gone",
                        stage.label()
                    )));
                };
                self.apply_changes(entry, text).await
            }
        }
    }

    async fn apply_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        match entry.stage() {
            Stage::Intake => self.pipeline.apply_intake_changes(entry, changes).await,
            Stage::Prd => self.pipeline.apply_prd_changes(entry, changes).await,
            Stage::Prototype => self.pipeline.apply_prototype_changes(entry, changes).await,
            Stage::Epic => self.pipeline.apply_epic_changes(entry, changes).await,
            Stage::Tasks => self.pipeline.apply_task_changes(entry, changes).await,
            Stage::Engineer => self.pipeline.apply_engineer_changes(entry, changes).await,
            Stage::Sprint => Err(PmError::Stale("sprint moves have no preview".to_string())),
        }
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    async fn handle_callback(&self, callback: CallbackQuery) -> Result<()> {
        // Ack first so the client spinner clears even on a slow stage
        self.telegram.answer_callback(&callback.id).await;

        let Some(message) = callback.message else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let message_id = message.message_id;
        let Some(data) = callback.data.as_deref() else {
            return Ok(());
        };

        if let Some(issue_key) = data.strip_prefix("resume_") {
            self.telegram.clear_keyboard(chat_id, message_id).await;
            return self.pipeline.resume(chat_id, issue_key).await;
        }

        let Some((stage, decision)) = parse_callback(data) else {
            warn!(%data, "unrecognized callback data");
            return Ok(());
        };

        if decision == Decision::Changes {
            if !self.pipeline.pending.contains(message_id) {
                return Err(PmError::Stale("preview already consumed".to_string()));
            }
            self.states.insert(
                chat_id,
                ChatState::AwaitingChanges { stage, message_id },
            );
            self.telegram
                .send_message(
                    chat_id,
                    "🔄 Send the change request (or /done to keep it as is).",
                    None,
                )
                .await?;
            return Ok(());
        }

        self.telegram.clear_keyboard(chat_id, message_id).await;
        let Some(entry) = self.pipeline.pending.take(message_id) else {
            return Err(PmError::Stale("preview already consumed".to_string()));
        };

        match decision {
            Decision::Park => self.pipeline.park_entry(entry).await,
            Decision::Reject => self.reject(entry).await,
            Decision::Approve => self.approve(chat_id, entry).await,
            Decision::Changes => unreachable!("handled above"),
        }
    }

    async fn approve(&self, chat_id: i64, entry: PendingEntry) -> Result<()> {
        match entry.stage() {
            Stage::Intake => {
                let (issue_key, summary) = self.pipeline.approve_intake(entry).await?;
                self.states.insert(
                    chat_id,
                    ChatState::AwaitingInspiration { issue_key, summary },
                );
                Ok(())
            }
            Stage::Prd => self.pipeline.approve_prd(entry).await,
            Stage::Prototype => self.pipeline.approve_prototype(entry).await,
            Stage::Epic => self.pipeline.approve_epic(entry).await,
            Stage::Tasks => self.pipeline.approve_tasks(entry).await,
            Stage::Engineer => self.pipeline.approve_engineer(entry).await,
            Stage::Sprint => Err(PmError::Stale("sprint moves have no preview".to_string())),
        }
    }

    async fn reject(&self, entry: PendingEntry) -> Result<()> {
        match entry.stage() {
            Stage::Intake => self.pipeline.reject_intake(entry).await,
            Stage::Prd => self.pipeline.reject_prd(entry).await,
            Stage::Prototype => self.pipeline.reject_prototype(entry).await,
            Stage::Epic => self.pipeline.reject_epic(entry).await,
            Stage::Tasks => self.pipeline.reject_tasks(entry).await,
            Stage::Engineer => self.pipeline.reject_engineer(entry).await,
            Stage::Sprint => Err(PmError::Stale("sprint moves have no preview".to_string())),
        }
    }
}

/// Match a command with or without arguments, tolerating the @botname
/// suffix Telegram appends in groups.
fn command<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?;
    if let Some(tail) = rest.strip_prefix('@') {
        return match tail.split_once(char::is_whitespace) {
            Some((_, after)) => Some(after.trim()),
            None => Some(""),
        };
    }
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ').map(str::trim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_matching() {
        assert_eq!(command("/idea", "/idea"), Some(""));
        assert_eq!(command("/idea faster quotes", "/idea"), Some("faster quotes"));
        assert_eq!(command("/idea@pm_bot faster quotes", "/idea"), Some("faster quotes"));
        assert_eq!(command("/pending", "/pending"), Some(""));
        assert_eq!(command("hello", "/idea"), None);
    }

    #[test]
    fn test_command_requires_space_before_args() {
        // "/ideas" must not match "/idea"
        assert_eq!(command("/ideas backlog", "/idea"), None);
    }
}
