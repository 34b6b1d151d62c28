//! Product Pipeline
//!
//! The seven-stage flow from raw idea to scheduled sprint work. Each stage
//! module adds its handlers onto the shared `Pipeline` struct; this module
//! owns the struct, the shared chat helpers, and park/resume plumbing.

pub mod actions;
pub mod engineer;
pub mod epic;
pub mod intake;
pub mod park;
pub mod pending;
pub mod prd;
pub mod previews;
pub mod prototype;
pub mod resume;
pub mod sprint;
pub mod tasks;

use std::sync::Arc;
use tracing::info;

use crate::ai::ClaudeClient;
use crate::clients::{ConfluenceClient, DbClient, GithubClient, JiraClient, WebClient};
use crate::config::Config;
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup, TelegramClient};
use crate::types::{Decision, Result, Stage, callback_data};

pub use park::{IndexStore, MarkerStore, ParkStore, ParkedRecord};
pub use pending::{PendingEntry, PendingStore};
pub use resume::{ArtifactFetcher, LiveArtifacts};

pub struct Pipeline {
    pub config: Config,
    pub claude: Arc<ClaudeClient>,
    pub jira: Arc<JiraClient>,
    pub confluence: Arc<ConfluenceClient>,
    pub github: Arc<GithubClient>,
    pub db: Option<Arc<DbClient>>,
    pub web: Arc<WebClient>,
    pub telegram: Arc<TelegramClient>,
    pub pending: PendingStore,
    pub park: ParkStore,
    artifacts: LiveArtifacts,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        claude: Arc<ClaudeClient>,
        jira: Arc<JiraClient>,
        confluence: Arc<ConfluenceClient>,
        github: Arc<GithubClient>,
        db: Option<Arc<DbClient>>,
        web: Arc<WebClient>,
        telegram: Arc<TelegramClient>,
    ) -> Self {
        let park = ParkStore::new(jira.clone(), github.clone());
        let artifacts = LiveArtifacts {
            jira: jira.clone(),
            confluence: confluence.clone(),
            github: github.clone(),
        };
        Self {
            config,
            claude,
            jira,
            confluence,
            github,
            db,
            web,
            telegram,
            pending: PendingStore::new(),
            park,
            artifacts,
        }
    }

    // =========================================================================
    // Chat helpers
    // =========================================================================

    /// Send a transient status line, returning its message id for edits.
    pub(crate) async fn status(&self, chat_id: i64, text: &str) -> Result<i64> {
        self.telegram.send_message(chat_id, text, None).await
    }

    pub(crate) async fn edit_status(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<()> {
        self.telegram.edit_message_text(chat_id, message_id, text).await
    }

    /// The four-button decision keyboard for a stage, two buttons per row.
    pub(crate) fn decision_keyboard(stage: Stage) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::rows(
            vec![
                InlineKeyboardButton::new("✅ Approve", callback_data(stage, Decision::Approve)),
                InlineKeyboardButton::new("🔄 Changes", callback_data(stage, Decision::Changes)),
                InlineKeyboardButton::new("⏸ Pending", callback_data(stage, Decision::Park)),
                InlineKeyboardButton::new("⛔ Reject", callback_data(stage, Decision::Reject)),
            ],
            2,
        )
    }

    /// Send a stage preview with its decision keyboard and install the
    /// pending entry under the preview's message id.
    pub(crate) async fn install_preview(
        &self,
        chat_id: i64,
        text: &str,
        entry: PendingEntry,
    ) -> Result<i64> {
        let keyboard = Self::decision_keyboard(entry.stage());
        let message_id = self
            .telegram
            .send_message(chat_id, text, Some(&keyboard))
            .await?;
        self.pending.put(message_id, entry);
        Ok(message_id)
    }

    // =========================================================================
    // Park / resume
    // =========================================================================

    /// Park a pending entry and confirm in chat.
    pub async fn park_entry(&self, entry: PendingEntry) -> Result<()> {
        let chat_id = entry.chat_id();
        let record = resume::project(&entry)?;
        self.park.park(&record).await?;
        info!(key = %record.issue_key, stage = %record.stage, "parked");
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "⏸ [{key}]({url}) parked at {label}. Use /pending to resume.",
                    key = record.issue_key,
                    url = self.jira.browse_url(&record.issue_key),
                    label = entry.stage().label(),
                ),
                None,
            )
            .await?;
        Ok(())
    }

    /// Resume a parked item: pop it from the store, rebuild the pending
    /// entry from live artifacts, and re-send the stage preview.
    pub async fn resume(&self, chat_id: i64, issue_key: &str) -> Result<()> {
        let record = self.park.unpark(issue_key).await?;
        let Some(entry) = resume::reconstruct(&record, chat_id, &self.artifacts).await? else {
            self.telegram
                .send_message(chat_id, &resume::unknown_stage_notice(&record), None)
                .await?;
            return Ok(());
        };

        let text = previews::entry_preview(&entry, &self.jira.browse_url(entry.issue_key()));
        self.install_preview(chat_id, &text, entry).await?;
        Ok(())
    }

    /// List parked items with per-item resume buttons.
    pub async fn list_parked(&self, chat_id: i64) -> Result<()> {
        let records = self.park.list_parked().await?;
        if records.is_empty() {
            self.telegram
                .send_message(chat_id, "Nothing is parked. 🎉", None)
                .await?;
            return Ok(());
        }

        let text = previews::parked_list(&records);
        let buttons: Vec<InlineKeyboardButton> = records
            .iter()
            .map(|r| {
                InlineKeyboardButton::new(
                    format!("▶️ Resume {}", r.issue_key),
                    format!("resume_{}", r.issue_key),
                )
            })
            .collect();
        let keyboard = InlineKeyboardMarkup::rows(buttons, 1);
        self.telegram
            .send_message(chat_id, &text, Some(&keyboard))
            .await?;
        Ok(())
    }
}
