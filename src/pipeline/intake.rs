//! Stage 1: Idea Intake
//!
//! Free text in, enriched tracker ticket out. The enriched draft is
//! previewed before anything becomes visible to the wider team; approval
//! hands off to the PRD stage through an inspiration prompt.

use serde_json::json;
use tracing::info;

use crate::ai::prompts;
use crate::convert::{adf_doc, markdown_to_adf};
use crate::pipeline::{PendingEntry, Pipeline, previews};
use crate::types::{EnrichedIdea, PmError, Result, Stage};

impl Pipeline {
    /// Enrich a raw idea, create the tracker ticket, and preview it.
    pub async fn process_idea(&self, chat_id: i64, raw_idea: &str) -> Result<()> {
        let status_id = self.status(chat_id, "💡 Reading the knowledge base…").await?;

        let kb_context = self.confluence.kb_context().await;
        self.edit_status(chat_id, status_id, "💡 Enriching the idea…")
            .await?;

        let idea: EnrichedIdea = self
            .claude
            .generate_json(
                &prompts::enrich_idea(raw_idea, &kb_context),
                self.claude.default_max_tokens,
                Stage::Intake,
            )
            .await?;

        self.edit_status(chat_id, status_id, "💡 Creating the ticket…")
            .await?;
        let issue_key = self.create_idea_issue(&idea).await?;
        info!(%issue_key, "idea ticket created");

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::idea_preview(&issue_key, &self.jira.browse_url(&issue_key), &idea);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Intake {
                issue_key,
                structured: idea,
                raw_idea: raw_idea.to_string(),
                kb_context,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }

    async fn create_idea_issue(&self, idea: &EnrichedIdea) -> Result<String> {
        let labels: Vec<String> = idea
            .labels
            .split(',')
            .map(|l| l.trim().replace(' ', "-"))
            .filter(|l| !l.is_empty())
            .collect();
        let mut extra = serde_json::Map::new();
        extra.insert("labels".to_string(), json!(labels));
        extra.insert(
            self.config.jira.discovery_field.clone(),
            json!({ "value": idea.discovery }),
        );
        let extra = serde_json::Value::Object(extra);
        self.jira
            .create_issue(
                &self.config.jira.idea_project,
                "Idea",
                &idea.summary,
                adf_doc(markdown_to_adf(&idea.description)),
                extra,
            )
            .await
    }

    /// Approve: comment the decision and ask for PRD inspiration. Returns
    /// (key, summary) so the conversation can collect the inspiration text.
    pub async fn approve_intake(&self, entry: PendingEntry) -> Result<(String, String)> {
        let PendingEntry::Intake {
            issue_key,
            structured,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not an idea preview".to_string()));
        };

        self.jira
            .add_comment(&issue_key, "**Idea approved** — moving on to the PRD.")
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "✅ [{key}]({url}) — Approved.\n\nAny inspiration for the PRD? Send links or notes, or reply \"skip\".",
                    key = issue_key,
                    url = self.jira.browse_url(&issue_key),
                ),
                None,
            )
            .await?;
        Ok((issue_key, structured.summary))
    }

    /// Reject: mark the discovery field Won't Do and comment.
    pub async fn reject_intake(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Intake {
            issue_key, chat_id, ..
        } = entry
        else {
            return Err(PmError::Stale("not an idea preview".to_string()));
        };

        let mut fields = serde_json::Map::new();
        fields.insert(
            self.config.jira.discovery_field.clone(),
            json!({ "id": self.config.jira.discovery_wont_do_id }),
        );
        self.jira
            .update_fields(&issue_key, serde_json::Value::Object(fields))
            .await?;
        self.jira
            .add_comment(&issue_key, "**Idea rejected** — marked Won't Do.")
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "⛔ [{key}]({url}) — Rejected and marked Won't Do.",
                    key = issue_key,
                    url = self.jira.browse_url(&issue_key),
                ),
                None,
            )
            .await?;
        Ok(())
    }

    /// Changes: regenerate the enrichment from the original draft plus the
    /// requested edits, update the ticket in place, and re-preview.
    pub async fn apply_intake_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        let PendingEntry::Intake {
            issue_key,
            structured,
            raw_idea,
            kb_context,
            chat_id,
        } = entry
        else {
            return Err(PmError::Stale("not an idea preview".to_string()));
        };

        let status_id = self.status(chat_id, "🔄 Reworking the idea…").await?;
        let original_json = serde_json::to_string(&structured)?;
        let revised: EnrichedIdea = self
            .claude
            .generate_json(
                &prompts::enrich_idea_changes(&original_json, changes, &kb_context),
                self.claude.default_max_tokens,
                Stage::Intake,
            )
            .await?;

        self.jira
            .update_fields(
                &issue_key,
                json!({
                    "summary": revised.summary,
                    "description": adf_doc(markdown_to_adf(&revised.description)),
                }),
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview =
            previews::idea_preview(&issue_key, &self.jira.browse_url(&issue_key), &revised);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Intake {
                issue_key,
                structured: revised,
                raw_idea,
                kb_context,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }
}
