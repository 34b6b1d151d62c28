//! Stage 2: PRD
//!
//! Writes the PRD as a Confluence page under the configured parent and
//! links it back to the idea ticket. Rejection deletes the page; changes
//! rewrite it in place at the same id.

use tracing::info;

use crate::ai::prompts;
use crate::convert::markdown_to_wiki;
use crate::pipeline::{PendingEntry, Pipeline, previews};
use crate::types::{PmError, Result};

impl Pipeline {
    /// Generate the PRD from the idea ticket and publish it to Confluence.
    pub async fn process_prd(
        &self,
        chat_id: i64,
        issue_key: &str,
        summary: &str,
        inspiration: &str,
    ) -> Result<()> {
        let status_id = self.status(chat_id, "📋 Gathering context…").await?;

        let idea_description = self.jira.get_description_text(issue_key).await?;
        let kb_context = self.confluence.kb_context().await;

        self.edit_status(chat_id, status_id, "📋 Writing the PRD…")
            .await?;
        let prd_markdown = self
            .claude
            .generate(
                &prompts::prd(summary, &idea_description, &kb_context, inspiration),
                self.claude.default_max_tokens,
            )
            .await?;

        self.edit_status(chat_id, status_id, "📋 Publishing to Confluence…")
            .await?;
        let page_title = format!("PRD — {}", summary);
        let (page_id, web_url) = self
            .confluence
            .create_page(&page_title, &markdown_to_wiki(&prd_markdown))
            .await?;
        info!(%issue_key, %page_id, "PRD page created");

        self.jira
            .add_comment(
                issue_key,
                &format!("**PRD drafted**: [{}]({})", page_title, web_url),
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::prd_preview(
            issue_key,
            &self.jira.browse_url(issue_key),
            summary,
            &web_url,
        );
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Prd {
                issue_key: issue_key.to_string(),
                summary: summary.to_string(),
                page_id,
                page_title,
                web_url,
                prd_markdown,
                kb_context,
                inspiration: inspiration.to_string(),
                chat_id,
            },
        )
        .await?;
        Ok(())
    }

    /// Approve: comment the decision and chain into the prototype stage.
    pub async fn approve_prd(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Prd {
            issue_key,
            summary,
            page_id,
            web_url,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not a PRD preview".to_string()));
        };

        self.jira
            .add_comment(
                &issue_key,
                &format!("**PRD approved**: [{}]({})", summary, web_url),
            )
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "✅ [{key}]({url}) — PRD approved.",
                    key = issue_key,
                    url = self.jira.browse_url(&issue_key),
                ),
                None,
            )
            .await?;

        self.process_prototype(chat_id, &issue_key, &summary, &page_id, &web_url)
            .await
    }

    /// Reject: delete the page so no orphan PRD lingers.
    pub async fn reject_prd(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Prd {
            issue_key,
            page_id,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not a PRD preview".to_string()));
        };

        self.confluence.delete_page(&page_id).await?;
        self.jira
            .add_comment(&issue_key, "**PRD rejected** — page deleted.")
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!("⛔ {} — PRD rejected and the page was deleted.", issue_key),
                None,
            )
            .await?;
        Ok(())
    }

    /// Changes: regenerate against the current PRD text and overwrite the
    /// same page, bumping its version.
    pub async fn apply_prd_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        let PendingEntry::Prd {
            issue_key,
            summary,
            page_id,
            page_title,
            web_url,
            prd_markdown,
            kb_context,
            inspiration,
            chat_id,
        } = entry
        else {
            return Err(PmError::Stale("not a PRD preview".to_string()));
        };

        let status_id = self.status(chat_id, "🔄 Rewriting the PRD…").await?;
        let revised = self
            .claude
            .generate(
                &prompts::prd_changes(&prd_markdown, changes, &kb_context),
                self.claude.default_max_tokens,
            )
            .await?;

        let current = self.confluence.get_page(&page_id).await?;
        self.confluence
            .update_page_wiki(&page_id, &page_title, &markdown_to_wiki(&revised), current.version)
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::prd_preview(
            &issue_key,
            &self.jira.browse_url(&issue_key),
            &summary,
            &web_url,
        );
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Prd {
                issue_key,
                summary,
                page_id,
                page_title,
                web_url,
                prd_markdown: revised,
                kb_context,
                inspiration,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }
}
