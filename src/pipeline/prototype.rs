//! Stage 3: Prototype
//!
//! Generates a single-file HTML prototype, hosts it in the prototypes repo
//! (served through Pages), and links it from both the ticket and the PRD.
//! Changes overwrite the same file so the published URL never moves.

use tracing::info;

use crate::ai::{prompts, strip_fence_lines};
use crate::clients::{PageBody, schema_or_placeholder};
use crate::constants::claude;
use crate::pipeline::{PendingEntry, Pipeline, previews};
use crate::types::{PmError, Result};

const UX_SECTION_MARK: &str = "Interactive prototype:";

impl Pipeline {
    /// Generate the prototype from the approved PRD and publish it.
    pub async fn process_prototype(
        &self,
        chat_id: i64,
        issue_key: &str,
        summary: &str,
        prd_page_id: &str,
        prd_web_url: &str,
    ) -> Result<()> {
        let status_id = self.status(chat_id, "🎨 Preparing prototype context…").await?;

        let prd_content = self.confluence.get_page_text(prd_page_id).await?;
        let design_system = self.confluence.design_system_text().await;
        let keywords = schema_keywords(summary);
        let db_schema = schema_or_placeholder(self.db.as_deref(), &keywords).await;

        self.edit_status(
            chat_id,
            status_id,
            "🎨 Generating the prototype, this can take a few minutes…",
        )
        .await?;
        let raw = self
            .claude
            .generate(
                &prompts::prototype(summary, &prd_content, &design_system, &db_schema),
                claude::PROTOTYPE_MAX_TOKENS,
            )
            .await?;
        let html = strip_fence_lines(&raw);

        self.edit_status(chat_id, status_id, "🎨 Publishing to GitHub Pages…")
            .await?;
        let prototype_url = self.github.push_prototype(issue_key, &html).await?;
        info!(%issue_key, %prototype_url, "prototype published");

        self.jira
            .add_comment(
                issue_key,
                &format!("**Prototype published**: [{0}]({0})", prototype_url),
            )
            .await?;
        self.append_ux_section(prd_page_id, &prototype_url).await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::prototype_preview(issue_key, &prototype_url, summary);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Prototype {
                issue_key: issue_key.to_string(),
                summary: summary.to_string(),
                prototype_url,
                html,
                prd_content,
                prd_page_id: prd_page_id.to_string(),
                prd_web_url: prd_web_url.to_string(),
                design_system,
                db_schema,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }

    /// Append the UX section with the prototype link to the PRD page,
    /// unless an earlier run already placed it.
    async fn append_ux_section(&self, prd_page_id: &str, prototype_url: &str) -> Result<()> {
        let page = self.confluence.get_page(prd_page_id).await?;
        if page.storage.contains(UX_SECTION_MARK) {
            return Ok(());
        }
        let appended = format!(
            "{}<h2>UX/UI Design</h2><p><strong>{}</strong> <a href=\"{url}\">{url}</a></p>",
            page.storage,
            UX_SECTION_MARK,
            url = prototype_url,
        );
        self.confluence
            .update_page(
                prd_page_id,
                &PageBody {
                    title: page.title,
                    storage: appended,
                    version: page.version,
                },
            )
            .await
    }

    /// Approve: comment and chain into the epic stage.
    pub async fn approve_prototype(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Prototype {
            issue_key,
            summary,
            prototype_url,
            prd_content,
            prd_page_id,
            prd_web_url,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not a prototype preview".to_string()));
        };

        self.jira
            .add_comment(
                &issue_key,
                &format!("**Prototype approved**: [{0}]({0})", prototype_url),
            )
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!("✅ [{}]({}) — Prototype approved.", issue_key, prototype_url),
                None,
            )
            .await?;

        self.process_epic(
            chat_id,
            &issue_key,
            &summary,
            &prd_page_id,
            &prd_web_url,
            &prd_content,
            &prototype_url,
        )
        .await
    }

    /// Reject: log only. The pushed file stays and the next run overwrites
    /// the same filename.
    pub async fn reject_prototype(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Prototype {
            issue_key, chat_id, ..
        } = entry
        else {
            return Err(PmError::Stale("not a prototype preview".to_string()));
        };

        self.jira
            .add_comment(&issue_key, "**Prototype rejected**.")
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!("⛔ {} — Prototype rejected.", issue_key),
                None,
            )
            .await?;
        Ok(())
    }

    /// Changes: revise the current HTML with the change request layered onto
    /// the original context and overwrite the hosted file in place.
    pub async fn apply_prototype_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        let PendingEntry::Prototype {
            issue_key,
            summary,
            html,
            prd_content,
            prd_page_id,
            prd_web_url,
            design_system,
            db_schema,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not a prototype preview".to_string()));
        };

        let status_id = self
            .status(chat_id, "🔄 Revising the prototype, this can take a few minutes…")
            .await?;
        let raw = self
            .claude
            .generate(
                &prompts::prototype_changes(
                    &summary,
                    &prd_content,
                    &design_system,
                    &db_schema,
                    &html,
                    changes,
                ),
                claude::PROTOTYPE_MAX_TOKENS,
            )
            .await?;
        let html = strip_fence_lines(&raw);
        let prototype_url = self.github.push_prototype(&issue_key, &html).await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::prototype_preview(&issue_key, &prototype_url, &summary);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Prototype {
                issue_key,
                summary,
                prototype_url,
                html,
                prd_content,
                prd_page_id,
                prd_web_url,
                design_system,
                db_schema,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }
}

/// Keyword candidates for schema lookup, pulled from the feature summary.
fn schema_keywords(summary: &str) -> Vec<String> {
    summary
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keywords_drops_short_words() {
        let kw = schema_keywords("Add a quote-builder for SME plans");
        assert!(kw.contains(&"quote".to_string()));
        assert!(kw.contains(&"builder".to_string()));
        assert!(kw.contains(&"plans".to_string()));
        assert!(!kw.contains(&"for".to_string()));
        assert!(!kw.contains(&"sme".to_string()));
    }
}
