//! Stage 4: Epic
//!
//! Distills the PRD into epic content, previews it, and only creates the
//! delivery epic on approval. The epic description is a structured ADF
//! template linking every upstream artifact.

use rand::seq::IndexedRandom;
use serde_json::{Value, json};
use tracing::info;

use crate::ai::prompts;
use crate::convert::{adf_doc, parse_inline};
use crate::pipeline::{PendingEntry, Pipeline, previews};
use crate::types::{EpicContent, PmError, Result, Stage};

const EPIC_COLORS: &[&str] = &[
    "purple",
    "blue",
    "green",
    "teal",
    "yellow",
    "orange",
    "grey",
    "dark_purple",
    "dark_blue",
    "dark_green",
    "dark_teal",
    "dark_yellow",
    "dark_orange",
    "dark_grey",
];

impl Pipeline {
    /// Draft epic title and summary from the PRD and preview them.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_epic(
        &self,
        chat_id: i64,
        issue_key: &str,
        summary: &str,
        prd_page_id: &str,
        prd_web_url: &str,
        prd_content: &str,
        prototype_url: &str,
    ) -> Result<()> {
        let status_id = self.status(chat_id, "📦 Drafting the epic…").await?;

        let epic: EpicContent = self
            .claude
            .generate_json(
                &prompts::epic(summary, prd_content),
                self.claude.default_max_tokens,
                Stage::Epic,
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::epic_preview(
            issue_key,
            &self.jira.browse_url(issue_key),
            &epic.epic_title,
            &epic.epic_summary,
        );
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Epic {
                issue_key: issue_key.to_string(),
                summary: summary.to_string(),
                epic_title: epic.epic_title,
                epic_summary: epic.epic_summary,
                prd_page_id: prd_page_id.to_string(),
                prd_web_url: prd_web_url.to_string(),
                prd_content: prd_content.to_string(),
                prototype_url: prototype_url.to_string(),
                chat_id,
            },
        )
        .await?;
        Ok(())
    }

    /// Approve: create the epic in the delivery project, cross-link it with
    /// the source idea, then chain into the task breakdown.
    pub async fn approve_epic(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Epic {
            issue_key,
            epic_title,
            epic_summary,
            prd_page_id,
            prd_web_url,
            prd_content,
            prototype_url,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not an epic preview".to_string()));
        };

        let status_id = self.status(chat_id, "📦 Creating the epic…").await?;

        let description = epic_description(
            &epic_summary,
            &prd_web_url,
            &prototype_url,
            &self.jira.browse_url(&issue_key),
            &issue_key,
        );
        let mut extra = serde_json::Map::new();
        let color = EPIC_COLORS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or("blue");
        extra.insert(self.config.jira.epic_color_field.clone(), json!(color));
        let epic_key = self
            .jira
            .create_issue(
                &self.config.jira.delivery_project,
                "Epic",
                &epic_title,
                description,
                Value::Object(extra),
            )
            .await?;
        info!(%epic_key, %issue_key, "epic created");

        self.jira
            .add_comment(
                &issue_key,
                &format!(
                    "**Epic created**: [{}]({})",
                    epic_key,
                    self.jira.browse_url(&epic_key)
                ),
            )
            .await?;
        self.jira
            .add_comment(
                &epic_key,
                &format!(
                    "Source idea: [{}]({})",
                    issue_key,
                    self.jira.browse_url(&issue_key)
                ),
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "✅ Epic [{}]({}) created.",
                    epic_key,
                    self.jira.browse_url(&epic_key)
                ),
                None,
            )
            .await?;

        self.process_tasks(
            chat_id,
            &issue_key,
            &epic_key,
            &epic_title,
            &epic_summary,
            &prd_page_id,
            &prd_web_url,
            &prd_content,
            &prototype_url,
        )
        .await
    }

    /// Reject: nothing was created, just record the decision.
    pub async fn reject_epic(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Epic {
            issue_key, chat_id, ..
        } = entry
        else {
            return Err(PmError::Stale("not an epic preview".to_string()));
        };

        self.jira
            .add_comment(&issue_key, "**Epic rejected** before creation.")
            .await?;
        self.telegram
            .send_message(chat_id, &format!("⛔ {} — Epic rejected.", issue_key), None)
            .await?;
        Ok(())
    }

    /// Changes: regenerate title and summary, re-preview.
    pub async fn apply_epic_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        let PendingEntry::Epic {
            issue_key,
            summary,
            epic_title,
            epic_summary,
            prd_page_id,
            prd_web_url,
            prd_content,
            prototype_url,
            chat_id,
        } = entry
        else {
            return Err(PmError::Stale("not an epic preview".to_string()));
        };

        let status_id = self.status(chat_id, "🔄 Reworking the epic…").await?;
        let revised: EpicContent = self
            .claude
            .generate_json(
                &prompts::epic_changes(&epic_title, &epic_summary, &prd_content, changes),
                self.claude.default_max_tokens,
                Stage::Epic,
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::epic_preview(
            &issue_key,
            &self.jira.browse_url(&issue_key),
            &revised.epic_title,
            &revised.epic_summary,
        );
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Epic {
                issue_key,
                summary,
                epic_title: revised.epic_title,
                epic_summary: revised.epic_summary,
                prd_page_id,
                prd_web_url,
                prd_content,
                prototype_url,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }
}

/// The epic description template: a PM section listing the summary and the
/// links to every artifact the epic came from.
fn epic_description(
    epic_summary: &str,
    prd_web_url: &str,
    prototype_url: &str,
    idea_url: &str,
    idea_key: &str,
) -> Value {
    let item = |content: Vec<Value>| {
        json!({
            "type": "listItem",
            "content": [{ "type": "paragraph", "content": content }],
        })
    };
    adf_doc(vec![
        json!({
            "type": "paragraph",
            "content": parse_inline("**Product Manager:**"),
        }),
        json!({
            "type": "orderedList",
            "attrs": { "order": 1 },
            "content": [
                item(parse_inline(&format!("Summary: {}", epic_summary))),
                item(parse_inline("Validated: Yes")),
                item(parse_inline(&format!("PRD: [{0}]({0})", prd_web_url))),
                item(parse_inline(&format!("Prototype: [{0}]({0})", prototype_url))),
                item(parse_inline(&format!("Source idea: [{}]({})", idea_key, idea_url))),
            ],
        }),
        json!({ "type": "rule" }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epic_description_structure() {
        let doc = epic_description(
            "Build the quote flow",
            "https://w/prd",
            "https://p/ar-1.html",
            "https://j/browse/AR-1",
            "AR-1",
        );
        let content = doc["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "paragraph");
        assert_eq!(content[1]["type"], "orderedList");
        assert_eq!(content[1]["content"].as_array().unwrap().len(), 5);
        assert_eq!(content[2]["type"], "rule");

        let text = crate::convert::adf_to_text(&doc);
        assert!(text.contains("Summary: Build the quote flow"));
        assert!(text.contains("Validated: Yes"));
        assert!(text.contains("AR-1"));
    }

    #[test]
    fn test_epic_colors_palette_size() {
        assert_eq!(EPIC_COLORS.len(), 14);
    }
}
