//! Ticket Actions (/update)
//!
//! Free-text operations against existing tickets: backlog and sprint moves,
//! archival, a fresh task breakdown for an epic, and an AI-applied field
//! update as the fall-through.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use tracing::info;

use crate::ai::prompts;
use crate::pipeline::{Pipeline, sprint};
use crate::types::{PmError, Result, Stage, TicketUpdate};

static SPRINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:move to sprint|move to|sprint|pm7)\s+(\w+\s*\(S\d+\))").unwrap()
});
static BARE_SLOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\w+\s*\(S\d+\))$").unwrap());

/// What an update instruction asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketAction {
    Backlog,
    Archive,
    TaskBreakdown,
    /// Explicit `Month (SN)` slot, or the ticket's own roadmap value.
    Sprint(Option<String>),
    /// Anything else goes through the AI field updater.
    FreeForm,
}

/// Split `<KEY> <instruction>` where the key belongs to a known project.
pub fn extract_ticket_key<'a>(text: &'a str, projects: &[&str]) -> Option<(String, &'a str)> {
    let pattern = format!(
        r"^\s*((?:{})-\d+)\s*(.*)$",
        projects
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|")
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    let key = caps.get(1)?.as_str().to_uppercase();
    let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some((key, rest))
}

/// Classify the instruction text that follows the ticket key.
pub fn detect_action(instruction: &str) -> TicketAction {
    let lowered = instruction.trim().to_lowercase();

    if matches!(lowered.as_str(), "backlog" | "move to backlog") {
        return TicketAction::Backlog;
    }
    if matches!(lowered.as_str(), "archive" | "aru") {
        return TicketAction::Archive;
    }
    if matches!(
        lowered.as_str(),
        "pm5" | "task breakdown" | "breakdown" | "tasks"
    ) {
        return TicketAction::TaskBreakdown;
    }
    if lowered == "pm7" {
        return TicketAction::Sprint(None);
    }
    if let Some(caps) = SPRINT_RE
        .captures(instruction)
        .or_else(|| BARE_SLOT_RE.captures(instruction.trim()))
    {
        return TicketAction::Sprint(Some(caps[1].to_string()));
    }
    TicketAction::FreeForm
}

impl Pipeline {
    /// Entry point for `/update <KEY> <instruction>`.
    pub async fn handle_update(&self, chat_id: i64, text: &str) -> Result<()> {
        let projects = [
            self.config.jira.delivery_project.as_str(),
            self.config.jira.idea_project.as_str(),
            self.config.jira.archive_project.as_str(),
        ];
        let Some((key, instruction)) = extract_ticket_key(text, &projects) else {
            self.telegram
                .send_message(
                    chat_id,
                    "Usage: /update <TICKET-KEY> <instruction>\nExample: `/update AX-12 move to backlog`",
                    None,
                )
                .await?;
            return Ok(());
        };

        match detect_action(instruction) {
            TicketAction::Backlog => self.action_backlog(chat_id, &key).await,
            TicketAction::Archive => self.action_archive(chat_id, &key).await,
            TicketAction::TaskBreakdown => self.action_breakdown(chat_id, &key).await,
            TicketAction::Sprint(slot) => self.action_sprint(chat_id, &key, slot.as_deref()).await,
            TicketAction::FreeForm => self.action_ai_update(chat_id, &key, instruction).await,
        }
    }

    /// Open (not Done/Released) children of an epic, plus the epic itself.
    async fn epic_scope(&self, key: &str) -> Result<Vec<String>> {
        let issue = self.jira.get_issue(key, Some("issuetype")).await?;
        let is_epic = issue["fields"]["issuetype"]["name"]
            .as_str()
            .is_some_and(|n| n.eq_ignore_ascii_case("epic"));
        let mut keys = vec![key.to_string()];
        if is_epic {
            let jql = format!(
                "\"Epic Link\" = {} AND status not in (Done, Released)",
                key
            );
            for child in self.jira.search(&jql, "summary").await? {
                if let Some(child_key) = child["key"].as_str() {
                    keys.push(child_key.to_string());
                }
            }
        }
        Ok(keys)
    }

    async fn action_backlog(&self, chat_id: i64, key: &str) -> Result<()> {
        let keys = self.epic_scope(key).await?;
        self.jira.move_to_backlog(&keys).await?;
        info!(%key, moved = keys.len(), "moved to backlog");
        self.telegram
            .send_message(
                chat_id,
                &format!("↩️ {} issue(s) moved to the backlog ({}).", keys.len(), key),
                None,
            )
            .await?;
        Ok(())
    }

    /// Archive by moving the issue into the archive project. Issue types
    /// that only exist in the source project map onto Task.
    async fn action_archive(&self, chat_id: i64, key: &str) -> Result<()> {
        let issue = self.jira.get_issue(key, Some("issuetype")).await?;
        let issue_type = issue["fields"]["issuetype"]["name"]
            .as_str()
            .unwrap_or("Task");
        let mapped = match issue_type {
            "Epic" => "Epic",
            _ => "Task",
        };
        self.jira
            .update_fields(
                key,
                json!({
                    "project": { "key": self.config.jira.archive_project },
                    "issuetype": { "name": mapped },
                }),
            )
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "🗄 {} archived into {}.",
                    key, self.config.jira.archive_project
                ),
                None,
            )
            .await?;
        Ok(())
    }

    /// Fresh task breakdown for an existing epic, previewed with the normal
    /// decision buttons.
    async fn action_breakdown(&self, chat_id: i64, key: &str) -> Result<()> {
        let issue = self.jira.get_issue(key, Some("summary,description")).await?;
        let title = issue["fields"]["summary"].as_str().unwrap_or_default();
        let description = crate::convert::adf_to_text(&issue["fields"]["description"]);
        if title.is_empty() {
            return Err(PmError::external("jira", format!("{} has no summary", key)));
        }

        self.process_tasks(
            chat_id, key, key, title, &description, "", "", &description, "",
        )
        .await
    }

    /// Move an epic (with open children) into a sprint, from an explicit
    /// slot or the ticket's roadmap field.
    async fn action_sprint(&self, chat_id: i64, key: &str, slot: Option<&str>) -> Result<()> {
        let slot_text = match slot {
            Some(s) => s.to_string(),
            None => {
                let issue = self
                    .jira
                    .get_issue(key, Some(&self.config.jira.roadmap_field))
                    .await?;
                let field = &issue["fields"][self.config.jira.roadmap_field.as_str()];
                field["value"]
                    .as_str()
                    .or_else(|| field.as_str())
                    .unwrap_or_default()
                    .to_string()
            }
        };

        let Some(parsed) = sprint::parse_roadmap_slot(&slot_text) else {
            self.telegram
                .send_message(
                    chat_id,
                    &format!(
                        "⚠️ \"{}\" is not a `Month (SN)` sprint slot.",
                        slot_text.trim()
                    ),
                    None,
                )
                .await?;
            return Ok(());
        };

        let sprints = self.jira.board_sprints().await?;
        let Some(target) = sprint::pick_sprint(&sprints, parsed, chrono::Utc::now()) else {
            self.telegram
                .send_message(
                    chat_id,
                    &format!("⚠️ No board sprint matches \"{}\".", slot_text.trim()),
                    None,
                )
                .await?;
            return Ok(());
        };

        let keys = self.epic_scope(key).await?;
        self.jira.move_to_sprint(target.id, &keys).await?;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "📅 {} issue(s) moved into *{}* ({}).",
                    keys.len(),
                    target.name,
                    key
                ),
                None,
            )
            .await?;
        Ok(())
    }

    /// Apply a free-text instruction to the ticket via the AI updater.
    async fn action_ai_update(&self, chat_id: i64, key: &str, instruction: &str) -> Result<()> {
        let status_id = self.status(chat_id, "✍️ Applying the update…").await?;

        let issue = self
            .jira
            .get_issue(key, Some("summary,description"))
            .await?;
        let ticket_json = serde_json::to_string(&json!({
            "key": key,
            "summary": issue["fields"]["summary"],
            "description": crate::convert::adf_to_text(&issue["fields"]["description"]),
        }))?;

        let update: TicketUpdate = self
            .claude
            .generate_json(
                &prompts::ticket_update(&ticket_json, instruction),
                self.claude.default_max_tokens,
                Stage::Intake,
            )
            .await?;

        let mut fields = serde_json::Map::new();
        let mut applied: Vec<String> = Vec::new();
        if let Some(summary) = &update.summary {
            fields.insert("summary".to_string(), json!(summary));
            applied.push(format!("summary → \"{}\"", summary));
        }
        if let Some(points) = update.story_points {
            fields.insert(
                self.config.jira.story_points_field.clone(),
                json!(points),
            );
            applied.push(format!("story points → {}", points));
        }
        if let (Some(change), Some(description)) =
            (&update.description_changes, &update.updated_description)
        {
            fields.insert(
                "description".to_string(),
                crate::convert::adf_doc(crate::convert::markdown_to_adf(description)),
            );
            applied.push(format!("description: {}", change));
        }

        self.telegram.delete_message(chat_id, status_id).await;
        if fields.is_empty() {
            self.telegram
                .send_message(
                    chat_id,
                    &format!("No changes derived from that instruction for {}.", key),
                    None,
                )
                .await?;
            return Ok(());
        }

        self.jira.update_fields(key, Value::Object(fields)).await?;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "✏️ [{}]({}) updated:\n• {}",
                    key,
                    self.jira.browse_url(key),
                    applied.join("\n• ")
                ),
                None,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECTS: &[&str] = &["AX", "AR", "ARU"];

    #[test]
    fn test_extract_ticket_key() {
        assert_eq!(
            extract_ticket_key("AX-12 move to backlog", PROJECTS),
            Some(("AX-12".to_string(), "move to backlog"))
        );
        assert_eq!(
            extract_ticket_key("  ARU-3", PROJECTS),
            Some(("ARU-3".to_string(), ""))
        );
        assert!(extract_ticket_key("FOO-12 backlog", PROJECTS).is_none());
        assert!(extract_ticket_key("no key here", PROJECTS).is_none());
    }

    #[test]
    fn test_detect_action_exact_matches() {
        assert_eq!(detect_action("backlog"), TicketAction::Backlog);
        assert_eq!(detect_action("Move To Backlog"), TicketAction::Backlog);
        assert_eq!(detect_action("archive"), TicketAction::Archive);
        assert_eq!(detect_action("aru"), TicketAction::Archive);
        assert_eq!(detect_action("pm5"), TicketAction::TaskBreakdown);
        assert_eq!(detect_action("task breakdown"), TicketAction::TaskBreakdown);
        assert_eq!(detect_action("pm7"), TicketAction::Sprint(None));
    }

    #[test]
    fn test_detect_action_sprint_slots() {
        assert_eq!(
            detect_action("move to sprint October (S2)"),
            TicketAction::Sprint(Some("October (S2)".to_string()))
        );
        assert_eq!(
            detect_action("sprint March(S1)"),
            TicketAction::Sprint(Some("March(S1)".to_string()))
        );
        assert_eq!(
            detect_action("October (S2)"),
            TicketAction::Sprint(Some("October (S2)".to_string()))
        );
    }

    #[test]
    fn test_detect_action_falls_through_to_ai() {
        assert_eq!(
            detect_action("set story points to 3 and tighten the summary"),
            TicketAction::FreeForm
        );
    }
}
