//! Park Projection and Resume Reconstruction
//!
//! Each stage projects a `PendingEntry` down to the minimal fields that
//! cannot be re-fetched live, and reconstruction inverts that: everything
//! derivable comes back through the `ArtifactFetcher`, everything else out
//! of the parked record's data payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::clients::{ConfluenceClient, GithubClient, JiraClient};
use crate::pipeline::park::ParkedRecord;
use crate::pipeline::pending::PendingEntry;
use crate::types::{PmError, Result, ReviewedTask, Stage, TaskItem};

/// Live artifact access needed to rebuild a parked item.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Issue summary and description text.
    async fn issue_overview(&self, issue_key: &str) -> Result<(String, String)>;
    /// PRD page flattened to text.
    async fn prd_text(&self, page_id: &str) -> Result<String>;
    /// Prototype HTML, if the file still exists.
    async fn prototype_html(&self, issue_key: &str) -> Result<Option<String>>;
    /// Design-system context, with its fallback already applied.
    async fn design_system(&self) -> String;
}

/// Fetcher over the real clients.
pub struct LiveArtifacts {
    pub jira: Arc<JiraClient>,
    pub confluence: Arc<ConfluenceClient>,
    pub github: Arc<GithubClient>,
}

#[async_trait]
impl ArtifactFetcher for LiveArtifacts {
    async fn issue_overview(&self, issue_key: &str) -> Result<(String, String)> {
        let issue = self.jira.get_issue(issue_key, Some("summary,description")).await?;
        let summary = issue["fields"]["summary"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let description = crate::convert::adf_to_text(&issue["fields"]["description"]);
        Ok((summary, description))
    }

    async fn prd_text(&self, page_id: &str) -> Result<String> {
        self.confluence.get_page_text(page_id).await
    }

    async fn prototype_html(&self, issue_key: &str) -> Result<Option<String>> {
        self.github.fetch_prototype_html(issue_key).await
    }

    async fn design_system(&self) -> String {
        self.confluence.design_system_text().await
    }
}

// =============================================================================
// Per-stage data payloads
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct PrdData {
    page_id: String,
    page_title: String,
    web_url: String,
    #[serde(default)]
    inspiration: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PrototypeData {
    prototype_url: String,
    prd_page_id: String,
    prd_web_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EpicData {
    epic_title: String,
    epic_summary: String,
    prd_page_id: String,
    prd_web_url: String,
    prototype_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TasksData {
    epic_key: String,
    epic_title: String,
    tasks: Vec<TaskItem>,
    prd_page_id: String,
    prd_web_url: String,
    prototype_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EngineerData {
    epic_key: String,
    epic_title: String,
    tasks: Vec<ReviewedTask>,
    prd_page_id: String,
    prd_web_url: String,
    prototype_url: String,
    #[serde(default)]
    context_summary: String,
}

// =============================================================================
// Projection
// =============================================================================

/// Project a pending entry into a durable parked record.
pub fn project(entry: &PendingEntry) -> Result<ParkedRecord> {
    let (summary, data) = match entry {
        PendingEntry::Intake { structured, .. } => {
            (structured.summary.clone(), serde_json::json!({}))
        }
        PendingEntry::Prd {
            summary,
            page_id,
            page_title,
            web_url,
            inspiration,
            ..
        } => (
            summary.clone(),
            serde_json::to_value(PrdData {
                page_id: page_id.clone(),
                page_title: page_title.clone(),
                web_url: web_url.clone(),
                inspiration: inspiration.clone(),
            })?,
        ),
        PendingEntry::Prototype {
            summary,
            prototype_url,
            prd_page_id,
            prd_web_url,
            ..
        } => (
            summary.clone(),
            serde_json::to_value(PrototypeData {
                prototype_url: prototype_url.clone(),
                prd_page_id: prd_page_id.clone(),
                prd_web_url: prd_web_url.clone(),
            })?,
        ),
        PendingEntry::Epic {
            summary,
            epic_title,
            epic_summary,
            prd_page_id,
            prd_web_url,
            prototype_url,
            ..
        } => (
            summary.clone(),
            serde_json::to_value(EpicData {
                epic_title: epic_title.clone(),
                epic_summary: epic_summary.clone(),
                prd_page_id: prd_page_id.clone(),
                prd_web_url: prd_web_url.clone(),
                prototype_url: prototype_url.clone(),
            })?,
        ),
        PendingEntry::Tasks {
            epic_key,
            epic_title,
            tasks,
            prd_page_id,
            prd_web_url,
            prototype_url,
            ..
        } => (
            epic_title.clone(),
            serde_json::to_value(TasksData {
                epic_key: epic_key.clone(),
                epic_title: epic_title.clone(),
                tasks: tasks.clone(),
                prd_page_id: prd_page_id.clone(),
                prd_web_url: prd_web_url.clone(),
                prototype_url: prototype_url.clone(),
            })?,
        ),
        PendingEntry::Engineer {
            epic_key,
            epic_title,
            tasks,
            prd_page_id,
            prd_web_url,
            prototype_url,
            context_summary,
            ..
        } => (
            epic_title.clone(),
            serde_json::to_value(EngineerData {
                epic_key: epic_key.clone(),
                epic_title: epic_title.clone(),
                tasks: tasks.clone(),
                prd_page_id: prd_page_id.clone(),
                prd_web_url: prd_web_url.clone(),
                prototype_url: prototype_url.clone(),
                context_summary: context_summary.clone(),
            })?,
        ),
    };

    Ok(ParkedRecord {
        issue_key: entry.issue_key().to_string(),
        summary,
        stage: entry.stage().tag().to_string(),
        data,
    })
}

// =============================================================================
// Reconstruction
// =============================================================================

/// Rebuild a full pending entry from a parked record. `None` means the
/// stage tag is unknown to this build; the caller reports it verbatim.
pub async fn reconstruct(
    record: &ParkedRecord,
    chat_id: i64,
    fetcher: &dyn ArtifactFetcher,
) -> Result<Option<PendingEntry>> {
    let Some(stage) = Stage::from_tag(&record.stage) else {
        warn!(stage = %record.stage, key = %record.issue_key, "unknown parked stage tag");
        return Ok(None);
    };

    let key = record.issue_key.clone();
    let entry = match stage {
        Stage::Intake => {
            let (summary, description) = fetcher.issue_overview(&key).await?;
            let structured = crate::types::EnrichedIdea {
                summary,
                description: description.clone(),
                ..Default::default()
            };
            PendingEntry::Intake {
                issue_key: key,
                structured,
                raw_idea: description,
                kb_context: String::new(),
                chat_id,
            }
        }
        Stage::Prd => {
            let data: PrdData = parse_data(record)?;
            let prd_markdown = fetcher.prd_text(&data.page_id).await?;
            PendingEntry::Prd {
                issue_key: key,
                summary: record.summary.clone(),
                page_id: data.page_id,
                page_title: data.page_title,
                web_url: data.web_url,
                prd_markdown,
                kb_context: String::new(),
                inspiration: data.inspiration,
                chat_id,
            }
        }
        Stage::Prototype => {
            let data: PrototypeData = parse_data(record)?;
            let prd_content = fetcher.prd_text(&data.prd_page_id).await?;
            let html = fetcher.prototype_html(&key).await?.unwrap_or_else(|| {
                warn!(%key, "prototype file missing at resume");
                String::new()
            });
            let design_system = fetcher.design_system().await;
            PendingEntry::Prototype {
                issue_key: key,
                summary: record.summary.clone(),
                prototype_url: data.prototype_url,
                html,
                prd_content,
                prd_page_id: data.prd_page_id,
                prd_web_url: data.prd_web_url,
                design_system,
                db_schema: String::new(),
                chat_id,
            }
        }
        Stage::Epic => {
            let data: EpicData = parse_data(record)?;
            let prd_content = fetcher.prd_text(&data.prd_page_id).await?;
            PendingEntry::Epic {
                issue_key: key,
                summary: record.summary.clone(),
                epic_title: data.epic_title,
                epic_summary: data.epic_summary,
                prd_page_id: data.prd_page_id,
                prd_web_url: data.prd_web_url,
                prd_content,
                prototype_url: data.prototype_url,
                chat_id,
            }
        }
        Stage::Tasks => {
            let data: TasksData = parse_data(record)?;
            let prd_content = fetcher.prd_text(&data.prd_page_id).await?;
            PendingEntry::Tasks {
                issue_key: key,
                epic_key: data.epic_key,
                epic_title: data.epic_title,
                tasks: data.tasks,
                prd_page_id: data.prd_page_id,
                prd_web_url: data.prd_web_url,
                prd_content,
                prototype_url: data.prototype_url,
                chat_id,
            }
        }
        Stage::Engineer => {
            let data: EngineerData = parse_data(record)?;
            let prd_content = fetcher.prd_text(&data.prd_page_id).await?;
            PendingEntry::Engineer {
                issue_key: key,
                epic_key: data.epic_key,
                epic_title: data.epic_title,
                tasks: data.tasks,
                prd_page_id: data.prd_page_id,
                prd_web_url: data.prd_web_url,
                prd_content,
                prototype_url: data.prototype_url,
                context_summary: data.context_summary,
                chat_id,
            }
        }
        // A sprint move never parks: it either completes or fails
        Stage::Sprint => return Ok(None),
    };

    Ok(Some(entry))
}

/// Chat warning for a marker whose stage tag this build cannot rebuild.
/// The marker is already gone at this point, so the notice echoes the tag
/// and the compact data payload verbatim; nothing is lost silently.
pub fn unknown_stage_notice(record: &ParkedRecord) -> String {
    format!(
        "⚠️ {key} was parked at unrecognized stage `{stage}` and cannot be resumed by this build.\nParked payload (the marker comment was removed):\n`{stage}:{data}`\nRe-run the stage manually.",
        key = record.issue_key,
        stage = record.stage,
        data = record.data,
    )
}

fn parse_data<T: serde::de::DeserializeOwned>(record: &ParkedRecord) -> Result<T> {
    serde_json::from_value(record.data.clone()).map_err(|e| {
        PmError::Stale(format!(
            "parked data for {} is unreadable: {}",
            record.issue_key, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeFetcher;

    #[async_trait]
    impl ArtifactFetcher for FakeFetcher {
        async fn issue_overview(&self, _key: &str) -> Result<(String, String)> {
            Ok(("Faster quotes".to_string(), "Problem text".to_string()))
        }

        async fn prd_text(&self, page_id: &str) -> Result<String> {
            Ok(format!("PRD body for page {}", page_id))
        }

        async fn prototype_html(&self, _key: &str) -> Result<Option<String>> {
            Ok(Some("<!DOCTYPE html><html></html>".to_string()))
        }

        async fn design_system(&self) -> String {
            "orange primary".to_string()
        }
    }

    #[tokio::test]
    async fn test_prd_round_trip_refetches_body() {
        let original = PendingEntry::Prd {
            issue_key: "AR-4".into(),
            summary: "Faster quotes".into(),
            page_id: "777".into(),
            page_title: "PRD - Faster quotes".into(),
            web_url: "https://w/777".into(),
            prd_markdown: "old cached body".into(),
            kb_context: "kb".into(),
            inspiration: "like stripe".into(),
            chat_id: 1,
        };
        let record = project(&original).unwrap();
        assert_eq!(record.stage, "pm2");
        assert_eq!(record.data["page_id"], "777");

        let rebuilt = reconstruct(&record, 2, &FakeFetcher).await.unwrap().unwrap();
        let PendingEntry::Prd {
            page_id,
            prd_markdown,
            inspiration,
            chat_id,
            ..
        } = rebuilt
        else {
            panic!("wrong variant");
        };
        assert_eq!(page_id, "777");
        assert_eq!(prd_markdown, "PRD body for page 777");
        assert_eq!(inspiration, "like stripe");
        assert_eq!(chat_id, 2);
    }

    #[tokio::test]
    async fn test_tasks_round_trip_keeps_breakdown() {
        let tasks: Vec<TaskItem> =
            serde_json::from_str(r#"[{"summary":"a","story_points":0.5},{"summary":"b"}]"#)
                .unwrap();
        let original = PendingEntry::Tasks {
            issue_key: "AR-4".into(),
            epic_key: "AX-9".into(),
            epic_title: "Quotes epic".into(),
            tasks,
            prd_page_id: "777".into(),
            prd_web_url: "https://w/777".into(),
            prd_content: "cached".into(),
            prototype_url: "https://p/ar-4.html".into(),
            chat_id: 1,
        };
        let record = project(&original).unwrap();
        let rebuilt = reconstruct(&record, 1, &FakeFetcher).await.unwrap().unwrap();
        let PendingEntry::Tasks { tasks, epic_key, .. } = rebuilt else {
            panic!("wrong variant");
        };
        assert_eq!(epic_key, "AX-9");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].story_points, 0.5);
    }

    #[tokio::test]
    async fn test_unknown_stage_tag_degrades() {
        let record = ParkedRecord {
            issue_key: "AR-4".into(),
            summary: "S".into(),
            stage: "pm99".into(),
            data: json!({}),
        };
        assert!(reconstruct(&record, 1, &FakeFetcher).await.unwrap().is_none());
    }

    #[test]
    fn test_unknown_stage_notice_carries_payload() {
        let record = ParkedRecord {
            issue_key: "AR-9".into(),
            summary: "S".into(),
            stage: "pm99".into(),
            data: json!({"page_id": "777", "web_url": "https://w/777"}),
        };
        let notice = unknown_stage_notice(&record);
        assert!(notice.contains("AR-9"));
        assert!(notice.contains("pm99"));
        assert!(notice.contains("\"page_id\":\"777\""));
        assert!(notice.contains("https://w/777"));
    }

    #[tokio::test]
    async fn test_intake_reconstructs_from_issue() {
        let record = ParkedRecord {
            issue_key: "AR-4".into(),
            summary: "ignored".into(),
            stage: "pm1".into(),
            data: json!({}),
        };
        let rebuilt = reconstruct(&record, 3, &FakeFetcher).await.unwrap().unwrap();
        let PendingEntry::Intake {
            structured,
            raw_idea,
            ..
        } = rebuilt
        else {
            panic!("wrong variant");
        };
        assert_eq!(structured.summary, "Faster quotes");
        assert_eq!(raw_idea, "Problem text");
    }
}
