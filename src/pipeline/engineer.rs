//! Stage 6: Engineering Review
//!
//! Two generation passes: first decide what context is needed (tables,
//! files, third-party docs), then write a grounded technical plan per task.
//! Approval writes each plan into the task's Engineer section and confirms
//! the story-point estimate.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::ai::prompts;
use crate::clients::schema_or_placeholder;
use crate::constants::{claude, investigation};
use crate::convert::parse_inline;
use crate::pipeline::{PendingEntry, Pipeline, previews};
use crate::types::{
    CreatedTask, InvestigationPlan, PmError, Result, ReviewedTask, Stage, TaskItem, TechnicalPlan,
};

#[derive(Deserialize)]
struct PlanSet {
    #[serde(default)]
    plans: Vec<TechnicalPlan>,
}

impl Pipeline {
    /// Investigate, plan, and preview the engineering review.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_engineer(
        &self,
        chat_id: i64,
        issue_key: &str,
        epic_key: &str,
        epic_title: &str,
        tasks: &[TaskItem],
        created: &[CreatedTask],
        prd_page_id: &str,
        prd_web_url: &str,
        prd_content: &str,
        prototype_url: &str,
    ) -> Result<()> {
        let status_id = self
            .status(chat_id, "🔧 Planning the investigation…")
            .await?;

        let tasks_text = numbered_tasks(created, tasks);
        let repo = &self.config.github.codebase_repo;
        let structure = self.github.repo_structure(repo).await.unwrap_or_else(|e| {
            warn!(error = %e, "repo structure unavailable");
            String::new()
        });
        let plan: InvestigationPlan = self
            .claude
            .generate_json(
                &prompts::investigation_plan(&tasks_text, &structure),
                self.claude.default_max_tokens,
                Stage::Engineer,
            )
            .await?;

        self.edit_status(chat_id, status_id, "🔧 Gathering context…")
            .await?;
        let (context, context_summary) = self.gather_context(&plan).await;

        self.edit_status(chat_id, status_id, "🔧 Writing technical plans…")
            .await?;
        let set: PlanSet = self
            .claude
            .generate_json(
                &prompts::technical_plans(&tasks_text, &context),
                claude::BREAKDOWN_MAX_TOKENS,
                Stage::Engineer,
            )
            .await?;
        let reviewed = merge_plans(created, &set.plans);
        info!(%epic_key, planned = reviewed.len(), "technical plans generated");

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::engineer_preview(epic_title, &reviewed);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Engineer {
                issue_key: issue_key.to_string(),
                epic_key: epic_key.to_string(),
                epic_title: epic_title.to_string(),
                tasks: reviewed,
                prd_page_id: prd_page_id.to_string(),
                prd_web_url: prd_web_url.to_string(),
                prd_content: prd_content.to_string(),
                prototype_url: prototype_url.to_string(),
                context_summary,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }

    /// Pull together the context the investigation asked for. Failures
    /// degrade to less context, never to a failed stage.
    async fn gather_context(&self, plan: &InvestigationPlan) -> (String, String) {
        let mut sections = Vec::new();

        let db_schema = schema_or_placeholder(self.db.as_deref(), &plan.db_keywords).await;
        sections.push(format!("## Database tables\n{}", db_schema));

        let repo = &self.config.github.codebase_repo;
        let mut files_read = 0usize;
        for path in plan.code_files.iter().take(investigation::MAX_CODE_FILES) {
            match self.github.get_file(repo, path).await {
                Ok(Some(file)) => {
                    let body: String = file
                        .content
                        .chars()
                        .take(investigation::MAX_FILE_CHARS)
                        .collect();
                    sections.push(format!("## File: {}\n{}", path, body));
                    files_read += 1;
                }
                Ok(None) => warn!(%path, "investigation file not found"),
                Err(e) => warn!(%path, error = %e, "investigation file unreadable"),
            }
        }

        let docs = crate::clients::WebClient::identify_integrations(&plan.api_integrations);
        let mut docs_read = 0usize;
        for (service, url) in &docs {
            match self.web.fetch_text(url).await {
                Ok(text) => {
                    let body: String = text.chars().take(investigation::MAX_FILE_CHARS).collect();
                    sections.push(format!("## API docs: {}\n{}", service, body));
                    docs_read += 1;
                }
                Err(e) => warn!(%service, error = %e, "API docs unavailable"),
            }
        }

        let summary = format!(
            "{} keyword(s), {} file(s), {} doc(s)",
            plan.db_keywords.len(),
            files_read,
            docs_read
        );
        (sections.join("\n\n"), summary)
    }

    /// Approve: write each plan into the task's Engineer section, set the
    /// confirmed estimate, then chain into sprint scheduling.
    pub async fn approve_engineer(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Engineer {
            issue_key,
            epic_key,
            tasks,
            chat_id,
            ..
        } = entry
        else {
            return Err(PmError::Stale("not an engineering preview".to_string()));
        };

        let status_id = self
            .status(chat_id, &format!("🔧 Updating task 1/{}…", tasks.len()))
            .await?;
        for (i, task) in tasks.iter().enumerate() {
            self.edit_status(
                chat_id,
                status_id,
                &format!("🔧 Updating task {}/{}…", i + 1, tasks.len()),
            )
            .await?;
            self.write_engineer_section(task).await?;
        }

        self.jira
            .add_comment(
                &epic_key,
                &format!("**Technical plans added** to {} tasks.", tasks.len()),
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "✅ Engineer sections written for {} tasks under [{}]({}).",
                    tasks.len(),
                    epic_key,
                    self.jira.browse_url(&epic_key)
                ),
                None,
            )
            .await?;

        self.process_sprint(chat_id, &issue_key, &epic_key, tasks).await
    }

    /// Replace the Engineer checklist (the second ordered list in the task
    /// description) with the generated plan, and set the story points field.
    async fn write_engineer_section(&self, task: &ReviewedTask) -> Result<()> {
        let issue = self.jira.get_issue(&task.key, Some("description")).await?;
        let mut description = issue["fields"]["description"].clone();

        let filled = engineer_list(task);
        if !replace_second_ordered_list(&mut description, filled) {
            warn!(key = %task.key, "task description missing Engineer list, appending");
            if let Some(content) = description["content"].as_array_mut() {
                content.push(engineer_list(task));
            }
        }

        let mut fields = serde_json::Map::new();
        fields.insert("description".to_string(), description);
        fields.insert(
            self.config.jira.story_points_field.clone(),
            json!(task.effective_story_points()),
        );
        self.jira
            .update_fields(&task.key, Value::Object(fields))
            .await
    }

    /// Reject: plans are discarded, tasks keep their template sections.
    pub async fn reject_engineer(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Engineer {
            epic_key, chat_id, ..
        } = entry
        else {
            return Err(PmError::Stale("not an engineering preview".to_string()));
        };

        self.jira
            .add_comment(&epic_key, "**Technical plans rejected**.")
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!("⛔ Technical plans for {} rejected.", epic_key),
                None,
            )
            .await?;
        Ok(())
    }

    /// Changes: revise the plans from the current set plus instructions.
    pub async fn apply_engineer_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        let PendingEntry::Engineer {
            issue_key,
            epic_key,
            epic_title,
            tasks,
            prd_page_id,
            prd_web_url,
            prd_content,
            prototype_url,
            context_summary,
            chat_id,
        } = entry
        else {
            return Err(PmError::Stale("not an engineering preview".to_string()));
        };

        let status_id = self.status(chat_id, "🔄 Revising the plans…").await?;
        let current_plans: Vec<TechnicalPlan> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| TechnicalPlan {
                index: i + 1,
                technical_plan: t.technical_plan.clone(),
                story_points: t.effective_story_points(),
            })
            .collect();
        let current_json = serde_json::to_string(&json!({ "plans": current_plans }))?;
        let set: PlanSet = self
            .claude
            .generate_json(
                &prompts::plan_changes(&current_json, changes),
                claude::BREAKDOWN_MAX_TOKENS,
                Stage::Engineer,
            )
            .await?;

        let created: Vec<CreatedTask> = tasks
            .iter()
            .map(|t| CreatedTask {
                key: t.key.clone(),
                summary: t.summary.clone(),
                story_points: t.story_points,
            })
            .collect();
        let reviewed = merge_plans(&created, &set.plans);

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::engineer_preview(&epic_title, &reviewed);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Engineer {
                issue_key,
                epic_key,
                epic_title,
                tasks: reviewed,
                prd_page_id,
                prd_web_url,
                prd_content,
                prototype_url,
                context_summary,
                chat_id,
            },
        )
        .await?;
        Ok(())
    }
}

/// Numbered task list fed to both generation passes.
fn numbered_tasks(created: &[CreatedTask], tasks: &[TaskItem]) -> String {
    created
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let detail = tasks
                .get(i)
                .map(|t| {
                    format!(
                        " — {} | {} | AC: {}",
                        t.task_summary,
                        t.user_story,
                        t.acceptance_criteria.join("; ")
                    )
                })
                .unwrap_or_default();
            format!("{}. {} ({}){}", i + 1, c.summary, c.key, detail)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merge generated plans onto created tasks by 1-based index. A task
/// without a plan gets the TBD placeholder and keeps its estimate.
fn merge_plans(created: &[CreatedTask], plans: &[TechnicalPlan]) -> Vec<ReviewedTask> {
    created
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let plan = plans.iter().find(|p| p.index == i + 1);
            ReviewedTask {
                key: task.key.clone(),
                summary: task.summary.clone(),
                story_points: task.story_points,
                technical_plan: plan
                    .map(|p| p.technical_plan.clone())
                    .filter(|steps| !steps.is_empty())
                    .unwrap_or_else(|| vec!["TBD".to_string()]),
                confirmed_story_points: plan.map(|p| p.story_points),
            }
        })
        .collect()
}

/// The filled Engineer ordered list for a task description.
fn engineer_list(task: &ReviewedTask) -> Value {
    let item = |content: Vec<Value>| {
        json!({
            "type": "listItem",
            "content": [{ "type": "paragraph", "content": content }],
        })
    };
    let plan_item = json!({
        "type": "listItem",
        "content": [
            { "type": "paragraph", "content": parse_inline("Technical plan:") },
            {
                "type": "bulletList",
                "content": task
                    .technical_plan
                    .iter()
                    .map(|step| item(parse_inline(step)))
                    .collect::<Vec<_>>(),
            },
        ],
    });
    json!({
        "type": "orderedList",
        "attrs": { "order": 1 },
        "content": [
            plan_item,
            item(parse_inline(&format!(
                "Story points estimated: {}",
                previews::format_points(task.effective_story_points())
            ))),
            item(parse_inline("Task broken down into sub-tasks where needed: Yes")),
        ],
    })
}

/// Swap out the second ordered list in an ADF document. Returns false when
/// the document does not carry two.
fn replace_second_ordered_list(description: &mut Value, replacement: Value) -> bool {
    let Some(content) = description["content"].as_array_mut() else {
        return false;
    };
    let mut seen = 0;
    for node in content.iter_mut() {
        if node["type"] == "orderedList" {
            seen += 1;
            if seen == 2 {
                *node = replacement;
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> Vec<CreatedTask> {
        vec![
            CreatedTask {
                key: "AX-11".into(),
                summary: "Add endpoint".into(),
                story_points: 1.0,
            },
            CreatedTask {
                key: "AX-12".into(),
                summary: "Add UI".into(),
                story_points: 2.0,
            },
        ]
    }

    #[test]
    fn test_merge_plans_by_index() {
        let plans = vec![TechnicalPlan {
            index: 2,
            technical_plan: vec!["reuse QuoteForm".into()],
            story_points: 3.0,
        }];
        let merged = merge_plans(&created(), &plans);
        assert_eq!(merged[0].technical_plan, vec!["TBD".to_string()]);
        assert_eq!(merged[0].confirmed_story_points, None);
        assert_eq!(merged[0].effective_story_points(), 1.0);
        assert_eq!(merged[1].technical_plan, vec!["reuse QuoteForm".to_string()]);
        assert_eq!(merged[1].effective_story_points(), 3.0);
    }

    #[test]
    fn test_merge_plans_empty_steps_become_tbd() {
        let plans = vec![TechnicalPlan {
            index: 1,
            technical_plan: vec![],
            story_points: 1.0,
        }];
        let merged = merge_plans(&created()[..1].to_vec(), &plans);
        assert_eq!(merged[0].technical_plan, vec!["TBD".to_string()]);
    }

    #[test]
    fn test_replace_second_ordered_list() {
        let mut doc = json!({
            "type": "doc",
            "content": [
                { "type": "paragraph" },
                { "type": "orderedList", "content": [] },
                { "type": "paragraph" },
                { "type": "orderedList", "content": [{ "type": "listItem" }] },
            ],
        });
        assert!(replace_second_ordered_list(&mut doc, json!({ "type": "orderedList", "content": [1, 2] })));
        assert_eq!(doc["content"][3]["content"].as_array().unwrap().len(), 2);
        // First list untouched
        assert!(doc["content"][1]["content"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_replace_second_ordered_list_missing() {
        let mut doc = json!({ "type": "doc", "content": [{ "type": "orderedList" }] });
        assert!(!replace_second_ordered_list(&mut doc, json!({})));
    }

    #[test]
    fn test_numbered_tasks_includes_detail() {
        let tasks: Vec<TaskItem> = serde_json::from_value(json!([
            {
                "summary": "Add endpoint",
                "task_summary": "POST /quotes",
                "user_story": "As a broker",
                "acceptance_criteria": ["201", "validated"],
            }
        ]))
        .unwrap();
        let text = numbered_tasks(&created()[..1].to_vec(), &tasks);
        assert!(text.starts_with("1. Add endpoint (AX-11)"));
        assert!(text.contains("POST /quotes"));
        assert!(text.contains("AC: 201; validated"));
    }
}
