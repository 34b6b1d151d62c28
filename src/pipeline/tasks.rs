//! Stage 5: Task Breakdown
//!
//! Generates the engineering task list for an approved epic. Nothing is
//! created until approval; approval then creates the tasks one by one under
//! the epic with a structured PM/Engineer description template.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::ai::prompts;
use crate::convert::{adf_doc, parse_inline};
use crate::pipeline::{PendingEntry, Pipeline, previews};
use crate::types::{
    CreatedTask, PmError, Result, Stage, TaskItem, total_story_points,
};

#[derive(Deserialize)]
struct TaskSet {
    #[serde(default)]
    tasks: Vec<TaskItem>,
}

impl Pipeline {
    /// Generate the breakdown and preview it.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_tasks(
        &self,
        chat_id: i64,
        issue_key: &str,
        epic_key: &str,
        epic_title: &str,
        epic_summary: &str,
        prd_page_id: &str,
        prd_web_url: &str,
        prd_content: &str,
        prototype_url: &str,
    ) -> Result<()> {
        let status_id = self.status(chat_id, "📝 Breaking the epic into tasks…").await?;

        let set: TaskSet = self
            .claude
            .generate_json(
                &prompts::task_breakdown(epic_title, epic_summary, prd_content),
                crate::constants::claude::BREAKDOWN_MAX_TOKENS,
                Stage::Tasks,
            )
            .await?;
        if set.tasks.is_empty() {
            return Err(PmError::generation(Stage::Tasks.tag(), "empty task breakdown"));
        }

        self.telegram.delete_message(chat_id, status_id).await;
        let preview = previews::tasks_preview(epic_title, &set.tasks, prd_web_url, prototype_url);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Tasks {
                issue_key: issue_key.to_string(),
                epic_key: epic_key.to_string(),
                epic_title: epic_title.to_string(),
                tasks: set.tasks,
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

    /// Approve: create every task under the epic with progress feedback,
    /// cross-comment the list, then chain into engineering review.
    pub async fn approve_tasks(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Tasks {
            issue_key,
            epic_key,
            epic_title,
            tasks,
            prd_page_id,
            prd_web_url,
            prd_content,
            prototype_url,
            chat_id,
        } = entry
        else {
            return Err(PmError::Stale("not a task breakdown preview".to_string()));
        };

        let status_id = self
            .status(chat_id, &format!("📝 Creating task 1/{}…", tasks.len()))
            .await?;

        let mut created: Vec<CreatedTask> = Vec::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            self.edit_status(
                chat_id,
                status_id,
                &format!("📝 Creating task {}/{}…", i + 1, tasks.len()),
            )
            .await?;

            let mut extra = serde_json::Map::new();
            extra.insert("parent".to_string(), json!({ "key": epic_key }));
            extra.insert(
                self.config.jira.story_points_field.clone(),
                json!(task.story_points),
            );
            let key = self
                .jira
                .create_issue(
                    &self.config.jira.delivery_project,
                    "Task",
                    &task.summary,
                    task_description(task),
                    Value::Object(extra),
                )
                .await?;
            created.push(CreatedTask {
                key,
                summary: task.summary.clone(),
                story_points: task.story_points,
            });
        }
        info!(%epic_key, count = created.len(), "tasks created");

        let listing = task_listing(&created, &self.config.jira.base_url, &tasks);
        self.jira.add_comment(&issue_key, &listing).await?;
        self.jira.add_comment(&epic_key, &listing).await?;

        self.telegram.delete_message(chat_id, status_id).await;
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "✅ {} tasks created under [{}]({}).",
                    created.len(),
                    epic_key,
                    self.jira.browse_url(&epic_key)
                ),
                None,
            )
            .await?;

        self.process_engineer(
            chat_id,
            &issue_key,
            &epic_key,
            &epic_title,
            &tasks,
            &created,
            &prd_page_id,
            &prd_web_url,
            &prd_content,
            &prototype_url,
        )
        .await
    }

    /// Reject: nothing was created, record the decision on the epic.
    pub async fn reject_tasks(&self, entry: PendingEntry) -> Result<()> {
        let PendingEntry::Tasks {
            epic_key, chat_id, ..
        } = entry
        else {
            return Err(PmError::Stale("not a task breakdown preview".to_string()));
        };

        self.jira
            .add_comment(&epic_key, "**Task breakdown rejected** before creation.")
            .await?;
        self.telegram
            .send_message(
                chat_id,
                &format!("⛔ Task breakdown for {} rejected.", epic_key),
                None,
            )
            .await?;
        Ok(())
    }

    /// Changes: regenerate the list from the current one plus instructions.
    pub async fn apply_task_changes(&self, entry: PendingEntry, changes: &str) -> Result<()> {
        let PendingEntry::Tasks {
            issue_key,
            epic_key,
            epic_title,
            tasks,
            prd_page_id,
            prd_web_url,
            prd_content,
            prototype_url,
            chat_id,
        } = entry
        else {
            return Err(PmError::Stale("not a task breakdown preview".to_string()));
        };

        let status_id = self.status(chat_id, "🔄 Reworking the breakdown…").await?;
        let current_json = serde_json::to_string(&json!({ "tasks": tasks }))?;
        let set: TaskSet = self
            .claude
            .generate_json(
                &prompts::task_changes(&current_json, changes, &prd_content),
                crate::constants::claude::BREAKDOWN_MAX_TOKENS,
                Stage::Tasks,
            )
            .await?;
        if set.tasks.is_empty() {
            return Err(PmError::generation(Stage::Tasks.tag(), "empty task breakdown"));
        }

        self.telegram.delete_message(chat_id, status_id).await;
        let preview =
            previews::tasks_preview(&epic_title, &set.tasks, &prd_web_url, &prototype_url);
        self.install_preview(
            chat_id,
            &preview,
            PendingEntry::Tasks {
                issue_key,
                epic_key,
                epic_title,
                tasks: set.tasks,
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

/// The task description template: a PM section with the full task detail
/// and an Engineer section the review stage fills in later.
fn task_description(task: &TaskItem) -> Value {
    let item = |content: Vec<Value>| {
        json!({
            "type": "listItem",
            "content": [{ "type": "paragraph", "content": content }],
        })
    };
    let criteria_item = json!({
        "type": "listItem",
        "content": [
            { "type": "paragraph", "content": parse_inline("Acceptance criteria:") },
            {
                "type": "bulletList",
                "content": task
                    .acceptance_criteria
                    .iter()
                    .map(|c| item(parse_inline(c)))
                    .collect::<Vec<_>>(),
            },
        ],
    });

    adf_doc(vec![
        json!({
            "type": "paragraph",
            "content": parse_inline("**Product Manager:**"),
        }),
        json!({
            "type": "orderedList",
            "attrs": { "order": 1 },
            "content": [
                item(parse_inline(&format!("Summary: {}", task.task_summary))),
                item(parse_inline(&format!("User story: {}", task.user_story))),
                criteria_item,
                item(parse_inline(&format!("Test plan: {}", task.test_plan))),
            ],
        }),
        json!({
            "type": "paragraph",
            "content": parse_inline("**Engineer:**"),
        }),
        json!({
            "type": "orderedList",
            "attrs": { "order": 1 },
            "content": [
                item(parse_inline("Technical plan:")),
                item(parse_inline("Story points estimated:")),
                item(parse_inline("Task broken down into sub-tasks where needed: Yes/No")),
            ],
        }),
        json!({ "type": "rule" }),
    ])
}

fn task_listing(created: &[CreatedTask], base_url: &str, tasks: &[TaskItem]) -> String {
    let mut lines = vec![format!(
        "**Tasks created** ({} tasks, {} SP):",
        created.len(),
        previews::format_points(total_story_points(tasks))
    )];
    for (i, task) in created.iter().enumerate() {
        lines.push(format!(
            "{}. [{}]({}/browse/{}) — {} ({} SP)",
            i + 1,
            task.key,
            base_url.trim_end_matches('/'),
            task.key,
            task.summary,
            previews::format_points(task.story_points),
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> TaskItem {
        serde_json::from_value(json!({
            "summary": "Add quote endpoint",
            "task_summary": "Expose POST /quotes",
            "user_story": "As a broker, I want instant quotes",
            "acceptance_criteria": ["returns 201", "validates payload"],
            "test_plan": "integration test against staging",
            "story_points": 2.0,
        }))
        .unwrap()
    }

    #[test]
    fn test_task_description_has_pm_and_engineer_sections() {
        let doc = task_description(&sample_task());
        let content = doc["content"].as_array().unwrap();
        // paragraph, orderedList, paragraph, orderedList, rule
        assert_eq!(content.len(), 5);
        assert_eq!(content[1]["type"], "orderedList");
        assert_eq!(content[3]["type"], "orderedList");
        assert_eq!(content[3]["content"].as_array().unwrap().len(), 3);

        let text = crate::convert::adf_to_text(&doc);
        assert!(text.contains("User story: As a broker"));
        assert!(text.contains("returns 201"));
        assert!(text.contains("Technical plan:"));
    }

    #[test]
    fn test_task_listing_links_and_totals() {
        let created = vec![CreatedTask {
            key: "AX-11".into(),
            summary: "Add quote endpoint".into(),
            story_points: 2.0,
        }];
        let listing = task_listing(&created, "https://j/", &[sample_task()]);
        assert!(listing.contains("**Tasks created** (1 tasks, 2 SP):"));
        assert!(listing.contains("[AX-11](https://j/browse/AX-11)"));
    }
}
