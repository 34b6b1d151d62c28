//! Generation Output Schemas
//!
//! Typed shapes for every AI stage output. Parsing happens in one place
//! (`ai::extract_json`) so a malformed response always becomes a
//! `Generation` error naming the stage instead of a loose half-parsed map.

use serde::{Deserialize, Serialize};

/// PM1 output: an enriched, strategically aligned idea.
///
/// `summary` and `description` land in the tracker; the remaining fields
/// exist for the chat preview only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedIdea {
    pub summary: String,
    /// Markdown with the four mandatory sections (outcome, problem, vision,
    /// north star).
    pub description: String,
    #[serde(default)]
    pub initiative_module: String,
    #[serde(default)]
    pub initiative_stage: String,
    #[serde(default)]
    pub initiative_scope: String,
    #[serde(default)]
    pub labels: String,
    #[serde(default)]
    pub product_category: Option<String>,
    #[serde(default = "default_discovery")]
    pub discovery: String,
    #[serde(default)]
    pub customer_segment: String,
    #[serde(default)]
    pub strategic_alignment: String,
    #[serde(default)]
    pub affected_modules: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

fn default_discovery() -> String {
    "Validate".to_string()
}

impl Default for EnrichedIdea {
    fn default() -> Self {
        Self {
            summary: String::new(),
            description: String::new(),
            initiative_module: String::new(),
            initiative_stage: String::new(),
            initiative_scope: String::new(),
            labels: String::new(),
            product_category: None,
            discovery: default_discovery(),
            customer_segment: String::new(),
            strategic_alignment: String::new(),
            affected_modules: Vec::new(),
            flags: Vec::new(),
        }
    }
}

/// PM4 output: epic title and summary distilled from the PRD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicContent {
    pub epic_title: String,
    #[serde(default)]
    pub epic_summary: String,
}

/// One task from the PM5 breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub summary: String,
    #[serde(default)]
    pub task_summary: String,
    #[serde(default)]
    pub user_story: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub test_plan: String,
    #[serde(default = "default_story_points")]
    pub story_points: f64,
}

fn default_story_points() -> f64 {
    1.0
}

/// Sum of story points across a breakdown.
pub fn total_story_points(tasks: &[TaskItem]) -> f64 {
    tasks.iter().map(|t| t.story_points).sum()
}

/// PM6 pass 1 output: what to investigate before writing technical plans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestigationPlan {
    #[serde(default)]
    pub db_keywords: Vec<String>,
    #[serde(default)]
    pub code_files: Vec<String>,
    #[serde(default)]
    pub api_integrations: Vec<String>,
}

/// PM6 pass 2 output: a technical plan for the task at `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalPlan {
    pub index: usize,
    #[serde(default)]
    pub technical_plan: Vec<String>,
    #[serde(default = "default_story_points")]
    pub story_points: f64,
}

/// A created task carried between PM5 approval, PM6, and PM7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTask {
    pub key: String,
    pub summary: String,
    pub story_points: f64,
}

/// A task under engineering review: created issue plus its generated plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedTask {
    pub key: String,
    pub summary: String,
    pub story_points: f64,
    #[serde(default)]
    pub technical_plan: Vec<String>,
    #[serde(default)]
    pub confirmed_story_points: Option<f64>,
}

impl ReviewedTask {
    pub fn effective_story_points(&self) -> f64 {
        self.confirmed_story_points.unwrap_or(self.story_points)
    }
}

/// Output of the `/update` instruction applier. Every field is optional;
/// null means "unchanged".
#[derive(Debug, Clone, Deserialize)]
pub struct TicketUpdate {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub story_points: Option<f64>,
    #[serde(default)]
    pub description_changes: Option<String>,
    #[serde(default)]
    pub updated_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enriched_idea_minimal_json() {
        let idea: EnrichedIdea = serde_json::from_str(
            r#"{"summary":"Faster quotes","description":"**Outcome**\n\nShip it"}"#,
        )
        .unwrap();
        assert_eq!(idea.summary, "Faster quotes");
        assert_eq!(idea.discovery, "Validate");
        assert!(idea.affected_modules.is_empty());
        assert!(idea.product_category.is_none());
    }

    #[test]
    fn test_task_defaults() {
        let task: TaskItem = serde_json::from_str(r#"{"summary":"Add endpoint"}"#).unwrap();
        assert_eq!(task.story_points, 1.0);
        assert!(task.acceptance_criteria.is_empty());
    }

    #[test]
    fn test_total_story_points() {
        let tasks: Vec<TaskItem> = serde_json::from_str(
            r#"[{"summary":"a","story_points":0.5},{"summary":"b","story_points":2.0}]"#,
        )
        .unwrap();
        assert_eq!(total_story_points(&tasks), 2.5);
    }

    #[test]
    fn test_reviewed_task_effective_points() {
        let mut t = ReviewedTask {
            key: "AX-10".into(),
            summary: "x".into(),
            story_points: 2.0,
            technical_plan: vec![],
            confirmed_story_points: None,
        };
        assert_eq!(t.effective_story_points(), 2.0);
        t.confirmed_story_points = Some(3.0);
        assert_eq!(t.effective_story_points(), 3.0);
    }

    #[test]
    fn test_ticket_update_nulls() {
        let u: TicketUpdate = serde_json::from_str(
            r#"{"summary":null,"story_points":0.5,"description_changes":null,"updated_description":null}"#,
        )
        .unwrap();
        assert!(u.summary.is_none());
        assert_eq!(u.story_points, Some(0.5));
    }
}
