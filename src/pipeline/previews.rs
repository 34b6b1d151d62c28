//! Preview Text Builders
//!
//! Pure functions assembling the Markdown previews shown before each
//! decision. Long bodies are soft-truncated so links and buttons always
//! survive the Bot API message limit.

use crate::pipeline::park::ParkedRecord;
use crate::pipeline::pending::PendingEntry;
use crate::telegram::soft_truncate;
use crate::types::{EnrichedIdea, ReviewedTask, Stage, TaskItem, total_story_points};

const TRUNCATION_NOTICE: &str = "_…truncated, full content is in the linked artifact._";

/// Stage preview for an idea draft.
pub fn idea_preview(issue_key: &str, browse_url: &str, idea: &EnrichedIdea) -> String {
    let mut lines = vec![
        format!("💡 [{}]({}) — {}", issue_key, browse_url, idea.summary),
        String::new(),
        format!("*Module:* {}", dash_if_empty(&idea.initiative_module)),
        format!("*Scope:* {}", dash_if_empty(&idea.initiative_scope)),
        format!("*Segment:* {}", dash_if_empty(&idea.customer_segment)),
    ];
    if !idea.strategic_alignment.is_empty() {
        lines.push(format!("*Alignment:* {}", idea.strategic_alignment));
    }
    if !idea.flags.is_empty() {
        lines.push(format!("*Flags:* {}", idea.flags.join(", ")));
    }
    lines.push(String::new());
    lines.push(idea.description.clone());
    soft_truncate(&lines.join("\n"), TRUNCATION_NOTICE)
}

/// Stage preview for a PRD draft.
pub fn prd_preview(issue_key: &str, browse_url: &str, summary: &str, web_url: &str) -> String {
    format!(
        "📋 [{key}]({browse}) — PRD: {summary}\n[Open PRD in Confluence]({web})",
        key = issue_key,
        browse = browse_url,
        summary = summary,
        web = web_url,
    )
}

/// Stage preview for a pushed prototype.
pub fn prototype_preview(issue_key: &str, prototype_url: &str, summary: &str) -> String {
    format!(
        "🎨 [{}]({}) — Prototype: {}",
        issue_key, prototype_url, summary
    )
}

/// Stage preview for epic content (the epic is not created yet).
pub fn epic_preview(
    issue_key: &str,
    browse_url: &str,
    epic_title: &str,
    epic_summary: &str,
) -> String {
    format!(
        "📦 *Epic Preview* for [{key}]({browse})\n\n*{title}*\n\n{summary}",
        key = issue_key,
        browse = browse_url,
        title = epic_title,
        summary = epic_summary,
    )
}

/// Stage preview for a task breakdown. Falls back to a count-only summary
/// when even the truncated list would not fit.
pub fn tasks_preview(
    epic_title: &str,
    tasks: &[TaskItem],
    prd_web_url: &str,
    prototype_url: &str,
) -> String {
    let mut lines = vec![format!("📝 *Task breakdown* — {}", epic_title), String::new()];
    for (i, task) in tasks.iter().enumerate() {
        lines.push(format!(
            "{}. {} (*{} SP*)",
            i + 1,
            task.summary,
            format_points(task.story_points)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "*Total:* {} tasks, {} SP",
        tasks.len(),
        format_points(total_story_points(tasks))
    ));
    lines.push(format!(
        "[PRD]({}) · [Prototype]({})",
        prd_web_url, prototype_url
    ));

    let text = lines.join("\n");
    if text.chars().count() <= crate::constants::telegram::PREVIEW_SOFT_LIMIT {
        text
    } else {
        format!(
            "📝 *Task breakdown* — {}\n\n{} tasks, {} SP total (list too long to show).\n[PRD]({}) · [Prototype]({})",
            epic_title,
            tasks.len(),
            format_points(total_story_points(tasks)),
            prd_web_url,
            prototype_url,
        )
    }
}

/// Stage preview for engineering review: each task with its plan condensed
/// to one line.
pub fn engineer_preview(epic_title: &str, tasks: &[ReviewedTask]) -> String {
    let mut lines = vec![
        format!("🔧 *Engineering review* — {}", epic_title),
        String::new(),
    ];
    for (i, task) in tasks.iter().enumerate() {
        lines.push(format!(
            "{}. *{}* — {} (*{} SP*)",
            i + 1,
            task.key,
            task.summary,
            format_points(task.effective_story_points())
        ));
        if !task.technical_plan.is_empty() {
            lines.push(format!("   _{}_", condense_plan(&task.technical_plan)));
        }
    }

    let text = lines.join("\n");
    if text.chars().count() <= crate::constants::telegram::PREVIEW_SOFT_LIMIT {
        text
    } else {
        format!(
            "🔧 *Engineering review* — {}\n\n{} tasks planned, {} SP total (details on the tickets).",
            epic_title,
            tasks.len(),
            format_points(
                tasks
                    .iter()
                    .map(ReviewedTask::effective_story_points)
                    .sum::<f64>()
            ),
        )
    }
}

/// Listing body for `/pending`.
pub fn parked_list(records: &[ParkedRecord]) -> String {
    let mut lines = vec!["⏸ *Parked items*".to_string(), String::new()];
    for record in records {
        let label = Stage::from_tag(&record.stage)
            .map(|s| s.label().to_string())
            .unwrap_or_else(|| format!("unknown stage `{}`", record.stage));
        lines.push(format!(
            "• *{}* — {} ({})",
            record.issue_key, record.summary, label
        ));
    }
    lines.join("\n")
}

/// Re-preview for a resumed entry, dispatched on its stage.
pub fn entry_preview(entry: &PendingEntry, browse_url: &str) -> String {
    match entry {
        PendingEntry::Intake {
            issue_key,
            structured,
            ..
        } => idea_preview(issue_key, browse_url, structured),
        PendingEntry::Prd {
            issue_key,
            summary,
            web_url,
            ..
        } => prd_preview(issue_key, browse_url, summary, web_url),
        PendingEntry::Prototype {
            issue_key,
            summary,
            prototype_url,
            ..
        } => prototype_preview(issue_key, prototype_url, summary),
        PendingEntry::Epic {
            issue_key,
            epic_title,
            epic_summary,
            ..
        } => epic_preview(issue_key, browse_url, epic_title, epic_summary),
        PendingEntry::Tasks {
            epic_title,
            tasks,
            prd_web_url,
            prototype_url,
            ..
        } => tasks_preview(epic_title, tasks, prd_web_url, prototype_url),
        PendingEntry::Engineer {
            epic_title, tasks, ..
        } => engineer_preview(epic_title, tasks),
    }
}

/// Story points without a trailing `.0` for whole values.
pub fn format_points(points: f64) -> String {
    if (points - points.round()).abs() < f64::EPSILON {
        format!("{}", points as i64)
    } else {
        format!("{}", points)
    }
}

fn condense_plan(plan: &[String]) -> String {
    let joined = plan.join(" / ");
    if joined.chars().count() > 120 {
        let cut: String = joined.chars().take(119).collect();
        format!("{}…", cut)
    } else {
        joined
    }
}

fn dash_if_empty(s: &str) -> &str {
    if s.is_empty() { "—" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(1.0), "1");
        assert_eq!(format_points(0.5), "0.5");
        assert_eq!(format_points(2.25), "2.25");
    }

    #[test]
    fn test_idea_preview_links_issue() {
        let idea = EnrichedIdea {
            summary: "Faster quotes".into(),
            description: "## Problem\nSlow.".into(),
            ..Default::default()
        };
        let text = idea_preview("AR-1", "https://j/browse/AR-1", &idea);
        assert!(text.starts_with("💡 [AR-1](https://j/browse/AR-1) — Faster quotes"));
        assert!(text.contains("## Problem"));
    }

    #[test]
    fn test_tasks_preview_totals() {
        let tasks: Vec<TaskItem> = serde_json::from_str(
            r#"[{"summary":"a","story_points":0.5},{"summary":"b","story_points":2}]"#,
        )
        .unwrap();
        let text = tasks_preview("Quotes epic", &tasks, "https://w", "https://p");
        assert!(text.contains("1. a (*0.5 SP*)"));
        assert!(text.contains("*Total:* 2 tasks, 2.5 SP"));
        assert!(text.contains("[PRD](https://w)"));
    }

    #[test]
    fn test_tasks_preview_falls_back_when_oversized() {
        let tasks: Vec<TaskItem> = (0..60)
            .map(|i| {
                serde_json::from_value(json!({
                    "summary": format!("task {} {}", i, "x".repeat(90)),
                }))
                .unwrap()
            })
            .collect();
        let text = tasks_preview("Epic", &tasks, "https://w", "https://p");
        assert!(text.chars().count() <= crate::constants::telegram::PREVIEW_SOFT_LIMIT);
        assert!(text.contains("60 tasks"));
    }

    #[test]
    fn test_engineer_preview_condenses_plan() {
        let tasks = vec![ReviewedTask {
            key: "AX-3".into(),
            summary: "Add endpoint".into(),
            story_points: 1.0,
            technical_plan: vec!["step one".into(), "step two".into()],
            confirmed_story_points: Some(2.0),
        }];
        let text = engineer_preview("Epic", &tasks);
        assert!(text.contains("*AX-3* — Add endpoint (*2 SP*)"));
        assert!(text.contains("_step one / step two_"));
    }

    #[test]
    fn test_parked_list_handles_unknown_stage() {
        let records = vec![ParkedRecord {
            issue_key: "AR-1".into(),
            summary: "S".into(),
            stage: "pm42".into(),
            data: json!({}),
        }];
        let text = parked_list(&records);
        assert!(text.contains("unknown stage `pm42`"));
    }
}
