//! Stage 7: Sprint Scheduling
//!
//! Terminal stage. Reads the roadmap slot off the source idea, maps it to a
//! board sprint, and moves the epic and its tasks in. No preview here: the
//! move either completes or fails with a visible message.

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::clients::Sprint;
use crate::pipeline::{Pipeline, previews};
use crate::types::{ReviewedTask, Result};

static SLOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*\(S(\d+)\)$").unwrap());

/// Roadmap values that deliberately do not map to a sprint.
const UNSCHEDULED_VALUES: &[&str] = &["", "backlog", "shipped", "delivered"];

/// A parsed roadmap slot: month plus zero-based sprint index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadmapSlot {
    pub month: u32,
    pub sprint_index: usize,
}

impl Pipeline {
    /// Schedule the epic and its tasks into the sprint named by the source
    /// idea's roadmap field, assign them, and move them to Ready.
    pub async fn process_sprint(
        &self,
        chat_id: i64,
        source_idea_key: &str,
        epic_key: &str,
        tasks: Vec<ReviewedTask>,
    ) -> Result<()> {
        let status_id = self.status(chat_id, "📅 Scheduling the sprint…").await?;

        let issue = self
            .jira
            .get_issue(source_idea_key, Some(&self.config.jira.roadmap_field))
            .await?;
        let field = &issue["fields"][self.config.jira.roadmap_field.as_str()];
        let value = field["value"]
            .as_str()
            .or_else(|| field.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        if UNSCHEDULED_VALUES.contains(&value.to_lowercase().as_str()) {
            self.telegram.delete_message(chat_id, status_id).await;
            self.finish(chat_id, epic_key, &tasks, "left in the backlog (no roadmap slot)")
                .await?;
            return Ok(());
        }

        let Some(slot) = parse_roadmap_slot(&value) else {
            warn!(%source_idea_key, %value, "unparseable roadmap value");
            self.telegram.delete_message(chat_id, status_id).await;
            self.telegram
                .send_message(
                    chat_id,
                    &format!(
                        "⚠️ Roadmap value \"{}\" on {} is not in the `Month (SN)` form. Tasks stay in the backlog.",
                        value, source_idea_key
                    ),
                    None,
                )
                .await?;
            return Ok(());
        };

        let sprints = self.jira.board_sprints().await?;
        let now = Utc::now();
        let Some(sprint) = pick_sprint(&sprints, slot, now) else {
            self.telegram.delete_message(chat_id, status_id).await;
            self.telegram
                .send_message(
                    chat_id,
                    &format!(
                        "⚠️ No board sprint matches \"{}\". Tasks stay in the backlog.",
                        value
                    ),
                    None,
                )
                .await?;
            return Ok(());
        };

        let mut keys: Vec<String> = vec![epic_key.to_string()];
        keys.extend(tasks.iter().map(|t| t.key.clone()));
        self.jira.move_to_sprint(sprint.id, &keys).await?;
        info!(%epic_key, sprint = %sprint.name, moved = keys.len(), "moved into sprint");

        for task in &tasks {
            if !self.config.jira.delivery_assignee.is_empty() {
                self.jira
                    .assign(&task.key, &self.config.jira.delivery_assignee)
                    .await?;
            }
            self.jira
                .transition(&task.key, &self.config.jira.ready_transition_id)
                .await?;
        }

        self.jira
            .add_comment(
                epic_key,
                &format!(
                    "**Scheduled into {}** with {} tasks ({} SP).",
                    sprint.name,
                    tasks.len(),
                    previews::format_points(total_points(&tasks)),
                ),
            )
            .await?;

        self.telegram.delete_message(chat_id, status_id).await;
        self.finish(
            chat_id,
            epic_key,
            &tasks,
            &format!("scheduled into *{}*", sprint.name),
        )
        .await
    }

    async fn finish(
        &self,
        chat_id: i64,
        epic_key: &str,
        tasks: &[ReviewedTask],
        outcome: &str,
    ) -> Result<()> {
        self.telegram
            .send_message(
                chat_id,
                &format!(
                    "🎉 Pipeline complete. [{}]({}) {} — {} tasks, {} SP.",
                    epic_key,
                    self.jira.browse_url(epic_key),
                    outcome,
                    tasks.len(),
                    previews::format_points(total_points(tasks)),
                ),
                None,
            )
            .await?;
        Ok(())
    }
}

fn total_points(tasks: &[ReviewedTask]) -> f64 {
    tasks.iter().map(ReviewedTask::effective_story_points).sum()
}

/// Parse `Month (SN)` into a slot. `S1` is the first sprint of the month.
pub fn parse_roadmap_slot(value: &str) -> Option<RoadmapSlot> {
    let caps = SLOT_RE.captures(value.trim())?;
    let month = month_number(caps.get(1)?.as_str())?;
    let n: usize = caps.get(2)?.as_str().parse().ok()?;
    if n == 0 {
        return None;
    }
    Some(RoadmapSlot {
        month,
        sprint_index: n - 1,
    })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// The slot's target year: this year, or next when the month already passed.
pub fn target_year(month: u32, now: DateTime<Utc>) -> i32 {
    if month < now.month() {
        now.year() + 1
    } else {
        now.year()
    }
}

/// Pick the sprint for a slot: active and future sprints starting in the
/// slot's month and target year, ordered by start date, indexed by SN.
/// Falls back to a month match in any year when the target year is empty.
pub fn pick_sprint(sprints: &[Sprint], slot: RoadmapSlot, now: DateTime<Utc>) -> Option<Sprint> {
    let year = target_year(slot.month, now);

    let mut in_year = month_matches(sprints, slot.month, Some(year));
    if in_year.is_empty() {
        in_year = month_matches(sprints, slot.month, None);
    }
    in_year.get(slot.sprint_index).cloned()
}

fn month_matches(sprints: &[Sprint], month: u32, year: Option<i32>) -> Vec<Sprint> {
    let mut matched: Vec<(DateTime<Utc>, Sprint)> = sprints
        .iter()
        .filter_map(|s| {
            let start = s.start_date.as_deref()?;
            let parsed = DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc);
            if parsed.month() != month {
                return None;
            }
            if let Some(year) = year
                && parsed.year() != year
            {
                return None;
            }
            Some((parsed, s.clone()))
        })
        .collect();
    matched.sort_by_key(|(start, _)| *start);
    matched.into_iter().map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sprint(id: u64, name: &str, start: &str) -> Sprint {
        Sprint {
            id,
            name: name.to_string(),
            state: "future".to_string(),
            start_date: Some(start.to_string()),
        }
    }

    fn at(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_roadmap_slot() {
        assert_eq!(
            parse_roadmap_slot("October (S2)"),
            Some(RoadmapSlot { month: 10, sprint_index: 1 })
        );
        assert_eq!(
            parse_roadmap_slot("march(S1)"),
            Some(RoadmapSlot { month: 3, sprint_index: 0 })
        );
        assert_eq!(parse_roadmap_slot("Backlog"), None);
        assert_eq!(parse_roadmap_slot("October S2"), None);
        assert_eq!(parse_roadmap_slot("Pluto (S1)"), None);
        assert_eq!(parse_roadmap_slot("May (S0)"), None);
    }

    #[test]
    fn test_target_year_wraps_past_months() {
        let now = at(2026, 8);
        assert_eq!(target_year(10, now), 2026);
        assert_eq!(target_year(8, now), 2026);
        assert_eq!(target_year(3, now), 2027);
    }

    #[test]
    fn test_pick_sprint_orders_within_month() {
        let sprints = vec![
            sprint(2, "Sprint 42", "2026-10-19T00:00:00Z"),
            sprint(1, "Sprint 41", "2026-10-05T00:00:00Z"),
            sprint(3, "Sprint 43", "2026-11-02T00:00:00Z"),
        ];
        let now = at(2026, 8);
        let slot = RoadmapSlot { month: 10, sprint_index: 1 };
        assert_eq!(pick_sprint(&sprints, slot, now).unwrap().id, 2);
        let first = RoadmapSlot { month: 10, sprint_index: 0 };
        assert_eq!(pick_sprint(&sprints, first, now).unwrap().id, 1);
    }

    #[test]
    fn test_pick_sprint_falls_back_to_any_year() {
        // Month already passed, target year 2027, but the board only has a
        // 2026 sprint for that month
        let sprints = vec![sprint(7, "Sprint 12", "2026-03-09T00:00:00Z")];
        let now = at(2026, 8);
        let slot = RoadmapSlot { month: 3, sprint_index: 0 };
        assert_eq!(pick_sprint(&sprints, slot, now).unwrap().id, 7);
    }

    #[test]
    fn test_pick_sprint_missing_index() {
        let sprints = vec![sprint(1, "Sprint 41", "2026-10-05T00:00:00Z")];
        let now = at(2026, 8);
        let slot = RoadmapSlot { month: 10, sprint_index: 3 };
        assert!(pick_sprint(&sprints, slot, now).is_none());
    }
}
