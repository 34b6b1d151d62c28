//! Pending Decisions
//!
//! Every preview message with buttons gets a `PendingEntry` keyed by its
//! Telegram message id. `take` pops exactly once: the first button tap wins
//! and any later tap on the same preview observes nothing.

use dashmap::DashMap;

use crate::types::{EnrichedIdea, ReviewedTask, Stage, TaskItem};

/// Everything a stage needs to act on a decision, captured at preview time.
#[derive(Debug, Clone)]
pub enum PendingEntry {
    Intake {
        issue_key: String,
        structured: EnrichedIdea,
        raw_idea: String,
        kb_context: String,
        chat_id: i64,
    },
    Prd {
        issue_key: String,
        summary: String,
        page_id: String,
        page_title: String,
        web_url: String,
        prd_markdown: String,
        kb_context: String,
        inspiration: String,
        chat_id: i64,
    },
    Prototype {
        issue_key: String,
        summary: String,
        prototype_url: String,
        html: String,
        prd_content: String,
        prd_page_id: String,
        prd_web_url: String,
        design_system: String,
        db_schema: String,
        chat_id: i64,
    },
    Epic {
        issue_key: String,
        summary: String,
        epic_title: String,
        epic_summary: String,
        prd_page_id: String,
        prd_web_url: String,
        prd_content: String,
        prototype_url: String,
        chat_id: i64,
    },
    Tasks {
        issue_key: String,
        epic_key: String,
        epic_title: String,
        tasks: Vec<TaskItem>,
        prd_page_id: String,
        prd_web_url: String,
        prd_content: String,
        prototype_url: String,
        chat_id: i64,
    },
    Engineer {
        issue_key: String,
        epic_key: String,
        epic_title: String,
        tasks: Vec<ReviewedTask>,
        prd_page_id: String,
        prd_web_url: String,
        prd_content: String,
        prototype_url: String,
        context_summary: String,
        chat_id: i64,
    },
}

impl PendingEntry {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Intake { .. } => Stage::Intake,
            Self::Prd { .. } => Stage::Prd,
            Self::Prototype { .. } => Stage::Prototype,
            Self::Epic { .. } => Stage::Epic,
            Self::Tasks { .. } => Stage::Tasks,
            Self::Engineer { .. } => Stage::Engineer,
        }
    }

    pub fn issue_key(&self) -> &str {
        match self {
            Self::Intake { issue_key, .. }
            | Self::Prd { issue_key, .. }
            | Self::Prototype { issue_key, .. }
            | Self::Epic { issue_key, .. }
            | Self::Tasks { issue_key, .. }
            | Self::Engineer { issue_key, .. } => issue_key,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Self::Intake { chat_id, .. }
            | Self::Prd { chat_id, .. }
            | Self::Prototype { chat_id, .. }
            | Self::Epic { chat_id, .. }
            | Self::Tasks { chat_id, .. }
            | Self::Engineer { chat_id, .. } => *chat_id,
        }
    }
}

/// Pop-once store keyed by preview message id.
#[derive(Debug, Default)]
pub struct PendingStore {
    entries: DashMap<i64, PendingEntry>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, message_id: i64, entry: PendingEntry) {
        self.entries.insert(message_id, entry);
    }

    /// Remove and return the entry. The second caller gets `None`.
    pub fn take(&self, message_id: i64) -> Option<PendingEntry> {
        self.entries.remove(&message_id).map(|(_, e)| e)
    }

    /// Non-consuming existence check, for flows that collect more input
    /// before deciding.
    pub fn contains(&self, message_id: i64) -> bool {
        self.entries.contains_key(&message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake_entry(key: &str) -> PendingEntry {
        PendingEntry::Intake {
            issue_key: key.to_string(),
            structured: EnrichedIdea::default(),
            raw_idea: "raw".to_string(),
            kb_context: String::new(),
            chat_id: 7,
        }
    }

    #[test]
    fn test_take_pops_exactly_once() {
        let store = PendingStore::new();
        store.put(100, intake_entry("AR-1"));
        assert!(store.take(100).is_some());
        assert!(store.take(100).is_none());
    }

    #[test]
    fn test_put_overwrites_same_message_id() {
        let store = PendingStore::new();
        store.put(5, intake_entry("AR-1"));
        store.put(5, intake_entry("AR-2"));
        let entry = store.take(5).unwrap();
        assert_eq!(entry.issue_key(), "AR-2");
        assert!(store.is_empty());
    }

    #[test]
    fn test_stage_accessor() {
        assert_eq!(intake_entry("AR-1").stage(), Stage::Intake);
        assert_eq!(intake_entry("AR-1").chat_id(), 7);
    }
}
