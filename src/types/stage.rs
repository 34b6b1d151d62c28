//! Pipeline Stages
//!
//! The seven sequential stages an idea moves through, the wire tags used in
//! callback data and park markers, and the static approve-transition table.

use serde::{Deserialize, Serialize};

/// A pipeline stage. Order matters: approval chains each stage into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// PM1: raw idea intake and enrichment
    Intake,
    /// PM2: PRD generation
    Prd,
    /// PM3: interactive prototype
    Prototype,
    /// PM4: epic creation
    Epic,
    /// PM5: task breakdown
    Tasks,
    /// PM6: engineering review
    Engineer,
    /// PM7: sprint scheduling (terminal)
    Sprint,
}

impl Stage {
    /// Wire tag used in callback data and park marker comments.
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Intake => "pm1",
            Stage::Prd => "pm2",
            Stage::Prototype => "pm3",
            Stage::Epic => "pm4",
            Stage::Tasks => "pm5",
            Stage::Engineer => "pm6",
            Stage::Sprint => "pm7",
        }
    }

    /// Parse a wire tag. Unknown tags are left to the caller to degrade on.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "pm1" => Some(Stage::Intake),
            "pm2" => Some(Stage::Prd),
            "pm3" => Some(Stage::Prototype),
            "pm4" => Some(Stage::Epic),
            "pm5" => Some(Stage::Tasks),
            "pm6" => Some(Stage::Engineer),
            "pm7" => Some(Stage::Sprint),
            _ => None,
        }
    }

    /// Human label with the emoji used across chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Intake => "💡 Idea",
            Stage::Prd => "📋 PRD",
            Stage::Prototype => "🎨 Prototype",
            Stage::Epic => "📦 Epic",
            Stage::Tasks => "📝 Tasks",
            Stage::Engineer => "🔧 Engineer",
            Stage::Sprint => "📅 Sprint",
        }
    }

    /// The stage approval chains into, or None when this stage is terminal.
    pub fn on_approve(&self) -> Option<Stage> {
        match self {
            Stage::Intake => Some(Stage::Prd),
            Stage::Prd => Some(Stage::Prototype),
            Stage::Prototype => Some(Stage::Epic),
            Stage::Epic => Some(Stage::Tasks),
            Stage::Tasks => Some(Stage::Engineer),
            Stage::Engineer => Some(Stage::Sprint),
            Stage::Sprint => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A decision on a pending preview. Reject is terminal for any stage;
/// Changes regenerates the same stage; Park persists the item for later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Changes,
    Park,
    Reject,
}

impl Decision {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "approve" => Some(Decision::Approve),
            "changes" => Some(Decision::Changes),
            "park" => Some(Decision::Park),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }
}

/// Parse inline-button callback data like `pm3_approve` into its parts.
pub fn parse_callback(data: &str) -> Option<(Stage, Decision)> {
    let (tag, suffix) = data.split_once('_')?;
    Some((Stage::from_tag(tag)?, Decision::from_suffix(suffix)?))
}

/// Build callback data for a stage decision button.
pub fn callback_data(stage: Stage, decision: Decision) -> String {
    let suffix = match decision {
        Decision::Approve => "approve",
        Decision::Changes => "changes",
        Decision::Park => "park",
        Decision::Reject => "reject",
    };
    format!("{}_{}", stage.tag(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for stage in [
            Stage::Intake,
            Stage::Prd,
            Stage::Prototype,
            Stage::Epic,
            Stage::Tasks,
            Stage::Engineer,
            Stage::Sprint,
        ] {
            assert_eq!(Stage::from_tag(stage.tag()), Some(stage));
        }
        assert_eq!(Stage::from_tag("pm9"), None);
        assert_eq!(Stage::from_tag(""), None);
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(Stage::Intake.on_approve(), Some(Stage::Prd));
        assert_eq!(Stage::Prd.on_approve(), Some(Stage::Prototype));
        assert_eq!(Stage::Prototype.on_approve(), Some(Stage::Epic));
        assert_eq!(Stage::Epic.on_approve(), Some(Stage::Tasks));
        assert_eq!(Stage::Tasks.on_approve(), Some(Stage::Engineer));
        assert_eq!(Stage::Engineer.on_approve(), Some(Stage::Sprint));
        assert_eq!(Stage::Sprint.on_approve(), None);
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(
            parse_callback("pm1_approve"),
            Some((Stage::Intake, Decision::Approve))
        );
        assert_eq!(
            parse_callback("pm6_changes"),
            Some((Stage::Engineer, Decision::Changes))
        );
        assert_eq!(parse_callback("pm2_park"), Some((Stage::Prd, Decision::Park)));
        assert_eq!(parse_callback("resume_AR-12"), None);
        assert_eq!(parse_callback("pm1_nope"), None);
        assert_eq!(parse_callback("pm1"), None);
    }

    #[test]
    fn test_callback_data_round_trip() {
        let data = callback_data(Stage::Prototype, Decision::Reject);
        assert_eq!(data, "pm3_reject");
        assert_eq!(
            parse_callback(&data),
            Some((Stage::Prototype, Decision::Reject))
        );
    }
}
