//! Core Types
//!
//! Error taxonomy, pipeline stages, and typed generation outputs.

pub mod error;
pub mod outputs;
pub mod stage;

pub use error::{PmError, Result, ResultExt};
pub use outputs::{
    CreatedTask, EnrichedIdea, EpicContent, InvestigationPlan, ReviewedTask, TaskItem,
    TechnicalPlan, TicketUpdate, total_story_points,
};
pub use stage::{Decision, Stage, callback_data, parse_callback};
