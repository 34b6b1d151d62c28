//! pmpilot - Telegram-Driven Product Pipeline Bot
//!
//! Walks a product idea through the full delivery pipeline, one approval at
//! a time: the idea is enriched and ticketed, a PRD is drafted, a clickable
//! prototype is published, an epic and its task breakdown are created, the
//! tasks get technical plans, and the lot is scheduled into a sprint. Every
//! stage pauses on a Telegram preview with Approve / Changes / Pending /
//! Reject buttons.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pmpilot::{Bot, ConfigLoader, Pipeline};
//!
//! let config = ConfigLoader::load(None)?;
//! let pipeline = Pipeline::new(/* config + clients */);
//! Bot::new(Arc::new(pipeline)).run().await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: Claude client, typed JSON extraction, prompt builders
//! - [`clients`]: Jira, Confluence, GitHub, MySQL schema, web docs
//! - [`pipeline`]: the seven stages plus park/resume and /update actions
//! - [`bot`]: the long-poll loop and per-chat conversation state
//! - [`telegram`]: the minimal Bot API surface the bot needs
//! - [`convert`]: markdown to ADF and to Confluence wiki markup

pub mod ai;
pub mod bot;
pub mod clients;
pub mod config;
pub mod constants;
pub mod convert;
pub mod pipeline;
pub mod telegram;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::{PmError, Result, ResultExt};

// Pipeline
pub use pipeline::{ParkStore, PendingEntry, PendingStore, Pipeline};

// Bot
pub use bot::Bot;

// =============================================================================
// Client Re-exports
// =============================================================================

pub use ai::ClaudeClient;
pub use clients::{ConfluenceClient, DbClient, GithubClient, JiraClient, WebClient};
pub use telegram::TelegramClient;
