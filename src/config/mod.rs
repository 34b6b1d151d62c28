//! Configuration
//!
//! Figment-based loading with defaults, a TOML file, and PMPILOT_* env
//! overrides.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    AnthropicConfig, Config, ConfluenceConfig, DatabaseConfig, GithubConfig, JiraConfig,
    TelegramConfig,
};
