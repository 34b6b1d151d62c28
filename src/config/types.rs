//! Configuration Types
//!
//! All configuration structures with defaults. Credentials arrive via env
//! overrides (`PMPILOT_*`) and are wrapped in `SecretString` by the clients
//! that use them, so they never show up in Debug output of live objects.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Telegram bot settings
    pub telegram: TelegramConfig,

    /// Anthropic generation settings
    pub anthropic: AnthropicConfig,

    /// Jira tracker settings
    pub jira: JiraConfig,

    /// Confluence wiki settings
    pub confluence: ConfluenceConfig,

    /// GitHub prototypes/codebase settings
    pub github: GithubConfig,

    /// MySQL schema discovery settings (optional at runtime)
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            telegram: TelegramConfig::default(),
            anthropic: AnthropicConfig::default(),
            jira: JiraConfig::default(),
            confluence: ConfluenceConfig::default(),
            github: GithubConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Preflight validation. Every missing credential is reported at once so
    /// the operator fixes one restart, not four.
    pub fn validate(&self) -> crate::types::Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.is_empty() {
            missing.push("telegram.bot_token");
        }
        if self.anthropic.api_key.is_empty() {
            missing.push("anthropic.api_key");
        }
        if self.jira.email.is_empty() {
            missing.push("jira.email");
        }
        if self.jira.api_token.is_empty() {
            missing.push("jira.api_token");
        }
        if self.github.token.is_empty() {
            missing.push("github.token");
        }
        if !missing.is_empty() {
            return Err(crate::types::PmError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.anthropic.max_tokens == 0 {
            return Err(crate::types::PmError::Config(
                "anthropic.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.jira.base_url.is_empty() {
            return Err(crate::types::PmError::Config(
                "jira.base_url must be set".to_string(),
            ));
        }
        url::Url::parse(&self.jira.base_url)?;

        Ok(())
    }
}

// =============================================================================
// Telegram Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token (env: PMPILOT_TELEGRAM__BOT_TOKEN)
    pub bot_token: String,

    /// Long-poll timeout in seconds
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            poll_timeout_secs: crate::constants::telegram::POLL_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Anthropic Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// API key (env: PMPILOT_ANTHROPIC__API_KEY)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Default generation budget in tokens
    pub max_tokens: u32,

    /// Request timeout in seconds (prototype generation needs the headroom)
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: crate::constants::claude::DEFAULT_MAX_TOKENS,
            timeout_secs: crate::constants::network::GENERATION_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Jira Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Site base URL, e.g. https://example.atlassian.net
    pub base_url: String,

    /// Account email for basic auth (env: PMPILOT_JIRA__EMAIL)
    pub email: String,

    /// API token for basic auth (env: PMPILOT_JIRA__API_TOKEN)
    pub api_token: String,

    /// Discovery project for ideas
    pub idea_project: String,

    /// Delivery project for epics and tasks
    pub delivery_project: String,

    /// Archive project for retired issues
    pub archive_project: String,

    /// Agile board carrying the delivery sprints
    pub board_id: u64,

    /// Custom field ids, instance specific
    pub story_points_field: String,
    pub roadmap_field: String,
    pub discovery_field: String,
    pub epic_color_field: String,

    /// Option id for the discovery "Won't Do" value
    pub discovery_wont_do_id: String,

    /// Account id issues are assigned to at sprint scheduling
    pub delivery_assignee: String,

    /// Workflow transition id for "Ready"
    pub ready_transition_id: String,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: String::new(),
            api_token: String::new(),
            idea_project: "AR".to_string(),
            delivery_project: "AX".to_string(),
            archive_project: "ARU".to_string(),
            board_id: 1,
            story_points_field: "customfield_10016".to_string(),
            roadmap_field: "customfield_10560".to_string(),
            discovery_field: "customfield_10049".to_string(),
            epic_color_field: "customfield_10017".to_string(),
            discovery_wont_do_id: "10028".to_string(),
            delivery_assignee: String::new(),
            ready_transition_id: "7".to_string(),
        }
    }
}

// =============================================================================
// Confluence Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    /// Numeric space id PRD pages are created in
    pub space_id: String,

    /// Parent folder for PRD pages
    pub prd_parent_id: String,

    /// Knowledge-base pages: logical key to page id
    pub kb_pages: std::collections::BTreeMap<String, String>,

    /// KB key whose page carries the design system (PM3 context)
    pub design_system_key: String,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            space_id: String::new(),
            prd_parent_id: String::new(),
            kb_pages: std::collections::BTreeMap::new(),
            design_system_key: "brand_design_system".to_string(),
        }
    }
}

// =============================================================================
// GitHub Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Token with contents access (env: PMPILOT_GITHUB__TOKEN)
    pub token: String,

    /// Repo receiving prototype HTML files, "owner/name"
    pub prototypes_repo: String,

    /// Main codebase repo for PM6 investigation, "owner/name"
    pub codebase_repo: String,

    /// Pages base URL prototypes are served from
    pub pages_base_url: String,

    /// Path of the parked-item index file inside the prototypes repo
    pub park_index_path: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            prototypes_repo: String::new(),
            codebase_repo: String::new(),
            pages_base_url: String::new(),
            park_index_path: crate::constants::park::INDEX_PATH.to_string(),
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// MySQL connection URL (env: PMPILOT_DATABASE__URL). Empty disables
    /// schema discovery; every flow that uses it degrades to a placeholder.
    pub url: String,

    /// Connection pool cap
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.telegram.bot_token = "123:abc".into();
        cfg.anthropic.api_key = "sk-test".into();
        cfg.jira.base_url = "https://example.atlassian.net".into();
        cfg.jira.email = "pm@example.com".into();
        cfg.jira.api_token = "token".into();
        cfg.github.token = "ghp_test".into();
        cfg
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let err = Config::default().validate().unwrap_err().to_string();
        assert!(err.contains("telegram.bot_token"));
        assert!(err.contains("anthropic.api_key"));
        assert!(err.contains("jira.api_token"));
        assert!(err.contains("github.token"));
    }

    #[test]
    fn test_validate_rejects_malformed_base_url() {
        let mut cfg = valid_config();
        cfg.jira.base_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_zero_max_tokens() {
        let mut cfg = valid_config();
        cfg.anthropic.max_tokens = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.jira.idea_project, "AR");
        assert_eq!(cfg.jira.delivery_project, "AX");
        assert_eq!(cfg.github.park_index_path, "parked.json");
        assert!(cfg.database.url.is_empty());
    }
}
