//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Config file (config.toml, or the path passed on the command line)
//! 3. Environment variables (PMPILOT_* prefix, double underscore for nesting,
//!    e.g. PMPILOT_TELEGRAM__BOT_TOKEN -> telegram.bot_token)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{PmError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → config file → env vars, then validate.
    pub fn load(config_path: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);
        if path.exists() {
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }

        figment = figment.merge(Env::prefixed("PMPILOT_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| PmError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load from a specific file only, skipping env and validation.
    /// Used by `config show` style tooling and tests.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| PmError::Config(format!("Configuration error: {}", e)))
    }

    /// Default config file location next to the binary's working directory.
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// Generate a starter config file content (TOML).
    pub fn default_config_template() -> String {
        r#"# pmpilot Configuration
# Credentials come from PMPILOT_* environment variables:
#   PMPILOT_TELEGRAM__BOT_TOKEN, PMPILOT_ANTHROPIC__API_KEY,
#   PMPILOT_JIRA__EMAIL, PMPILOT_JIRA__API_TOKEN, PMPILOT_GITHUB__TOKEN,
#   PMPILOT_DATABASE__URL (optional)

version = "1.0"

[jira]
base_url = "https://example.atlassian.net"
idea_project = "AR"
delivery_project = "AX"
archive_project = "ARU"
board_id = 1

[confluence]
space_id = ""
prd_parent_id = ""

[confluence.kb_pages]
# strategic_initiatives = "290619393"
# platform_modules = "290652164"
# brand_design_system = "290684966"

[github]
prototypes_repo = "owner/prototypes"
codebase_repo = "owner/codebase"
pages_base_url = "https://owner.github.io/prototypes"

[anthropic]
model = "claude-sonnet-4-20250514"
max_tokens = 4096
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[jira]
base_url = "https://test.atlassian.net"
idea_project = "ID"

[anthropic]
max_tokens = 2048
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.jira.base_url, "https://test.atlassian.net");
        assert_eq!(config.jira.idea_project, "ID");
        // Untouched values keep their defaults
        assert_eq!(config.jira.delivery_project, "AX");
        assert_eq!(config.anthropic.max_tokens, 2048);
    }

    #[test]
    fn test_template_parses() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", ConfigLoader::default_config_template()).unwrap();
        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.github.prototypes_repo, "owner/prototypes");
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let config =
            ConfigLoader::load_from_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.jira.idea_project, "AR");
    }
}
