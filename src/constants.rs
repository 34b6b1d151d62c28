//! Global Constants
//!
//! Centralized constants for tuning and wire formats. Magic numbers live
//! here with documentation.

/// Claude Messages API constants
pub mod claude {
    /// Messages endpoint
    pub const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

    /// `anthropic-version` header value
    pub const API_VERSION: &str = "2023-06-01";

    /// Default generation budget for text and small JSON outputs
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;

    /// Budget for full-page prototype HTML
    pub const PROTOTYPE_MAX_TOKENS: u32 = 16000;

    /// Budget for task breakdowns and technical plan sets
    pub const BREAKDOWN_MAX_TOKENS: u32 = 6000;
}

/// HTTP timeouts (seconds)
pub mod network {
    /// Default per-request timeout for the tracker, wiki, and code host
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Generation request timeout; prototype HTML needs the headroom
    pub const GENERATION_TIMEOUT_SECS: u64 = 300;

    /// Documentation page fetches
    pub const WEB_FETCH_TIMEOUT_SECS: u64 = 15;
}

/// Telegram Bot API constants
pub mod telegram {
    /// Long-poll hold passed to getUpdates
    pub const POLL_TIMEOUT_SECS: u64 = 20;

    /// Hard per-message character limit imposed by the Bot API
    pub const MESSAGE_LIMIT: usize = 4096;

    /// Preview bodies are trimmed here so the truncation notice and the
    /// keyboard always fit under the hard limit
    pub const PREVIEW_SOFT_LIMIT: usize = 3500;
}

/// Park marker constants
pub mod park {
    /// Prefix of the marker comment carrying a parked item's payload
    pub const MARKER_PREFIX: &str = "PM_AGENT_PARKED";

    /// Default path of the listing index inside the prototypes repo
    pub const INDEX_PATH: &str = "parked.json";
}

/// GitHub API constants
pub mod github {
    /// REST API root
    pub const API_ROOT: &str = "https://api.github.com";

    /// `X-GitHub-Api-Version` header value
    pub const API_VERSION: &str = "2022-11-28";

    /// Cap on decoded file content kept from a Contents API read
    pub const MAX_FILE_FETCH_BYTES: usize = 50_000;
}

/// Schema discovery constants
pub mod schema {
    /// Cap on keyword-matched tables included in prompt context
    pub const MAX_TABLES: usize = 15;
}

/// PM6 investigation constants
pub mod investigation {
    /// Cap on codebase files read for technical-plan context
    pub const MAX_CODE_FILES: usize = 10;

    /// Per-file character cap before truncation
    pub const MAX_FILE_CHARS: usize = 3000;

    /// Cap on third-party documentation pages fetched
    pub const MAX_API_DOCS: usize = 3;
}
