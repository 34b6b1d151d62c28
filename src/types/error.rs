//! Error Types
//!
//! Unified error type for the whole pipeline plus a crate-wide `Result`
//! alias. Errors fall into four domain categories: configuration problems
//! (fatal at startup), external service failures (surfaced to the chat),
//! generation failures (AI output that failed schema parsing), and stale
//! references (decisions arriving for an entry that was already consumed).

use thiserror::Error;

/// Unified error type
#[derive(Error, Debug)]
pub enum PmError {
    /// Missing or invalid configuration. Fatal during preflight.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A third-party call failed (non-success status, transport error).
    #[error("{service} error: {message}")]
    External { service: String, message: String },

    /// AI output could not be parsed into the expected shape.
    #[error("Generation failed at {stage}: {message}")]
    Generation { stage: String, message: String },

    /// Decision referenced a pending entry or parked item that no longer exists.
    #[error("Stale reference: {0}")]
    Stale(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database errors
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    /// URL parse errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl PmError {
    /// Build an external-service error from a non-success HTTP response.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::External {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Build a generation error for a stage. The raw response stays out of
    /// the user-visible message; callers log it at debug level.
    pub fn generation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// True when the error should be reported as "already processed or expired".
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Result type alias using PmError
pub type Result<T> = std::result::Result<T, PmError>;

/// Extension trait for adding service context to foreign errors
pub trait ResultExt<T> {
    /// Wrap the error in the external-service category.
    fn with_service(self, service: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn with_service(self, service: &str) -> Result<T> {
        self.map_err(|e| PmError::external(service, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PmError::Config("missing api token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing api token");

        let err = PmError::external("Jira", "404 issue not found");
        assert_eq!(err.to_string(), "Jira error: 404 issue not found");

        let err = PmError::generation("pm2", "response was not valid JSON");
        assert_eq!(
            err.to_string(),
            "Generation failed at pm2: response was not valid JSON"
        );
    }

    #[test]
    fn test_generation_from_stage_tag() {
        let err = PmError::generation(crate::types::Stage::Tasks.tag(), "empty task breakdown");
        assert_eq!(
            err.to_string(),
            "Generation failed at pm5: empty task breakdown"
        );
    }

    #[test]
    fn test_is_stale() {
        assert!(PmError::Stale("AR-1".into()).is_stale());
        assert!(!PmError::Config("x".into()).is_stale());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PmError = json_err.into();
        assert!(matches!(err, PmError::Json(_)));
    }

    #[test]
    fn test_with_service_context() {
        let r: std::result::Result<(), String> = Err("connection reset".to_string());
        let err = r.with_service("Confluence").unwrap_err();
        assert_eq!(err.to_string(), "Confluence error: connection reset");
    }
}
