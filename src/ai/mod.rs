//! Generation Client
//!
//! Thin client for the Anthropic Messages API plus the output-shaping
//! helpers every stage relies on: code-fence stripping and strict JSON
//! extraction into typed structs.

pub mod prompts;

use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::config::AnthropicConfig;
use crate::constants::claude;
use crate::types::{PmError, Result, ResultExt, Stage};

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?:json)?\s*").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API client.
pub struct ClaudeClient {
    client: Client,
    api_key: SecretString,
    model: String,
    pub default_max_tokens: u32,
}

impl std::fmt::Debug for ClaudeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeClient")
            .field("model", &self.model)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

impl ClaudeClient {
    pub fn new(config: &AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .with_service("anthropic")?;
        Ok(Self {
            client,
            api_key: SecretString::from(config.api_key.clone()),
            model: config.model.clone(),
            default_max_tokens: config.max_tokens,
        })
    }

    /// Send a single-turn user prompt and return the text of the first
    /// content block.
    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        debug!(model = %self.model, max_tokens, prompt_len = prompt.len(), "generation request");

        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(claude::MESSAGES_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", claude::API_VERSION)
            .json(&body)
            .send()
            .await
            .with_service("anthropic")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PmError::external(
                "anthropic",
                format!("messages API returned {}: {}", status, detail),
            ));
        }

        let parsed: MessagesResponse = response.json().await.with_service("anthropic")?;
        let text = parsed
            .content
            .first()
            .map(|b| b.text.clone())
            .ok_or_else(|| PmError::external("anthropic", "empty response content"))?;
        Ok(text)
    }

    /// `generate` followed by strict JSON extraction into `T`.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        max_tokens: u32,
        stage: Stage,
    ) -> Result<T> {
        let raw = self.generate(prompt, max_tokens).await?;
        extract_json(&raw, stage)
    }
}

/// Strip a surrounding markdown code fence from a whole response.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let opened = FENCE_OPEN.replace(trimmed, "");
    FENCE_CLOSE.replace(&opened, "").into_owned()
}

/// Strip fence lines from generated HTML: drop the first line when it opens
/// a fence, drop the last line when it closes one. The body is left intact
/// even if it happens to contain backticks.
pub fn strip_fence_lines(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.trim().lines().collect();
    if lines.first().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n")
}

/// Parse a model response as JSON of type `T`. Tolerates a code fence and
/// prose around the object by slicing from the first `{` to the last `}`.
pub fn extract_json<T: DeserializeOwned>(raw: &str, stage: Stage) -> Result<T> {
    let cleaned = strip_fences(raw);
    let sliced = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => {
            return Err(PmError::generation(
                stage.tag(),
                format!("response contains no JSON object: {}", preview(&cleaned)),
            ));
        }
    };
    serde_json::from_str(sliced).map_err(|e| {
        PmError::generation(stage.tag(), format!("invalid JSON ({}): {}", e, preview(sliced)))
    })
}

fn preview(s: &str) -> String {
    let mut p: String = s.chars().take(200).collect();
    if s.chars().count() > 200 {
        p.push('…');
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EpicContent;

    #[test]
    fn test_strip_fences_json() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_lines_html() {
        let raw = "```html\n<!DOCTYPE html>\n<p>hi ``` there</p>\n```";
        assert_eq!(
            strip_fence_lines(raw),
            "<!DOCTYPE html>\n<p>hi ``` there</p>"
        );
        assert_eq!(strip_fence_lines("<html></html>"), "<html></html>");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let raw = "Here is the epic:\n```json\n{\"epic_title\": \"T\", \"epic_summary\": \"S\"}\n```\nDone.";
        let epic: EpicContent = extract_json(raw, Stage::Epic).unwrap();
        assert_eq!(epic.epic_title, "T");
        assert_eq!(epic.epic_summary, "S");
    }

    #[test]
    fn test_extract_json_no_object() {
        let err = extract_json::<EpicContent>("sorry, I cannot", Stage::Epic).unwrap_err();
        assert!(matches!(err, PmError::Generation { .. }));
        assert!(err.to_string().contains("pm4"));
    }

    #[test]
    fn test_extract_json_invalid() {
        let err = extract_json::<EpicContent>("{\"epic_title\": }", Stage::Epic).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}
