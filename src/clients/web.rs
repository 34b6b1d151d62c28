//! Web Fetcher
//!
//! Pulls third-party API documentation pages for PM6 context. Only services
//! with a known docs URL are fetched; everything else is ignored.

use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;

use crate::constants::{investigation, network};
use crate::types::{Result, ResultExt};

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Documentation entry points for services the platform integrates with.
const KNOWN_API_DOCS: &[(&str, &str)] = &[
    ("stripe", "https://docs.stripe.com/api"),
    ("twilio", "https://www.twilio.com/docs/usage/api"),
    ("sendgrid", "https://www.twilio.com/docs/sendgrid/api-reference"),
    ("slack", "https://api.slack.com/web"),
    ("telegram", "https://core.telegram.org/bots/api"),
    ("anthropic", "https://docs.anthropic.com/en/api/messages"),
    ("openai", "https://platform.openai.com/docs/api-reference"),
    ("google maps", "https://developers.google.com/maps/documentation"),
    ("firebase", "https://firebase.google.com/docs/reference/rest"),
];

pub struct WebClient {
    client: Client,
}

impl WebClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(network::WEB_FETCH_TIMEOUT_SECS))
            .user_agent("pmpilot")
            .build()
            .with_service("web")?;
        Ok(Self { client })
    }

    /// Map requested integration names to known docs URLs, capped.
    pub fn identify_integrations(names: &[String]) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for name in names {
            let lowered = name.to_lowercase();
            if let Some((service, url)) = KNOWN_API_DOCS
                .iter()
                .find(|(service, _)| lowered.contains(service))
            {
                found.push((service.to_string(), url.to_string()));
            }
            if found.len() >= investigation::MAX_API_DOCS {
                break;
            }
        }
        found
    }

    /// Fetch a page and reduce it to readable text, capped at 5000 chars.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let html = self
            .client
            .get(url)
            .send()
            .await
            .with_service("web")?
            .text()
            .await
            .with_service("web")?;
        Ok(Self::html_to_text(&html))
    }

    fn html_to_text(html: &str) -> String {
        let no_scripts = SCRIPT_RE.replace_all(html, " ");
        let no_tags = TAG_RE.replace_all(&no_scripts, " ");
        let collapsed = WS_RE.replace_all(no_tags.trim(), " ");
        collapsed.chars().take(5000).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_integrations_matches_and_caps() {
        let names = vec![
            "Stripe payments".to_string(),
            "Slack notifications".to_string(),
            "Telegram".to_string(),
            "OpenAI embeddings".to_string(),
        ];
        let found = WebClient::identify_integrations(&names);
        assert_eq!(found.len(), investigation::MAX_API_DOCS);
        assert_eq!(found[0].0, "stripe");
    }

    #[test]
    fn test_identify_integrations_skips_unknown() {
        let names = vec!["homegrown billing".to_string()];
        assert!(WebClient::identify_integrations(&names).is_empty());
    }

    #[test]
    fn test_html_to_text_drops_scripts() {
        let html = "<html><script>var x = 1;</script><body><p>Real  content</p></body></html>";
        let text = WebClient::html_to_text(html);
        assert_eq!(text, "Real content");
    }
}
