//! Confluence Client
//!
//! Pages API v2 on the same Atlassian site as Jira. PRD pages are written
//! in wiki markup; reads come back as storage HTML and get flattened to
//! text for prompts.

use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ConfluenceConfig, JiraConfig};
use crate::constants::network;
use crate::types::{PmError, Result, ResultExt};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Fallback design guidance when the design-system KB page is unreachable.
pub const DESIGN_SYSTEM_FALLBACK: &str =
    "(Design system unavailable. Use Tailwind defaults with orange #D34108 as primary.)";

/// A page's editable state, used for read-modify-write updates.
#[derive(Debug, Clone)]
pub struct PageBody {
    pub title: String,
    pub storage: String,
    pub version: i64,
}

pub struct ConfluenceClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: SecretString,
    pub config: ConfluenceConfig,
}

impl std::fmt::Debug for ConfluenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluenceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ConfluenceClient {
    /// Shares the Atlassian site and credentials with Jira.
    pub fn new(jira: &JiraConfig, config: &ConfluenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(network::DEFAULT_TIMEOUT_SECS))
            .build()
            .with_service("confluence")?;
        Ok(Self {
            client,
            base_url: jira.base_url.trim_end_matches('/').to_string(),
            email: jira.email.clone(),
            api_token: SecretString::from(jira.api_token.clone()),
            config: config.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/wiki{}", self.base_url, path))
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(PmError::external(
                "confluence",
                format!("{} failed ({}): {}", what, status, detail),
            ))
        }
    }

    /// Create a page under the PRD parent. Returns (page id, full web URL).
    pub async fn create_page(&self, title: &str, wiki_body: &str) -> Result<(String, String)> {
        let payload = json!({
            "spaceId": self.config.space_id,
            "parentId": self.config.prd_parent_id,
            "status": "current",
            "title": title,
            "body": { "representation": "wiki", "value": wiki_body },
        });
        let response = self
            .request(reqwest::Method::POST, "/api/v2/pages")
            .json(&payload)
            .send()
            .await
            .with_service("confluence")?;
        let body: Value = Self::check(response, "create page")
            .await?
            .json()
            .await
            .with_service("confluence")?;

        let id = page_id_str(&body["id"])
            .ok_or_else(|| PmError::external("confluence", "create page response missing id"))?;
        let webui = body["_links"]["webui"].as_str().unwrap_or_default();
        let web_url = format!("{}/wiki{}", self.base_url, webui);
        debug!(page_id = %id, "created page");
        Ok((id, web_url))
    }

    /// Page body in storage representation plus the current version number.
    pub async fn get_page(&self, page_id: &str) -> Result<PageBody> {
        let response = self
            .request(reqwest::Method::GET, &format!("/api/v2/pages/{}", page_id))
            .query(&[("body-format", "storage")])
            .send()
            .await
            .with_service("confluence")?;
        let body: Value = Self::check(response, "get page")
            .await?
            .json()
            .await
            .with_service("confluence")?;
        Ok(PageBody {
            title: body["title"].as_str().unwrap_or_default().to_string(),
            storage: body["body"]["storage"]["value"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            version: body["version"]["number"].as_i64().unwrap_or(1),
        })
    }

    /// Page content flattened to plain text for prompt context.
    pub async fn get_page_text(&self, page_id: &str) -> Result<String> {
        let page = self.get_page(page_id).await?;
        Ok(storage_to_text(&page.storage))
    }

    /// Replace a page body, bumping the version.
    pub async fn update_page(&self, page_id: &str, page: &PageBody) -> Result<()> {
        let payload = json!({
            "id": page_id,
            "status": "current",
            "title": page.title,
            "body": { "representation": "storage", "value": page.storage },
            "version": { "number": page.version + 1 },
        });
        let response = self
            .request(reqwest::Method::PUT, &format!("/api/v2/pages/{}", page_id))
            .json(&payload)
            .send()
            .await
            .with_service("confluence")?;
        Self::check(response, "update page").await?;
        Ok(())
    }

    /// Replace a page body with fresh wiki markup, bumping the version.
    pub async fn update_page_wiki(
        &self,
        page_id: &str,
        title: &str,
        wiki_body: &str,
        current_version: i64,
    ) -> Result<()> {
        let payload = json!({
            "id": page_id,
            "status": "current",
            "title": title,
            "body": { "representation": "wiki", "value": wiki_body },
            "version": { "number": current_version + 1 },
        });
        let response = self
            .request(reqwest::Method::PUT, &format!("/api/v2/pages/{}", page_id))
            .json(&payload)
            .send()
            .await
            .with_service("confluence")?;
        Self::check(response, "update page").await?;
        Ok(())
    }

    pub async fn delete_page(&self, page_id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v2/pages/{}", page_id),
            )
            .send()
            .await
            .with_service("confluence")?;
        Self::check(response, "delete page").await?;
        Ok(())
    }

    // =========================================================================
    // Knowledge base
    // =========================================================================

    /// Concatenated text of every configured KB page. Pages that fail to
    /// load are skipped with a warning rather than failing the stage.
    pub async fn kb_context(&self) -> String {
        let mut sections = Vec::new();
        for (name, page_id) in &self.config.kb_pages {
            match self.get_page_text(page_id).await {
                Ok(text) if !text.trim().is_empty() => {
                    sections.push(format!("### {}\n{}", name, text.trim()));
                }
                Ok(_) => {}
                Err(e) => warn!(kb = %name, error = %e, "KB page unavailable, skipping"),
            }
        }
        sections.join("\n\n")
    }

    /// Design-system page text, or a usable fallback.
    pub async fn design_system_text(&self) -> String {
        let Some(page_id) = self.config.kb_pages.get(&self.config.design_system_key) else {
            return DESIGN_SYSTEM_FALLBACK.to_string();
        };
        match self.get_page_text(page_id).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => DESIGN_SYSTEM_FALLBACK.to_string(),
            Err(e) => {
                warn!(error = %e, "design system page unavailable");
                DESIGN_SYSTEM_FALLBACK.to_string()
            }
        }
    }
}

fn page_id_str(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flatten storage-format HTML to plain text.
pub fn storage_to_text(storage: &str) -> String {
    let with_breaks = storage
        .replace("</p>", "\n")
        .replace("</h1>", "\n")
        .replace("</h2>", "\n")
        .replace("</h3>", "\n")
        .replace("</li>", "\n")
        .replace("</tr>", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, " ");
    let collapsed = WS_RE.replace_all(&stripped, " ");
    collapsed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_to_text_strips_tags() {
        let html = "<h1>Title</h1><p>Some <strong>bold</strong> text.</p><ul><li>one</li><li>two</li></ul>";
        let text = storage_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("Some bold text."));
        assert!(text.contains("one"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_storage_to_text_collapses_whitespace() {
        let text = storage_to_text("<p>a    b</p>\n\n\n<p>c</p>");
        assert_eq!(text, "a b\nc");
    }

    #[test]
    fn test_page_id_accepts_number_or_string() {
        assert_eq!(page_id_str(&json!("123")), Some("123".to_string()));
        assert_eq!(page_id_str(&json!(123)), Some("123".to_string()));
        assert_eq!(page_id_str(&json!(null)), None);
    }
}
