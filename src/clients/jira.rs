//! Jira Client
//!
//! REST v3 for issues and comments, Agile v1.0 for boards, sprints, and
//! backlog moves. Descriptions and comments go over the wire as ADF.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::config::JiraConfig;
use crate::constants::network;
use crate::convert::{adf_doc, adf_to_text, markdown_to_adf};
use crate::types::{PmError, Result, ResultExt};

/// A board sprint as returned by the Agile API.
#[derive(Debug, Clone)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub start_date: Option<String>,
}

pub struct JiraClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: SecretString,
    pub config: JiraConfig,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .finish()
    }
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(network::DEFAULT_TIMEOUT_SECS))
            .build()
            .with_service("jira")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: SecretString::from(config.api_token.clone()),
            config: config.clone(),
        })
    }

    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(PmError::external(
                "jira",
                format!("{} failed ({}): {}", what, status, detail),
            ))
        }
    }

    // =========================================================================
    // Issues
    // =========================================================================

    /// Create an issue and return its key. `extra_fields` merges into the
    /// fields object for custom fields such as story points or epic color.
    pub async fn create_issue(
        &self,
        project: &str,
        issue_type: &str,
        summary: &str,
        description: Value,
        extra_fields: Value,
    ) -> Result<String> {
        let mut fields = json!({
            "project": { "key": project },
            "issuetype": { "name": issue_type },
            "summary": summary,
            "description": description,
        });
        if let (Some(base), Some(extra)) = (fields.as_object_mut(), extra_fields.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }

        let response = self
            .request(reqwest::Method::POST, "/rest/api/3/issue")
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .with_service("jira")?;
        let body: Value = Self::check(response, "create issue")
            .await?
            .json()
            .await
            .with_service("jira")?;
        let key = body["key"]
            .as_str()
            .ok_or_else(|| PmError::external("jira", "create issue response missing key"))?
            .to_string();
        debug!(%key, project, issue_type, "created issue");
        Ok(key)
    }

    pub async fn get_issue(&self, key: &str, fields: Option<&str>) -> Result<Value> {
        let mut req = self.request(
            reqwest::Method::GET,
            &format!("/rest/api/3/issue/{}", key),
        );
        if let Some(fields) = fields {
            req = req.query(&[("fields", fields)]);
        }
        let response = req.send().await.with_service("jira")?;
        Self::check(response, "get issue")
            .await?
            .json()
            .await
            .with_service("jira")
    }

    /// Issue description flattened to plain text.
    pub async fn get_description_text(&self, key: &str) -> Result<String> {
        let issue = self.get_issue(key, Some("description")).await?;
        Ok(adf_to_text(&issue["fields"]["description"]))
    }

    /// Partial field update. Jira answers 204 on success.
    pub async fn update_fields(&self, key: &str, fields: Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/rest/api/3/issue/{}", key))
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "update issue").await?;
        Ok(())
    }

    pub async fn assign(&self, key: &str, account_id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/rest/api/3/issue/{}/assignee", key),
            )
            .json(&json!({ "accountId": account_id }))
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "assign issue").await?;
        Ok(())
    }

    pub async fn transition(&self, key: &str, transition_id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/rest/api/3/issue/{}/transitions", key),
            )
            .json(&json!({ "transition": { "id": transition_id } }))
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "transition issue").await?;
        Ok(())
    }

    pub async fn search(&self, jql: &str, fields: &str) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::GET, "/rest/api/3/search")
            .query(&[("jql", jql), ("fields", fields), ("maxResults", "100")])
            .send()
            .await
            .with_service("jira")?;
        let body: Value = Self::check(response, "search")
            .await?
            .json()
            .await
            .with_service("jira")?;
        Ok(body["issues"].as_array().cloned().unwrap_or_default())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Add a comment, body given as markdown.
    pub async fn add_comment(&self, key: &str, markdown: &str) -> Result<()> {
        self.add_comment_adf(key, adf_doc(markdown_to_adf(markdown)))
            .await
    }

    pub async fn add_comment_adf(&self, key: &str, body: Value) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/rest/api/3/issue/{}/comment", key),
            )
            .json(&json!({ "body": body }))
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "add comment").await?;
        Ok(())
    }

    /// All comments as (id, plain text) pairs, oldest first.
    pub async fn get_comments(&self, key: &str) -> Result<Vec<(String, String)>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/rest/api/3/issue/{}/comment", key),
            )
            .query(&[("maxResults", "100")])
            .send()
            .await
            .with_service("jira")?;
        let body: Value = Self::check(response, "get comments")
            .await?
            .json()
            .await
            .with_service("jira")?;
        let comments = body["comments"].as_array().cloned().unwrap_or_default();
        Ok(comments
            .iter()
            .filter_map(|c| {
                let id = c["id"].as_str()?.to_string();
                Some((id, adf_to_text(&c["body"])))
            })
            .collect())
    }

    pub async fn delete_comment(&self, key: &str, comment_id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/rest/api/3/issue/{}/comment/{}", key, comment_id),
            )
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "delete comment").await?;
        Ok(())
    }

    // =========================================================================
    // Agile: board, sprints, backlog
    // =========================================================================

    /// Active and future sprints on the configured board.
    pub async fn board_sprints(&self) -> Result<Vec<Sprint>> {
        let mut sprints = Vec::new();
        let mut start_at = 0u64;
        loop {
            let response = self
                .request(
                    reqwest::Method::GET,
                    &format!("/rest/agile/1.0/board/{}/sprint", self.config.board_id),
                )
                .query(&[
                    ("state", "active,future".to_string()),
                    ("startAt", start_at.to_string()),
                ])
                .send()
                .await
                .with_service("jira")?;
            let body: Value = Self::check(response, "board sprints")
                .await?
                .json()
                .await
                .with_service("jira")?;

            let values = body["values"].as_array().cloned().unwrap_or_default();
            let page_len = values.len() as u64;
            for v in values {
                if let (Some(id), Some(name)) = (v["id"].as_u64(), v["name"].as_str()) {
                    sprints.push(Sprint {
                        id,
                        name: name.to_string(),
                        state: v["state"].as_str().unwrap_or_default().to_string(),
                        start_date: v["startDate"].as_str().map(str::to_string),
                    });
                }
            }
            if body["isLast"].as_bool().unwrap_or(true) || page_len == 0 {
                break;
            }
            start_at += page_len;
        }
        Ok(sprints)
    }

    pub async fn move_to_sprint(&self, sprint_id: u64, keys: &[String]) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/rest/agile/1.0/sprint/{}/issue", sprint_id),
            )
            .json(&json!({ "issues": keys }))
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "move to sprint").await?;
        Ok(())
    }

    pub async fn move_to_backlog(&self, keys: &[String]) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/rest/agile/1.0/backlog/issue")
            .json(&json!({ "issues": keys }))
            .send()
            .await
            .with_service("jira")?;
        Self::check(response, "move to backlog").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> JiraClient {
        let mut cfg = JiraConfig::default();
        cfg.base_url = "https://example.atlassian.net/".into();
        cfg.email = "pm@example.com".into();
        cfg.api_token = "t".into();
        JiraClient::new(&cfg).unwrap()
    }

    #[test]
    fn test_browse_url_strips_trailing_slash() {
        assert_eq!(
            client().browse_url("AX-12"),
            "https://example.atlassian.net/browse/AX-12"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let repr = format!("{:?}", client());
        assert!(!repr.contains("api_token"));
        assert!(repr.contains("example.atlassian.net"));
    }
}
