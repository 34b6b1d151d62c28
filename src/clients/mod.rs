//! External Service Clients
//!
//! One client per upstream: Jira, Confluence, GitHub, MySQL schema
//! discovery, and documentation fetching. All HTTP goes through reqwest
//! with credentials held as `SecretString`.

pub mod confluence;
pub mod db;
pub mod github;
pub mod jira;
pub mod web;

pub use confluence::{ConfluenceClient, DESIGN_SYSTEM_FALLBACK, PageBody};
pub use db::{DbClient, SCHEMA_UNAVAILABLE, schema_or_placeholder};
pub use github::{GithubClient, RepoFile};
pub use jira::{JiraClient, Sprint};
pub use web::WebClient;
