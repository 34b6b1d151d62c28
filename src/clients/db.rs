//! Schema Discovery
//!
//! Read-only MySQL introspection feeding prototype mock data and technical
//! plans. The whole client is optional: an empty URL disables it and the
//! stages fall back to a placeholder.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::constants::schema;
use crate::types::{Result, ResultExt};

pub const SCHEMA_UNAVAILABLE: &str = "(database schema unavailable)";

pub struct DbClient {
    pool: MySqlPool,
}

impl DbClient {
    /// Connect lazily. `None` when no URL is configured.
    pub async fn connect(config: &DatabaseConfig) -> Result<Option<Self>> {
        if config.url.trim().is_empty() {
            debug!("no database URL configured, schema discovery disabled");
            return Ok(None);
        }
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .with_service("mysql")?;
        Ok(Some(Self { pool }))
    }

    /// Tables whose names contain any keyword, described column by column.
    /// Output format per table: `name: col (TYPE PK), col (TYPE), ...`
    pub async fn schema_context(&self, keywords: &[String]) -> Result<String> {
        let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

        let rows = sqlx::query("SHOW TABLES")
            .fetch_all(&self.pool)
            .await
            .with_service("mysql")?;
        let mut tables: Vec<String> = rows
            .iter()
            .filter_map(|r| r.try_get::<String, _>(0).ok())
            .filter(|t| {
                let name = t.to_lowercase();
                lowered.iter().any(|k| !k.is_empty() && name.contains(k))
            })
            .collect();
        tables.sort();
        tables.truncate(schema::MAX_TABLES);

        let mut lines = Vec::with_capacity(tables.len());
        for table in &tables {
            lines.push(format!("{}: {}", table, self.describe(table).await?));
        }
        Ok(lines.join("\n"))
    }

    async fn describe(&self, table: &str) -> Result<String> {
        // Table names come from SHOW TABLES, not user input
        let rows = sqlx::query(&format!("DESCRIBE `{}`", table))
            .fetch_all(&self.pool)
            .await
            .with_service("mysql")?;
        let cols: Vec<String> = rows
            .iter()
            .filter_map(|r| {
                let field: String = r.try_get("Field").ok()?;
                let col_type: String = r.try_get("Type").ok()?;
                let key: String = r.try_get("Key").unwrap_or_default();
                if key == "PRI" {
                    Some(format!("{} ({} PK)", field, col_type))
                } else {
                    Some(format!("{} ({})", field, col_type))
                }
            })
            .collect();
        Ok(cols.join(", "))
    }
}

/// Schema context through an optional client, with the placeholder fallback.
pub async fn schema_or_placeholder(db: Option<&DbClient>, keywords: &[String]) -> String {
    match db {
        Some(db) => db
            .schema_context(keywords)
            .await
            .unwrap_or_else(|_| SCHEMA_UNAVAILABLE.to_string()),
        None => SCHEMA_UNAVAILABLE.to_string(),
    }
}
