//! Park/Resume Store
//!
//! A parked item survives restarts as a marker comment on its Jira issue.
//! The GitHub index file only exists so `/pending` can list parked keys
//! without a JQL sweep: the index is a cache, the comment is the source of
//! truth, and stale index keys are pruned whenever the two disagree.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clients::{GithubClient, JiraClient};
use crate::constants::park;
use crate::types::{PmError, Result};

/// A parked pipeline item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkedRecord {
    pub issue_key: String,
    pub summary: String,
    /// Stage tag, kept as a string so an unknown tag from an older or newer
    /// deployment lists and round-trips instead of failing.
    pub stage: String,
    /// Minimal per-stage projection of what cannot be re-fetched live.
    pub data: Value,
}

/// Index file body: issue key to stage tag and summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParkIndex {
    #[serde(default)]
    pub items: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub stage: String,
    pub summary: String,
}

/// Serialize a record into its marker comment body.
pub fn marker_text(record: &ParkedRecord) -> Result<String> {
    let payload = serde_json::to_string(&serde_json::json!({
        "summary": record.summary,
        "data": record.data,
    }))?;
    Ok(format!(
        "{}:{}:{}",
        park::MARKER_PREFIX,
        record.stage,
        payload
    ))
}

/// Parse a marker comment body back into a record. Splits on the first two
/// colons only; the JSON payload is free to contain more.
pub fn parse_marker(issue_key: &str, text: &str) -> Option<ParkedRecord> {
    let start = text.find(park::MARKER_PREFIX)?;
    let rest = text[start + park::MARKER_PREFIX.len()..].strip_prefix(':')?;
    let (stage, payload) = rest.split_once(':')?;
    let parsed: Value = serde_json::from_str(payload.trim()).ok()?;
    Some(ParkedRecord {
        issue_key: issue_key.to_string(),
        summary: parsed["summary"].as_str().unwrap_or_default().to_string(),
        stage: stage.trim().to_string(),
        data: parsed["data"].clone(),
    })
}

// =============================================================================
// Trait seams
// =============================================================================

/// Marker comments on the tracker issue. The durable half of parking.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn write_marker(&self, record: &ParkedRecord) -> Result<()>;
    /// Find the marker on an issue, returning the comment id alongside.
    async fn read_marker(&self, issue_key: &str) -> Result<Option<(String, ParkedRecord)>>;
    async fn remove_marker(&self, issue_key: &str, comment_id: &str) -> Result<()>;
}

/// The listing index. A cache over the markers.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Index plus an opaque write token (content sha) for optimistic writes.
    async fn load_index(&self) -> Result<(ParkIndex, Option<String>)>;
    async fn save_index(&self, index: &ParkIndex, token: Option<&str>) -> Result<()>;
}

#[async_trait]
impl MarkerStore for JiraClient {
    async fn write_marker(&self, record: &ParkedRecord) -> Result<()> {
        // Single raw text node: the payload must survive text extraction
        // byte for byte, so it never goes through the markdown converter.
        let body = crate::convert::adf_doc(vec![serde_json::json!({
            "type": "paragraph",
            "content": [{ "type": "text", "text": marker_text(record)? }],
        })]);
        self.add_comment_adf(&record.issue_key, body).await
    }

    async fn read_marker(&self, issue_key: &str) -> Result<Option<(String, ParkedRecord)>> {
        let comments = self.get_comments(issue_key).await?;
        // Last marker wins if the issue somehow carries several
        Ok(comments
            .iter()
            .rev()
            .find_map(|(id, text)| parse_marker(issue_key, text).map(|r| (id.clone(), r))))
    }

    async fn remove_marker(&self, issue_key: &str, comment_id: &str) -> Result<()> {
        self.delete_comment(issue_key, comment_id).await
    }
}

#[async_trait]
impl IndexStore for GithubClient {
    async fn load_index(&self) -> Result<(ParkIndex, Option<String>)> {
        match self
            .get_file(&self.config.prototypes_repo, &self.config.park_index_path)
            .await?
        {
            Some(file) => {
                let index: ParkIndex = serde_json::from_str(&file.content).unwrap_or_else(|e| {
                    warn!(error = %e, "park index unreadable, starting fresh");
                    ParkIndex::default()
                });
                Ok((index, Some(file.sha)))
            }
            None => Ok((ParkIndex::default(), None)),
        }
    }

    async fn save_index(&self, index: &ParkIndex, token: Option<&str>) -> Result<()> {
        let content = serde_json::to_string_pretty(index)?;
        self.put_file(
            &self.config.prototypes_repo,
            &self.config.park_index_path,
            &content,
            "Update parked items index",
            token,
        )
        .await
    }
}

// =============================================================================
// Store
// =============================================================================

pub struct ParkStore {
    marker: Arc<dyn MarkerStore>,
    index: Arc<dyn IndexStore>,
}

impl ParkStore {
    pub fn new(marker: Arc<dyn MarkerStore>, index: Arc<dyn IndexStore>) -> Self {
        Self { marker, index }
    }

    /// Park an item: marker first, then index upsert. The index write is an
    /// unlocked read-modify-write; a concurrent park can lose the race and
    /// drop one listing until the next reconcile.
    pub async fn park(&self, record: &ParkedRecord) -> Result<()> {
        self.marker.write_marker(record).await?;
        let (mut index, token) = self.index.load_index().await?;
        index.items.insert(
            record.issue_key.clone(),
            IndexEntry {
                stage: record.stage.clone(),
                summary: record.summary.clone(),
            },
        );
        self.index.save_index(&index, token.as_deref()).await?;
        debug!(key = %record.issue_key, stage = %record.stage, "parked");
        Ok(())
    }

    /// All currently parked records, verified against their markers. Index
    /// keys whose marker is gone are pruned during the call.
    pub async fn list_parked(&self) -> Result<Vec<ParkedRecord>> {
        let (mut index, token) = self.index.load_index().await?;
        let mut records = Vec::new();
        let mut stale: Vec<String> = Vec::new();

        for key in index.items.keys() {
            match self.marker.read_marker(key).await? {
                Some((_, record)) => records.push(record),
                None => {
                    warn!(%key, "index entry without marker, pruning");
                    stale.push(key.clone());
                }
            }
        }

        if !stale.is_empty() {
            for key in &stale {
                index.items.remove(key);
            }
            self.index.save_index(&index, token.as_deref()).await?;
        }
        Ok(records)
    }

    /// Remove a parked item and return its record. A missing marker is a
    /// stale reference, not an error path of its own.
    pub async fn unpark(&self, issue_key: &str) -> Result<ParkedRecord> {
        let Some((comment_id, record)) = self.marker.read_marker(issue_key).await? else {
            // Drop any leftover index entry so the listing converges
            let (mut index, token) = self.index.load_index().await?;
            if index.items.remove(issue_key).is_some() {
                self.index.save_index(&index, token.as_deref()).await?;
            }
            return Err(PmError::Stale(format!(
                "{} is not parked (already resumed?)",
                issue_key
            )));
        };

        self.marker.remove_marker(issue_key, &comment_id).await?;
        let (mut index, token) = self.index.load_index().await?;
        if index.items.remove(issue_key).is_some() {
            self.index.save_index(&index, token.as_deref()).await?;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMarkers {
        // issue key -> (comment id, marker text)
        comments: Mutex<BTreeMap<String, (String, String)>>,
    }

    #[async_trait]
    impl MarkerStore for FakeMarkers {
        async fn write_marker(&self, record: &ParkedRecord) -> Result<()> {
            let text = marker_text(record)?;
            self.comments
                .lock()
                .unwrap()
                .insert(record.issue_key.clone(), ("c1".to_string(), text));
            Ok(())
        }

        async fn read_marker(&self, issue_key: &str) -> Result<Option<(String, ParkedRecord)>> {
            Ok(self
                .comments
                .lock()
                .unwrap()
                .get(issue_key)
                .and_then(|(id, text)| parse_marker(issue_key, text).map(|r| (id.clone(), r))))
        }

        async fn remove_marker(&self, issue_key: &str, _comment_id: &str) -> Result<()> {
            self.comments.lock().unwrap().remove(issue_key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        index: Mutex<ParkIndex>,
    }

    #[async_trait]
    impl IndexStore for FakeIndex {
        async fn load_index(&self) -> Result<(ParkIndex, Option<String>)> {
            Ok((self.index.lock().unwrap().clone(), Some("sha".to_string())))
        }

        async fn save_index(&self, index: &ParkIndex, _token: Option<&str>) -> Result<()> {
            *self.index.lock().unwrap() = index.clone();
            Ok(())
        }
    }

    fn store() -> (ParkStore, Arc<FakeMarkers>, Arc<FakeIndex>) {
        let markers = Arc::new(FakeMarkers::default());
        let index = Arc::new(FakeIndex::default());
        (
            ParkStore::new(markers.clone(), index.clone()),
            markers,
            index,
        )
    }

    fn record(key: &str, stage: &str) -> ParkedRecord {
        ParkedRecord {
            issue_key: key.to_string(),
            summary: "Faster quotes".to_string(),
            stage: stage.to_string(),
            data: json!({ "page_id": "123", "web_url": "https://w/x" }),
        }
    }

    #[tokio::test]
    async fn test_park_then_list() {
        let (store, _, _) = store();
        store.park(&record("AR-1", "pm2")).await.unwrap();
        let listed = store.list_parked().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].issue_key, "AR-1");
        assert_eq!(listed[0].stage, "pm2");
    }

    #[tokio::test]
    async fn test_park_unpark_round_trip() {
        let (store, _, _) = store();
        let original = record("AR-2", "pm3");
        store.park(&original).await.unwrap();
        let resumed = store.unpark("AR-2").await.unwrap();
        assert_eq!(resumed, original);
        assert!(store.list_parked().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpark_missing_is_stale() {
        let (store, _, _) = store();
        let err = store.unpark("AR-9").await.unwrap_err();
        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn test_list_prunes_index_without_marker() {
        let (store, markers, _) = store();
        store.park(&record("AR-1", "pm2")).await.unwrap();
        store.park(&record("AR-2", "pm4")).await.unwrap();
        // Marker deleted out of band; index still lists the key
        markers.comments.lock().unwrap().remove("AR-1");

        let listed = store.list_parked().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].issue_key, "AR-2");
        // Prune persisted
        let again = store.list_parked().await.unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn test_unpark_prunes_stale_index_entry() {
        let (store, markers, index) = store();
        store.park(&record("AR-3", "pm2")).await.unwrap();
        markers.comments.lock().unwrap().remove("AR-3");

        assert!(store.unpark("AR-3").await.is_err());
        assert!(index.index.lock().unwrap().items.is_empty());
    }

    #[test]
    fn test_parse_marker_splits_first_two_colons() {
        let text = r#"PM_AGENT_PARKED:pm2:{"summary":"S: with colons","data":{"url":"https://a:1/b"}}"#;
        let record = parse_marker("AR-5", text).unwrap();
        assert_eq!(record.stage, "pm2");
        assert_eq!(record.summary, "S: with colons");
        assert_eq!(record.data["url"], "https://a:1/b");
    }

    #[test]
    fn test_parse_marker_rejects_other_comments() {
        assert!(parse_marker("AR-5", "just a normal comment").is_none());
        assert!(parse_marker("AR-5", "PM_AGENT_PARKED:pm2:not json").is_none());
    }

    #[test]
    fn test_parse_marker_unknown_stage_passes_through() {
        let text = r#"PM_AGENT_PARKED:pm99:{"summary":"S","data":{}}"#;
        assert_eq!(parse_marker("AR-5", text).unwrap().stage, "pm99");
    }

    proptest! {
        #[test]
        fn prop_marker_round_trip(
            summary in "[ -~]{0,60}",
            stage in "pm[1-7]",
            page_id in "[0-9]{1,9}",
        ) {
            let original = ParkedRecord {
                issue_key: "AR-10".to_string(),
                summary,
                stage,
                data: json!({ "page_id": page_id }),
            };
            let text = marker_text(&original).unwrap();
            let parsed = parse_marker("AR-10", &text).unwrap();
            prop_assert_eq!(parsed, original);
        }
    }
}
