// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON File State Store
//!
//! Keeps every entry in one JSON document. Each write rewrites the document to
//! a sibling temp file and renames it over the original, so a crash mid-write
//! leaves the previous version intact.
//!
//! **Limitations:**
//! - Single process only (no file locking)
//! - Whole-document rewrite per `put`; sized for tens of swarms, not thousands

use crate::domain::repository::{StateStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

pub struct FileStateStore {
    path: PathBuf,
    document: Mutex<StateDocument>,
}

impl FileStateStore {
    /// Open the document at `path`, creating parent directories as needed.
    /// A missing file starts an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Io(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: StateDocument = serde_json::from_slice(&bytes)?;
                if document.version != DOCUMENT_VERSION {
                    return Err(StoreError::Serialization(format!(
                        "Unsupported state document version {} in {}",
                        document.version,
                        path.display()
                    )));
                }
                info!(
                    "Loaded state document {} ({} entries)",
                    path.display(),
                    document.entries.len()
                );
                document
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("State document {} does not exist yet", path.display());
                StateDocument::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, document: &StateDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = match ttl {
            Some(ttl) => Some(
                now + chrono::Duration::from_std(ttl)
                    .map_err(|e| StoreError::Serialization(format!("TTL out of range: {}", e)))?,
            ),
            None => None,
        };

        let mut document = self.document.lock().await;
        document.entries.retain(|_, entry| entry.is_live(now));
        document
            .entries
            .insert(key.to_string(), StoredEntry { value, expires_at });
        self.flush(&document).await
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let now = Utc::now();
        let document = self.document.lock().await;
        Ok(document
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Utc::now();
        let document = self.document.lock().await;
        Ok(document
            .entries
            .iter()
            .filter(|(k, entry)| k.starts_with(prefix) && entry.is_live(now))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let store = FileStateStore::open(&path).await.unwrap();
            store.put("swarm/a/state", json!({"status": "active"}), None).await.unwrap();
            store.put("swarm/b/state", json!({"status": "spawning"}), None).await.unwrap();
        }

        let reopened = FileStateStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("swarm/a/state").await.unwrap(),
            Some(json!({"status": "active"}))
        );
        assert_eq!(reopened.list("swarm/").await.unwrap().len(), 2);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_expired_entries_are_hidden_and_pruned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStateStore::open(&path).await.unwrap();

        store
            .put("swarm/old/state", json!(1), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("swarm/old/state").await.unwrap(), None);
        assert!(store.list("swarm/").await.unwrap().is_empty());

        store.put("swarm/new/state", json!(2), None).await.unwrap();
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!raw.contains("swarm/old/state"));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(
            FileStateStore::open(&path).await,
            Err(StoreError::Serialization(_))
        ));
    }
}
