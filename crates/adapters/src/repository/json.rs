//! JSON file identity repository

use async_trait::async_trait;
use crosspost_domain::{PostId, PostIdCollection, PostIdRepository, RepositoryError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{RecordSet, StoredDocument};

/// Repository persisted as one pretty-printed JSON document, rewritten on every change
pub struct JsonFileRepository {
    path: PathBuf,
    records: Mutex<RecordSet>,
}

impl JsonFileRepository {
    /// Load the store at `path`
    ///
    /// A missing or unparseable file yields an empty store; any other read
    /// failure is returned.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<StoredDocument>(&content) {
                Ok(document) => RecordSet::from_document(document),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Storage file is not valid JSON, starting empty"
                    );
                    RecordSet::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Storage file not found, starting empty");
                RecordSet::default()
            }
            Err(e) => {
                return Err(RepositoryError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::debug!(path = %path.display(), records = records.len(), "Loaded storage");

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-system record counts, in first-seen order
    pub async fn system_counts(&self) -> Vec<(String, usize)> {
        self.records.lock().await.system_counts()
    }

    async fn persist(&self, records: &RecordSet) -> Result<(), RepositoryError> {
        let json = serde_json::to_string_pretty(&records.to_document())
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RepositoryError::Io(format!("Failed to create directory: {}", e))
            })?;
        }

        // Write then rename so a crash never leaves a truncated store
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| RepositoryError::Io(format!("Failed to write {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| RepositoryError::Io(format!("Failed to replace {}: {}", self.path.display(), e)))?;

        Ok(())
    }
}

#[async_trait]
impl PostIdRepository for JsonFileRepository {
    async fn find(&self, id: &PostId) -> Result<Option<PostIdCollection>, RepositoryError> {
        Ok(self.records.lock().await.find(id).cloned())
    }

    async fn add_collection(
        &self,
        criteria_id: &PostId,
        new_ids: &PostIdCollection,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        records.add_collection(criteria_id, new_ids);
        self.persist(&records).await
    }

    async fn record_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.records.lock().await.len())
    }
}
