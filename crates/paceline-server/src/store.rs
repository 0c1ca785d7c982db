//! Versioned history documents and their storage backends

use async_trait::async_trait;
use paceline_core::Repository;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no history for repository {0:?}")]
    NotFound(String),
    #[error("history document for {repo_id:?} is corrupt: {reason}")]
    Corrupt { repo_id: String, reason: String },
    #[error("repository id {0:?} contains unsupported characters")]
    InvalidRepoId(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Only I/O failures are worth retrying; everything else is a
    /// permanent answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

/// A repository's full history plus the CAS version token it was read at.
///
/// Serializes to the persisted document shape: the version counter and
/// `lastUpdate` stamp sit beside the flattened `repoUrl`/`entries` keys
/// that chart tooling consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    pub version: u64,
    /// Epoch millis of the last committed append
    pub last_update: i64,
    #[serde(flatten)]
    pub repository: Repository,
}

impl HistoryDocument {
    /// The state a repository starts from before its first commit.
    pub fn empty(repo_url: impl Into<String>) -> Self {
        Self {
            version: 0,
            last_update: 0,
            repository: Repository::new(repo_url),
        }
    }

    /// Canonical persisted byte form. Deterministic for a fixed state:
    /// suites serialize in sorted key order, measurements in submitted
    /// order, so downstream document diffs stay minimal.
    pub fn snapshot(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// Result of a compare-and-swap commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed { version: u64 },
    /// The stored version moved; `version` is what is there now.
    Conflict { version: u64 },
}

/// Durable home for repository histories.
///
/// `commit` is a compare-and-swap: it only applies when the stored version
/// still equals `expected_version`, and a successful commit is atomic as
/// observed by any `load`; readers never see a half-written document.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self, repo_id: &str) -> Result<HistoryDocument, StoreError>;

    async fn commit(
        &self,
        repo_id: &str,
        expected_version: u64,
        repository: Repository,
        last_update: i64,
    ) -> Result<CasOutcome, StoreError>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, HistoryDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load(&self, repo_id: &str) -> Result<HistoryDocument, StoreError> {
        let documents = self.documents.read().await;
        documents
            .get(repo_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(repo_id.to_string()))
    }

    async fn commit(
        &self,
        repo_id: &str,
        expected_version: u64,
        repository: Repository,
        last_update: i64,
    ) -> Result<CasOutcome, StoreError> {
        let mut documents = self.documents.write().await;
        let current = documents.get(repo_id).map(|doc| doc.version).unwrap_or(0);
        if current != expected_version {
            return Ok(CasOutcome::Conflict { version: current });
        }
        let version = expected_version + 1;
        documents.insert(
            repo_id.to_string(),
            HistoryDocument {
                version,
                last_update,
                repository,
            },
        );
        Ok(CasOutcome::Committed { version })
    }
}

/// File-backed store: one JSON document per repository under `data_dir`.
///
/// Writes land in a sibling `.tmp` file and are renamed into place, so a
/// reader sees either the old document or the new one, never a torn write.
/// The mutex serializes this process's read-check-write window; the
/// version field inside the document is what guards against writers in
/// other processes, whose stale commits fail the version check on reload.
pub struct FileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn document_path(&self, repo_id: &str) -> Result<PathBuf, StoreError> {
        if repo_id.is_empty()
            || repo_id.starts_with('.')
            || !repo_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(StoreError::InvalidRepoId(repo_id.to_string()));
        }
        Ok(self.data_dir.join(format!("{repo_id}.json")))
    }

    async fn read_document(
        &self,
        repo_id: &str,
        path: &Path,
    ) -> Result<Option<HistoryDocument>, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                repo_id: repo_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(document))
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    async fn load(&self, repo_id: &str) -> Result<HistoryDocument, StoreError> {
        let path = self.document_path(repo_id)?;
        self.read_document(repo_id, &path)
            .await?
            .ok_or_else(|| StoreError::NotFound(repo_id.to_string()))
    }

    async fn commit(
        &self,
        repo_id: &str,
        expected_version: u64,
        repository: Repository,
        last_update: i64,
    ) -> Result<CasOutcome, StoreError> {
        let path = self.document_path(repo_id)?;
        let _guard = self.write_lock.lock().await;

        let current = self
            .read_document(repo_id, &path)
            .await?
            .map(|doc| doc.version)
            .unwrap_or(0);
        if current != expected_version {
            return Ok(CasOutcome::Conflict { version: current });
        }

        let version = expected_version + 1;
        let document = HistoryDocument {
            version,
            last_update,
            repository,
        };
        let bytes = document.snapshot().map_err(|e| StoreError::Corrupt {
            repo_id: repo_id.to_string(),
            reason: e.to_string(),
        })?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        Ok(CasOutcome::Committed { version })
    }
}
