use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;

use crate::models::CompositionSession;
use crate::{Error, Result};

/// Durable home of the session list.
///
/// The whole list is read and written as one document: the registry holds it
/// in memory, mutates it there, and hands the full replacement back. A
/// `write_all` either lands completely or leaves the previous document
/// intact; callers rely on that to acknowledge writes only after they are
/// durable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read_all(&self) -> Result<Vec<CompositionSession>>;

    async fn write_all(&self, sessions: &[CompositionSession]) -> Result<()>;
}

/// In-memory store. Sessions are lost on restart; intended for tests and
/// ephemeral deployments with no `registry.data_path` configured.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<Vec<CompositionSession>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read_all(&self) -> Result<Vec<CompositionSession>> {
        Ok(self.sessions.read().clone())
    }

    async fn write_all(&self, sessions: &[CompositionSession]) -> Result<()> {
        *self.sessions.write() = sessions.to_vec();
        Ok(())
    }
}

/// JSON document on the local filesystem.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated document behind. A missing file
/// reads as an empty list (first boot).
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn read_all(&self) -> Result<Vec<CompositionSession>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::Persistence(format!(
                    "read {}: {err}",
                    self.path.display()
                )))
            }
        };

        let sessions = serde_json::from_slice(&bytes)?;
        Ok(sessions)
    }

    async fn write_all(&self, sessions: &[CompositionSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|err| {
                    Error::Persistence(format!("create {}: {err}", parent.display()))
                })?;
            }
        }

        let bytes = serde_json::to_vec_pretty(sessions)?;
        let temp = self.temp_path();
        fs::write(&temp, &bytes)
            .await
            .map_err(|err| Error::Persistence(format!("write {}: {err}", temp.display())))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|err| Error::Persistence(format!("rename {}: {err}", self.path.display())))?;

        tracing::trace!(
            path = %self.path.display(),
            count = sessions.len(),
            "session document written"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectionEntry;

    fn sample_sessions() -> Vec<CompositionSession> {
        vec![
            CompositionSession::new(vec![SelectionEntry::new("gate-north")]),
            CompositionSession::new(vec![
                SelectionEntry::new("plaza"),
                SelectionEntry::new("harbor").audio_only(),
            ]),
        ]
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.read_all().await.unwrap().is_empty());

        let sessions = sample_sessions();
        store.write_all(&sessions).await.unwrap();
        let read = store.read_all().await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].id, sessions[0].id);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("sessions.json"));
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let store = JsonFileStore::new(&path);

        let sessions = sample_sessions();
        store.write_all(&sessions).await.unwrap();
        let read = store.read_all().await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].selection, sessions[1].selection);

        // No temp file left behind after a successful write.
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_overwrites_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("sessions.json"));

        store.write_all(&sample_sessions()).await.unwrap();
        store.write_all(&[]).await.unwrap();
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state/sessions.json"));
        store.write_all(&sample_sessions()).await.unwrap();
        assert_eq!(store.read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.read_all().await.is_err());
    }
}
