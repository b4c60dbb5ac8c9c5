use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::{error::PersistenceError, models::record::SessionRecord};

/// Durable home of the in-flight session record. Must survive process death.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError>;
    async fn load(&self) -> Result<Option<SessionRecord>, PersistenceError>;
    async fn clear(&self) -> Result<(), PersistenceError>;

    /// Gets an unreadable record out of the way so the next `load` sees
    /// nothing. Stores that can keep a copy for inspection should.
    async fn discard_corrupt(&self) -> Result<(), PersistenceError> {
        self.clear().await
    }
}

/// JSON file store. Writes go to a sibling temp file which is fsynced and
/// renamed over the target, so a reader sees either the old or the new record.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    pub fn corrupt_path(&self) -> PathBuf {
        self.sibling_path(".corrupt")
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(record)?;
        let temp = self.temp_path();

        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(
            "Persisted session {} to {}",
            record.session.short_id(),
            self.path.display()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionRecord>, PersistenceError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Renames the unreadable file to `<name>.corrupt`, replacing any older one.
    async fn discard_corrupt(&self) -> Result<(), PersistenceError> {
        let aside = self.corrupt_path();
        match tokio::fs::rename(&self.path, &aside).await {
            Ok(()) => {
                tracing::warn!("Moved unreadable session record to {}", aside.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store. Clones share the record, which lets tests play a
/// "relaunch" by building a second coordinator on the same store. Records
/// are kept serialized, like on disk.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    contents: Arc<Mutex<Option<String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `PersistenceError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Replaces the stored contents verbatim, bypassing serialization.
    pub async fn write_raw(&self, contents: impl Into<String>) {
        *self.contents.lock().await = Some(contents.into());
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        self.check()?;
        let contents = serde_json::to_string(record)?;
        *self.contents.lock().await = Some(contents);
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionRecord>, PersistenceError> {
        self.check()?;
        match self.contents.lock().await.as_deref() {
            None => Ok(None),
            Some(contents) if contents.trim().is_empty() => Ok(None),
            Some(contents) => Ok(Some(serde_json::from_str(contents)?)),
        }
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.check()?;
        *self.contents.lock().await = None;
        Ok(())
    }
}
