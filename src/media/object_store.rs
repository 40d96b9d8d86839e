//! Object storage for uploaded payloads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Object store failures.
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    /// The store refused the payload.
    #[error("object store rejected upload: {0}")]
    Rejected(String),

    /// The key cannot be mapped to a storage location.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// I/O error talking to the store.
    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary payload storage returning a durable locator.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `payload` under `key`, replacing any previous object there.
    ///
    /// Returns the locator clients use to fetch the object. An empty locator
    /// is treated as a failed upload by callers.
    async fn put(
        &self,
        key: &str,
        payload: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, ObjectStoreError>;
}

/// Distinguishes temporary files of concurrent uploads to the same key.
static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        payload: Bytes,
        _content_type: Option<&str>,
    ) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never see a half-written object.
        let attempt = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ObjectStoreError::InvalidKey(key.to_string()))?;
        let partial = path.with_file_name(format!(".{file_name}.{attempt}.partial"));
        tokio::fs::write(&partial, &payload).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(key, bytes = payload.len(), path = %path.display(), "object stored");
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// Keeps objects in memory. Useful for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
    puts: AtomicUsize,
    locator_override: Option<String>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that accepts uploads but answers with an empty locator.
    pub fn without_locator() -> Self {
        Self {
            locator_override: Some(String::new()),
            ..Self::default()
        }
    }

    /// Stored payload for a key.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().ok().and_then(|o| o.get(key).cloned())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `put` calls received, including overwrites.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        payload: Bytes,
        _content_type: Option<&str>,
    ) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects
            .write()
            .map_err(|_| ObjectStoreError::Rejected("object map poisoned".into()))?
            .insert(key.to_string(), payload);

        Ok(self
            .locator_override
            .clone()
            .unwrap_or_else(|| format!("mem://{key}")))
    }
}
