//! Storage abstraction layer for gitlet
//!
//! Objects are write-once: the store only grows, and a hash always maps to the
//! same bytes. Writes land under a temporary name and are renamed into place,
//! so a reader never observes a partially written object.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::object::{frame, unframe, Object, ObjectId, ObjectKind};

/// Generic object store interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get an object's kind and payload by ID
    async fn get(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)>;

    /// Check if object exists without reading its payload
    async fn has(&self, id: ObjectId) -> Result<bool>;

    /// Store a payload (no-op if already present) and return its ID
    async fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId>;

    /// Encode and store a typed object
    async fn put_object(&self, object: &Object) -> Result<ObjectId> {
        let payload = object.payload()?;
        self.put(object.kind(), &payload).await
    }

    /// Load and decode a typed object
    async fn get_object(&self, id: ObjectId) -> Result<Object> {
        let (kind, payload) = self.get(id).await?;
        Object::decode(kind, &payload)
    }
}

/// Read-only access to objects by ID
///
/// Implemented by local stores and by remote endpoints, so a history walk can
/// pull objects from either.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Fetch an object's kind and payload, failing with `ObjectNotFound`
    async fn fetch_object(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)>;
}

/// Content-addressed store backed by one file per object
///
/// Layout on disk:
/// ```text
/// {dir}/
///   {hash}          framed object bytes
///   .tmp-{uuid}     in-flight writes, renamed into place when complete
/// ```
#[derive(Debug)]
pub struct DiskObjectStore {
    dir: PathBuf,
}

impl DiskObjectStore {
    /// Open a store rooted at `dir` (created on first write)
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the object files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file an object is stored in
    pub fn object_path(&self, id: ObjectId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    /// Read the stored (framed) bytes of an object, verifying their hash
    pub async fn read_raw(&self, id: ObjectId) -> Result<Bytes> {
        let data = match tokio::fs::read(self.object_path(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::ObjectNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        let actual = ObjectId::from_data(&data);
        if actual != id {
            return Err(Error::ObjectIntegrity {
                expected: id,
                actual,
            });
        }
        Ok(Bytes::from(data))
    }

    /// List all stored object IDs in hash order
    pub async fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| ObjectId::from_hex(n).ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn get(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)> {
        let raw = self.read_raw(id).await?;
        let (kind, payload) = unframe(&raw)?;
        let offset = raw.len() - payload.len();
        Ok((kind, raw.slice(offset..)))
    }

    async fn has(&self, id: ObjectId) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(id)).await?)
    }

    async fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        let data = frame(kind, payload);
        let id = ObjectId::from_data(&data);
        let path = self.object_path(id);

        if tokio::fs::try_exists(&path).await? {
            return Ok(id);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp_path = self.dir.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        let written = match write_synced(&tmp_path, &data).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::trace!(object = %id, kind = %kind, "stored object");
        Ok(id)
    }
}

/// Write `data` to a new file and flush it to disk before returning
async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[async_trait]
impl ObjectSource for DiskObjectStore {
    async fn fetch_object(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)> {
        self.get(id).await
    }
}

/// In-memory object store
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, (ObjectKind, Bytes)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)> {
        self.objects
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::ObjectNotFound(id))
    }

    async fn has(&self, id: ObjectId) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(&id))
    }

    async fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::for_object(kind, payload);
        self.objects
            .write()
            .await
            .entry(id)
            .or_insert_with(|| (kind, Bytes::copy_from_slice(payload)));
        Ok(id)
    }
}

#[async_trait]
impl ObjectSource for MemoryObjectStore {
    async fn fetch_object(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)> {
        self.get(id).await
    }
}
