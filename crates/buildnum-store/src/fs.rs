//! Loose-object store on the local filesystem.
//!
//! Layout (one file per object, fanned out by the first two hex characters):
//!
//! ```text
//! <root>/ab/cdef0123...   (62 remaining hex chars)
//! ```
//!
//! Each file holds a bincode-encoded [`StoredObject`] compressed with zstd.
//! Files are written to a temporary file in the target directory and renamed
//! into place, so a reader never observes a partially written object.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use buildnum_types::ObjectId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// zstd level used for loose objects.
const COMPRESSION_LEVEL: i32 = 3;

/// Filesystem-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) an object directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (dir, file) = id.fan_out();
        self.root.join(dir).join(file)
    }

    fn encode(object: &StoredObject) -> StoreResult<Vec<u8>> {
        let raw =
            bincode::serialize(object).map_err(|e| StoreError::Serialization(e.to_string()))?;
        zstd::encode_all(raw.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| StoreError::Compression(e.to_string()))
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<StoredObject> {
        let raw = zstd::decode_all(bytes).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: format!("decompression failed: {e}"),
        })?;
        bincode::deserialize(&raw).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: format!("undecodable envelope: {e}"),
        })
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let bytes = match fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = Self::decode(id, &bytes)?;
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&Self::encode(object)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(id = %id.short_hex(), kind = %object.kind, size = object.size(), "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }
}
