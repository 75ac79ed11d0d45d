use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use buildnum_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

type ObjectMap = HashMap<ObjectId, StoredObject>;

/// Object store held entirely in memory.
///
/// Backs in-memory repositories and tests. Objects are cloned in and out.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<ObjectMap>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects held; 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.objects.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> StoreResult<RwLockReadGuard<'_, ObjectMap>> {
        self.objects.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn map_mut(&self) -> StoreResult<RwLockWriteGuard<'_, ObjectMap>> {
        self.objects.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.map()?.get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        self.map_mut()?
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.map()?.contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &self.len())
            .finish()
    }
}
