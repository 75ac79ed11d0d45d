//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use buildnum_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::Head;

/// An in-memory implementation of [`RefStore`].
///
/// Refs live in a `BTreeMap` so listings come out sorted. Data is lost when
/// the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, ObjectId>>,
    head: RwLock<Option<Head>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose HEAD is already set.
    pub fn with_head(head: Head) -> Self {
        Self {
            refs: RwLock::default(),
            head: RwLock::new(Some(head)),
        }
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let refs = self.refs.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(refs.get(name).copied())
    }

    fn write_ref(&self, name: &str, target: ObjectId) -> Result<()> {
        validate_ref_name(name)?;
        let mut refs = self.refs.write().map_err(|_| RefError::LockPoisoned)?;
        refs.insert(name.to_string(), target);
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let mut refs = self.refs.write().map_err(|_| RefError::LockPoisoned)?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let refs = self.refs.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    fn head(&self) -> Result<Option<Head>> {
        let head = self.head.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(head.clone())
    }

    fn set_head(&self, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        let mut head = self.head.write().map_err(|_| RefError::LockPoisoned)?;
        *head = Some(Head::Symbolic(target.to_string()));
        Ok(())
    }

    fn set_head_detached(&self, target: ObjectId) -> Result<()> {
        let mut head = self.head.write().map_err(|_| RefError::LockPoisoned)?;
        *head = Some(Head::Detached(target));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_hash([byte; 32])
    }

    // ---- read / write / delete ----

    #[test]
    fn write_then_read() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/build-number/default", id(1)).unwrap();
        assert_eq!(store.read_ref("refs/build-number/default").unwrap(), Some(id(1)));
        assert_eq!(store.read_ref("refs/build-number/other").unwrap(), None);
    }

    #[test]
    fn overwrite_moves_ref() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/heads/main", id(1)).unwrap();
        store.write_ref("refs/heads/main", id(2)).unwrap();
        assert_eq!(store.require_ref("refs/heads/main").unwrap(), id(2));
    }

    #[test]
    fn write_rejects_invalid_name() {
        let store = InMemoryRefStore::new();
        let err = store.write_ref("not-a-ref", id(1)).unwrap_err();
        assert!(matches!(err, RefError::InvalidRefName { .. }));
    }

    #[test]
    fn delete_reports_existence() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/build-number/x", id(1)).unwrap();
        assert!(store.delete_ref("refs/build-number/x").unwrap());
        assert!(!store.delete_ref("refs/build-number/x").unwrap());
        assert!(matches!(
            store.require_ref("refs/build-number/x"),
            Err(RefError::NotFound { .. })
        ));
    }

    // ---- listing ----

    #[test]
    fn list_is_sorted_and_prefix_filtered() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/build-number/zeta", id(3)).unwrap();
        store.write_ref("refs/build-number/alpha", id(1)).unwrap();
        store.write_ref("refs/heads/main", id(9)).unwrap();
        store.write_ref("refs/build-number/mid", id(2)).unwrap();

        let listed = store.list_refs("refs/build-number/").unwrap();
        let names: Vec<&str> = listed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            ["refs/build-number/alpha", "refs/build-number/mid", "refs/build-number/zeta"]
        );
        assert_eq!(store.list_refs("").unwrap().len(), 4);
        assert!(store.list_refs("refs/tags/").unwrap().is_empty());
    }

    // ---- HEAD ----

    #[test]
    fn head_unset_by_default() {
        let store = InMemoryRefStore::new();
        assert_eq!(store.head().unwrap(), None);
    }

    #[test]
    fn symbolic_head_may_name_missing_ref() {
        let store = InMemoryRefStore::new();
        store.set_head("refs/heads/main").unwrap();
        assert_eq!(store.head().unwrap(), Some(Head::Symbolic("refs/heads/main".into())));
        assert_eq!(store.read_ref("refs/heads/main").unwrap(), None);
    }

    #[test]
    fn detached_head_holds_id() {
        let store = InMemoryRefStore::new();
        store.set_head_detached(id(4)).unwrap();
        assert_eq!(store.head().unwrap(), Some(Head::Detached(id(4))));
    }

    #[test]
    fn with_head_starts_symbolic() {
        let store = InMemoryRefStore::with_head(Head::Symbolic("refs/heads/main".into()));
        assert_eq!(store.head().unwrap(), Some(Head::Symbolic("refs/heads/main".into())));
        assert!(store.list_refs("").unwrap().is_empty());
    }

    #[test]
    fn set_head_validates_target() {
        let store = InMemoryRefStore::new();
        assert!(store.set_head("main").is_err());
    }
}
