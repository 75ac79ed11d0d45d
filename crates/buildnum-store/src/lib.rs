//! Content-addressed object storage for buildnum.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. Every build number write ends up here as a
//! small graph of immutable objects identified by their BLAKE3 hash
//! (domain-separated by object kind).
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- directory listing mapping names to object ids
//! - [`CommitObject`] -- tree + parent chain + author + message + headers
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- zstd-compressed loose objects on disk
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: objects are written before any reference points at them.
//! 3. The store never interprets object contents -- it is a pure key-value store.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, CommitObject, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
