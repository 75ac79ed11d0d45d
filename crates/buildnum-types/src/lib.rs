//! Foundation types for buildnum.
//!
//! Every other buildnum crate depends on `buildnum-types`. It holds the
//! identifiers and identities that flow through the object store, the
//! reference store and the ledger built on top of them.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`ContentHasher`]: Domain-separated hasher producing [`ObjectId`]s
//! - [`Author`]: Name and email recorded on every commit
//! - [`Signature`]: An [`Author`] plus the instant a commit was made

pub mod error;
pub mod hasher;
pub mod identity;
pub mod object;

pub use error::TypeError;
pub use hasher::ContentHasher;
pub use identity::{Author, Signature};
pub use object::ObjectId;
