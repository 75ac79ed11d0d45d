//! Reference management for buildnum.
//!
//! References are the named, mutable entry points into the commit graph,
//! analogous to git refs. Each one is a hierarchical path such as
//! `refs/build-number/android` pointing at a commit id.
//!
//! - **References** move forward as new commits are written, and can be
//!   deleted, after which their history is unreachable.
//! - **HEAD** is a symbolic ref naming the repository's current reference,
//!   or a detached pointer straight at a commit id.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`Head`]
//! - [`traits`]: The [`RefStore`] trait defining the storage interface
//! - [`names`]: Ref and remote name validation
//! - [`memory`]: In-memory [`InMemoryRefStore`] for tests
//! - [`fs`]: On-disk [`FsRefStore`]

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::{short_name, validate_ref_name, validate_remote_name};
pub use traits::RefStore;
pub use types::Head;
