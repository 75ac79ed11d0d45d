//! Repository adapter for buildnum.
//!
//! The only crate that touches a commit-graph engine directly: either a
//! git repository through libgit2 or the native object and ref stores. Callers
//! see a [`Repository`]: references resolved to tips, file content at a
//! tip, first-parent history with header lookup, single-file commits, and
//! remote synchronization (fetch, push, mirror).
//!
//! Engine failures are folded into [`RepoError`]: a missing reference is
//! always [`RepoError::ReferenceNotFound`] and a missing remote always
//! [`RepoError::RemoteNotFound`].
//!
//! # Modules
//!
//! - [`error`]: [`RepoError`] and the `Result` alias
//! - [`types`]: [`Reference`], [`Commit`]
//! - [`options`]: per-operation option structs
//! - [`traits`]: the [`Repository`] trait
//! - [`graph`]: [`GraphRepository`], on disk or in memory
//! - [`git`]: [`GitRepository`], over an existing git repository
//! - [`config`]: `config.toml`: remotes, user, ledger overrides
//! - [`sync`]: refspecs and object transfer between graphs

pub mod config;
pub mod error;
pub mod git;
pub mod graph;
pub mod options;
pub mod sync;
pub mod traits;
pub mod types;

pub use config::{LedgerSection, RemoteConfig, RepositoryConfig, UserConfig};
pub use error::{RepoError, Result};
pub use git::GitRepository;
pub use graph::{GraphRepository, DEFAULT_HEAD, REPO_DIR};
pub use options::{CommitOptions, CommitsOptions, RefsOptions};
pub use sync::{RefSpec, RefUpdate, SyncOutcome};
pub use traits::Repository;
pub use types::{Commit, Reference};

pub use buildnum_refs::{validate_ref_name, validate_remote_name};
pub use buildnum_types::Author;
