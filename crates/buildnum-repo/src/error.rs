//! Error types for repository operations.

use std::path::PathBuf;

use buildnum_refs::RefError;
use buildnum_store::StoreError;
use thiserror::Error;

/// Errors raised by the repository adapter.
///
/// Every "no such reference" condition from the engine surfaces as
/// [`RepoError::ReferenceNotFound`] and every "no such remote" as
/// [`RepoError::RemoteNotFound`]; everything else passes through.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("reference not found: {name}")]
    ReferenceNotFound { name: String },

    #[error("remote not found: {name}")]
    RemoteNotFound { name: String },

    #[error("remote already exists: {name}")]
    RemoteAlreadyExists { name: String },

    #[error("invalid remote {name}: {reason}")]
    InvalidRemote { name: String, reason: String },

    #[error("file {file} not found at {reference}")]
    FileNotFound { reference: String, file: String },

    #[error("updates to {reference} were rejected: not a fast-forward")]
    NonFastForward { reference: String },

    #[error("invalid refspec {spec:?}: {reason}")]
    InvalidRefSpec { spec: String, reason: String },

    #[error("failed to delete remote reference {reference}")]
    MirrorDelete {
        reference: String,
        #[source]
        source: Box<RepoError>,
    },

    #[error("HEAD is detached; check out a reference first")]
    DetachedHead,

    #[error("not a git or buildnum repository (or any parent): {}", path.display())]
    NotARepository { path: PathBuf },

    #[error("repository already exists: {}", path.display())]
    RepositoryExists { path: PathBuf },

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("repository config lock poisoned")]
    LockPoisoned,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ref error: {0}")]
    Refs(RefError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

impl RepoError {
    /// True when a reference was not found.
    pub fn is_reference_not_found(&self) -> bool {
        matches!(self, RepoError::ReferenceNotFound { .. })
    }

    /// True when a remote is not configured.
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, RepoError::RemoteNotFound { .. })
    }
}

impl From<RefError> for RepoError {
    fn from(err: RefError) -> Self {
        match err {
            RefError::NotFound { name } => RepoError::ReferenceNotFound { name },
            RefError::InvalidRemoteName { name, reason } => {
                RepoError::InvalidRemote { name, reason }
            }
            other => RepoError::Refs(other),
        }
    }
}

/// Convenience type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
