//! Error types for ledger operations.

use std::num::ParseIntError;

use buildnum_repo::RepoError;
use thiserror::Error;

/// Errors raised by the build number ledger.
///
/// Lookups that fail because a reference is missing keep the repository
/// error as their [`source`](std::error::Error::source), so callers can
/// test against either level.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("could not find build number")]
    BuildNumberNotFound {
        #[source]
        source: Option<RepoError>,
    },

    #[error("could not find head")]
    NoHead {
        #[source]
        source: Option<RepoError>,
    },

    #[error("build number can't be zero")]
    ZeroBuildNumber,

    #[error("hash is invalid")]
    InvalidHash,

    #[error("format is invalid: {content:?}")]
    InvalidFormat { content: String },

    #[error("build number is invalid: {source}")]
    InvalidBuildNumber {
        #[source]
        source: ParseIntError,
    },

    #[error("invalid namespace {name:?}: {reason}")]
    InvalidNamespace { name: String, reason: String },

    #[error("build number {number} cannot be incremented")]
    NumberOverflow { number: u64 },

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl LedgerError {
    pub fn is_build_number_not_found(&self) -> bool {
        matches!(self, LedgerError::BuildNumberNotFound { .. })
    }

    /// The repository-level error behind this one, if any.
    pub fn repo_error(&self) -> Option<&RepoError> {
        match self {
            LedgerError::BuildNumberNotFound { source }
            | LedgerError::NoHead { source } => source.as_ref(),
            LedgerError::Repository(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn not_found_chains_reference_not_found() {
        let err = LedgerError::BuildNumberNotFound {
            source: Some(RepoError::ReferenceNotFound {
                name: "refs/build-number/x".into(),
            }),
        };
        assert!(err.is_build_number_not_found());
        assert!(err.repo_error().unwrap().is_reference_not_found());
        assert!(err.source().unwrap().to_string().contains("refs/build-number/x"));
    }

    #[test]
    fn repository_errors_are_transparent() {
        let err = LedgerError::from(RepoError::RemoteNotFound {
            name: "origin".into(),
        });
        assert_eq!(err.to_string(), "remote not found: origin");
        assert!(err.repo_error().unwrap().is_remote_not_found());
        assert!(LedgerError::ZeroBuildNumber.repo_error().is_none());
    }
}
