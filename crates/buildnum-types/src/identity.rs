use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The identity recorded as the author of a commit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Used when a caller does not say who is writing.
impl Default for Author {
    fn default() -> Self {
        Self::new("Build Number", "Not Set")
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// An [`Author`] stamped with the instant the commit was created.
///
/// Timestamps are truncated to whole milliseconds so a signature survives a
/// serialization round trip unchanged and hashes the same afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub author: Author,
    pub when: DateTime<Utc>,
}

impl Signature {
    pub fn new(author: Author, when: DateTime<Utc>) -> Self {
        Self {
            author,
            when: when.trunc_subsecs(3),
        }
    }

    /// Sign as `author` at the current wall-clock time.
    pub fn now(author: Author) -> Self {
        Self::new(author, Utc::now())
    }
}
