use std::collections::BTreeMap;
use std::fmt;

use buildnum_refs::short_name;
use buildnum_store::CommitObject;
use buildnum_types::{Author, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named pointer to a commit, resolved to its current tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Full path, e.g. `refs/build-number/android`.
    pub path: String,
    /// Last path segment, e.g. `android`.
    pub name: String,
    /// Hex id of the tip commit.
    pub hash: String,
}

impl Reference {
    pub fn new(path: impl Into<String>, tip: ObjectId) -> Self {
        Self::with_hash(path, tip.to_hex())
    }

    /// A reference whose tip is already in hex form, e.g. a git object id.
    pub fn with_hash(path: impl Into<String>, hash: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: short_name(&path).to_string(),
            path,
            hash: hash.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hash, self.path)
    }
}

/// A commit as seen through the adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub author: Author,
    pub when: DateTime<Utc>,
    pub message: String,
    pub headers: BTreeMap<String, String>,
}

impl Commit {
    pub(crate) fn from_object(id: ObjectId, object: CommitObject) -> Self {
        Self {
            hash: id.to_hex(),
            author: object.author.author,
            when: object.author.when,
            message: object.message,
            headers: object.headers,
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}
