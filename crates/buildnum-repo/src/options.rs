//! Per-operation parameter structs.

use std::collections::BTreeMap;

use buildnum_types::Author;

/// Knobs for [`Repository::commit`](crate::Repository::commit).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit author; [`Author::default`] when unset.
    pub author: Option<Author>,
    /// Metadata headers attached to the commit.
    pub headers: BTreeMap<String, String>,
    /// Also point HEAD at the committed reference.
    pub set_head: bool,
}

impl CommitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_head(mut self) -> Self {
        self.set_head = true;
        self
    }
}

/// Filter for reference listings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefsOptions {
    /// Only references whose path starts with this prefix.
    pub prefix: Option<String>,
}

impl RefsOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    pub(crate) fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// Controls for history walks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitsOptions {
    /// Stop at the newest commit carrying this header and return only it.
    pub header_key: Option<String>,
}

impl CommitsOptions {
    pub fn with_header_key(key: impl Into<String>) -> Self {
        Self {
            header_key: Some(key.into()),
        }
    }
}
