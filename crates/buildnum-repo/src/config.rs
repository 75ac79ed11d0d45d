//! Repository configuration (`config.toml`).
//!
//! ```toml
//! [user]
//! name = "ci"
//! email = "ci@example.com"
//!
//! [remotes.origin]
//! urls = ["/srv/buildnum/shared"]
//!
//! [ledger]
//! ref_root = "refs/build-number"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// File name of the config inside a repository directory.
pub const CONFIG_FILE: &str = "config.toml";

const FILE_SCHEME: &str = "file://";

/// Everything persisted in `config.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remotes: BTreeMap<String, RemoteConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerSection>,
}

/// Default commit identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A configured remote repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub urls: Vec<String>,
}

impl RemoteConfig {
    /// The URL used for transport.
    pub fn url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

/// Overrides for where the ledger keeps its references.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl RepositoryConfig {
    /// Load from `path`; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| RepoError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write to `path` through a temporary file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| RepoError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Look up a remote, failing with [`RepoError::RemoteNotFound`].
    pub fn remote(&self, name: &str) -> Result<&RemoteConfig> {
        self.remotes.get(name).ok_or_else(|| RepoError::RemoteNotFound {
            name: name.to_string(),
        })
    }
}

/// Resolve a remote URL to the directory of the repository it names.
///
/// Accepts a plain filesystem path or a `file://` URL.
pub fn remote_path(name: &str, url: &str) -> Result<PathBuf> {
    if let Some(path) = url.strip_prefix(FILE_SCHEME) {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        return Err(RepoError::InvalidRemote {
            name: name.to_string(),
            reason: format!("unsupported url {url:?}: only paths and file:// urls are supported"),
        });
    }
    if url.is_empty() {
        return Err(RepoError::InvalidRemote {
            name: name.to_string(),
            reason: "empty url".into(),
        });
    }
    Ok(PathBuf::from(url))
}
