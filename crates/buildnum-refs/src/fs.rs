//! Reference store on the local filesystem.
//!
//! Layout under the repository directory:
//!
//! ```text
//! <root>/HEAD                         "ref: refs/heads/main\n" or "<hex>\n"
//! <root>/refs/build-number/default    "<hex>\n"
//! ```
//!
//! Every write goes through a temporary file in the destination directory
//! followed by a rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use buildnum_types::ObjectId;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::Head;

const HEAD_FILE: &str = "HEAD";
const REFS_DIR: &str = "refs";
const SYMBOLIC_PREFIX: &str = "ref: ";

/// Filesystem-backed [`RefStore`]: one file per ref.
#[derive(Debug, Clone)]
pub struct FsRefStore {
    root: PathBuf,
}

impl FsRefStore {
    /// Open a ref store rooted at a repository directory, creating `refs/`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(REFS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        name.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    fn write_atomic(path: &Path, contents: &str) -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "ref path has no parent")
        })?;
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn parse_id(name: &str, contents: &str) -> Result<ObjectId> {
        ObjectId::from_hex(contents).map_err(|e| RefError::Corrupt {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Remove now-empty directories between a deleted ref and `refs/`.
    fn prune_empty_dirs(&self, from: &Path) {
        let stop = self.root.join(REFS_DIR);
        let mut dir = from.parent();
        while let Some(current) = dir {
            if current == stop || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let path = self.ref_path(name);
        if path.is_dir() {
            return Ok(None);
        }
        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse_id(name, &contents).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_ref(&self, name: &str, target: ObjectId) -> Result<()> {
        validate_ref_name(name)?;
        Self::write_atomic(&self.ref_path(name), &format!("{target}\n"))?;
        debug!(reference = name, target = %target.short_hex(), "ref updated");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let path = self.ref_path(name);
        if path.is_dir() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_dirs(&path);
                debug!(reference = name, "ref deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let refs_dir = self.root.join(REFS_DIR);
        if !refs_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut refs = Vec::new();
        for entry in WalkDir::new(&refs_dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.')
            {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !name.starts_with(prefix) {
                continue;
            }
            let contents = fs::read_to_string(entry.path())?;
            let id = Self::parse_id(&name, &contents)?;
            refs.push((name, id));
        }
        refs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(refs)
    }

    fn head(&self) -> Result<Option<Head>> {
        let contents = match fs::read_to_string(self.root.join(HEAD_FILE)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let contents = contents.trim();
        match contents.strip_prefix(SYMBOLIC_PREFIX) {
            Some(target) => Ok(Some(Head::Symbolic(target.trim().to_string()))),
            None => Self::parse_id(HEAD_FILE, contents).map(|id| Some(Head::Detached(id))),
        }
    }

    fn set_head(&self, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        let head = Head::Symbolic(target.to_string());
        Self::write_atomic(&self.root.join(HEAD_FILE), &head.to_file_contents())
    }

    fn set_head_detached(&self, target: ObjectId) -> Result<()> {
        let head = Head::Detached(target);
        Self::write_atomic(&self.root.join(HEAD_FILE), &head.to_file_contents())
    }
}
