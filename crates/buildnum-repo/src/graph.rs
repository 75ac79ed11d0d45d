//! [`GraphRepository`]: the [`Repository`] implementation over the
//! in-workspace object and ref stores.
//!
//! Layout of a work repository (bare repositories drop the `.buildnum`
//! level):
//!
//! ```text
//! <dir>/.buildnum/HEAD
//! <dir>/.buildnum/config.toml
//! <dir>/.buildnum/objects/
//! <dir>/.buildnum/refs/
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use buildnum_refs::{validate_remote_name, FsRefStore, Head, InMemoryRefStore, RefStore};
use buildnum_store::{
    Blob, CommitObject, FsObjectStore, InMemoryObjectStore, ObjectStore, Tree,
};
use buildnum_types::{ObjectId, Signature};
use tracing::{debug, info};

use crate::config::{remote_path, RemoteConfig, RepositoryConfig, CONFIG_FILE};
use crate::error::{RepoError, Result};
use crate::options::{CommitOptions, CommitsOptions, RefsOptions};
use crate::sync::{self, Endpoint, RefSpec, SyncOutcome};
use crate::traits::Repository;
use crate::types::{Commit, Reference};

/// Directory holding a work repository's data.
pub const REPO_DIR: &str = ".buildnum";
/// The reference HEAD names in a fresh repository.
pub const DEFAULT_HEAD: &str = "refs/heads/main";

const OBJECTS_DIR: &str = "objects";
const REFS_DIR: &str = "refs";
const HEAD_FILE: &str = "HEAD";

enum ConfigSource {
    Memory(RwLock<RepositoryConfig>),
    File(PathBuf),
}

/// A commit graph with refs, config, and file-path remotes.
pub struct GraphRepository {
    objects: Box<dyn ObjectStore>,
    refs: Box<dyn RefStore>,
    config: ConfigSource,
    dir: Option<PathBuf>,
}

impl GraphRepository {
    /// Create a work repository at `path/.buildnum`.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        Self::create(path.as_ref().join(REPO_DIR))
    }

    /// Create a bare repository directly in `path`.
    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self> {
        Self::create(path.as_ref().to_path_buf())
    }

    fn create(dir: PathBuf) -> Result<Self> {
        if is_repository_dir(&dir) {
            return Err(RepoError::RepositoryExists { path: dir });
        }
        fs::create_dir_all(&dir)?;
        let repo = Self::open_dir(dir)?;
        repo.refs.set_head(DEFAULT_HEAD)?;
        if let ConfigSource::File(path) = &repo.config {
            if !path.exists() {
                RepositoryConfig::default().save(path)?;
            }
        }
        info!(path = ?repo.dir, "initialized repository");
        Ok(repo)
    }

    /// Open the repository containing `path`, searching parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let start = path.as_ref();
        let absolute = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
        for dir in absolute.ancestors() {
            if let Some(found) = repository_dir_at(dir) {
                debug!(path = %found.display(), "discovered repository");
                return Self::open_dir(found);
            }
        }
        Err(RepoError::NotARepository {
            path: start.to_path_buf(),
        })
    }

    /// Open the repository at exactly `path` (work or bare), no discovery.
    pub fn open_exact(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match repository_dir_at(path) {
            Some(dir) => Self::open_dir(dir),
            None => Err(RepoError::NotARepository {
                path: path.to_path_buf(),
            }),
        }
    }

    /// A repository that lives only in memory. Its remotes are still
    /// on-disk repositories.
    pub fn in_memory() -> Self {
        Self {
            objects: Box::new(InMemoryObjectStore::new()),
            refs: Box::new(InMemoryRefStore::with_head(Head::Symbolic(
                DEFAULT_HEAD.to_string(),
            ))),
            config: ConfigSource::Memory(RwLock::new(RepositoryConfig::default())),
            dir: None,
        }
    }

    fn open_dir(dir: PathBuf) -> Result<Self> {
        Ok(Self {
            objects: Box::new(FsObjectStore::open(dir.join(OBJECTS_DIR))?),
            refs: Box::new(FsRefStore::open(&dir)?),
            config: ConfigSource::File(dir.join(CONFIG_FILE)),
            dir: Some(dir),
        })
    }

    /// The directory holding HEAD, config, objects and refs, if on disk.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// A snapshot of the repository configuration.
    pub fn config(&self) -> Result<RepositoryConfig> {
        match &self.config {
            ConfigSource::Memory(lock) => lock
                .read()
                .map(|config| config.clone())
                .map_err(|_| RepoError::LockPoisoned),
            ConfigSource::File(path) => RepositoryConfig::load(path),
        }
    }

    fn update_config(&self, f: impl FnOnce(&mut RepositoryConfig) -> Result<()>) -> Result<()> {
        match &self.config {
            ConfigSource::Memory(lock) => {
                let mut config = lock.write().map_err(|_| RepoError::LockPoisoned)?;
                f(&mut config)
            }
            ConfigSource::File(path) => {
                let mut config = RepositoryConfig::load(path)?;
                f(&mut config)?;
                config.save(path)
            }
        }
    }

    /// The reference HEAD names, whether or not it has commits yet.
    pub fn head_target(&self) -> Result<String> {
        match self.refs.head()? {
            Some(Head::Symbolic(path)) => Ok(path),
            Some(Head::Detached(_)) => Err(RepoError::DetachedHead),
            None => Err(RepoError::ReferenceNotFound {
                name: HEAD_FILE.to_string(),
            }),
        }
    }

    fn endpoint(&self) -> Endpoint<'_> {
        Endpoint {
            objects: self.objects.as_ref(),
            refs: self.refs.as_ref(),
        }
    }

    fn remote(&self, name: &str) -> Result<GraphRepository> {
        let config = self.config()?;
        let url = config
            .remote(name)?
            .url()
            .ok_or_else(|| RepoError::InvalidRemote {
                name: name.to_string(),
                reason: "no url configured".into(),
            })?
            .to_string();
        GraphRepository::open_exact(remote_path(name, &url)?)
    }

    fn tip(&self, reference: &str) -> Result<ObjectId> {
        Ok(self.refs.require_ref(reference)?)
    }

    fn list(refs: &dyn RefStore, options: &RefsOptions) -> Result<Vec<Reference>> {
        Ok(refs
            .list_refs(options.prefix())?
            .into_iter()
            .map(|(path, tip)| Reference::new(path, tip))
            .collect())
    }
}

impl Repository for GraphRepository {
    fn head(&self) -> Result<Reference> {
        match self.refs.head()? {
            Some(Head::Detached(id)) => Ok(Reference::new(HEAD_FILE, id)),
            Some(Head::Symbolic(path)) => {
                let tip = self.tip(&path)?;
                Ok(Reference::new(path, tip))
            }
            None => Err(RepoError::ReferenceNotFound {
                name: HEAD_FILE.to_string(),
            }),
        }
    }

    fn refs(&self, options: &RefsOptions) -> Result<Vec<Reference>> {
        Self::list(self.refs.as_ref(), options)
    }

    fn remote_refs(&self, remote: &str, options: &RefsOptions) -> Result<Vec<Reference>> {
        let remote = self.remote(remote)?;
        Self::list(remote.refs.as_ref(), options)
    }

    fn content(&self, reference: &str, file: &str) -> Result<Vec<u8>> {
        let commit = self.objects.read_commit(&self.tip(reference)?)?;
        let tree = self.objects.read_tree(&commit.tree)?;
        let entry = tree.get(file).ok_or_else(|| RepoError::FileNotFound {
            reference: reference.to_string(),
            file: file.to_string(),
        })?;
        Ok(self.objects.read_blob(&entry.object_id)?.data)
    }

    fn commits(&self, reference: &str, options: &CommitsOptions) -> Result<Vec<Commit>> {
        let mut next = Some(self.tip(reference)?);
        let mut history = Vec::new();
        while let Some(id) = next {
            let commit = self.objects.read_commit(&id)?;
            next = commit.first_parent().copied();
            match &options.header_key {
                Some(key) if commit.headers.contains_key(key) => {
                    return Ok(vec![Commit::from_object(id, commit)]);
                }
                Some(_) => {}
                None => history.push(Commit::from_object(id, commit)),
            }
        }
        Ok(history)
    }

    fn commit(
        &self,
        reference: &str,
        file: &str,
        content: &[u8],
        message: &str,
        options: &CommitOptions,
    ) -> Result<Reference> {
        let parent = self.refs.read_ref(reference)?;

        let blob = self.objects.write(&Blob::new(content).to_stored_object())?;
        let tree = self
            .objects
            .write(&Tree::single(file, blob).to_stored_object()?)?;
        let commit = CommitObject {
            tree,
            parents: parent.into_iter().collect(),
            author: Signature::now(options.author.clone().unwrap_or_default()),
            message: message.to_string(),
            headers: options.headers.clone(),
        };
        let id = self.objects.write(&commit.to_stored_object()?)?;

        self.refs.write_ref(reference, id)?;
        if options.set_head {
            self.refs.set_head(reference)?;
        }
        debug!(reference, commit = %id.short_hex(), "committed");
        Ok(Reference::new(reference, id))
    }

    fn delete(&self, reference: &str) -> Result<()> {
        if !self.refs.delete_ref(reference)? {
            return Err(RepoError::ReferenceNotFound {
                name: reference.to_string(),
            });
        }
        debug!(reference, "deleted reference");
        Ok(())
    }

    fn fetch(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome> {
        let spec = RefSpec::parse(refspec)?.with_force(force);
        let source = self.remote(remote)?;
        let outcome = sync::transfer(source.endpoint(), self.endpoint(), &spec)?;
        info!(remote, refspec = %spec, updated = outcome.updates().len(), "fetched");
        Ok(outcome)
    }

    fn push(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome> {
        let spec = RefSpec::parse(refspec)?.with_force(force);
        let destination = self.remote(remote)?;
        let outcome = sync::transfer(self.endpoint(), destination.endpoint(), &spec)?;
        info!(remote, refspec = %spec, updated = outcome.updates().len(), "pushed");
        Ok(outcome)
    }

    fn mirror(&self, prefix: &str, remote: &str) -> Result<SyncOutcome> {
        let destination = self.remote(remote)?;
        let outcome = sync::mirror(self.endpoint(), destination.endpoint(), prefix)?;
        info!(remote, prefix, updated = outcome.updates().len(), "mirrored");
        Ok(outcome)
    }

    fn add_remote(&self, name: &str, urls: &[String]) -> Result<()> {
        validate_remote_name(name)?;
        if urls.is_empty() {
            return Err(RepoError::InvalidRemote {
                name: name.to_string(),
                reason: "at least one url is required".into(),
            });
        }
        for url in urls {
            remote_path(name, url)?;
        }

        self.update_config(|config| {
            if config.remotes.contains_key(name) {
                return Err(RepoError::RemoteAlreadyExists {
                    name: name.to_string(),
                });
            }
            config.remotes.insert(
                name.to_string(),
                RemoteConfig {
                    urls: urls.to_vec(),
                },
            );
            Ok(())
        })?;
        info!(remote = name, url = %urls[0], "added remote");
        Ok(())
    }
}

impl std::fmt::Debug for GraphRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRepository")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn is_repository_dir(dir: &Path) -> bool {
    dir.join(HEAD_FILE).is_file() && dir.join(OBJECTS_DIR).is_dir() && dir.join(REFS_DIR).is_dir()
}

/// The repository directory for `dir`: its `.buildnum` child, or `dir`
/// itself when it is bare.
fn repository_dir_at(dir: &Path) -> Option<PathBuf> {
    let work = dir.join(REPO_DIR);
    if is_repository_dir(&work) {
        Some(work)
    } else if is_repository_dir(dir) {
        Some(dir.to_path_buf())
    } else {
        None
    }
}
