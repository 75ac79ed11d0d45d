//! [`GitRepository`]: the adapter over a real git repository.
//!
//! Counters live as ordinary git refs next to the project's own branches,
//! so they are linked to the real HEAD and travel over git's transports.
//! Commit headers beyond the standard ones carry the ledger's
//! `{number: tip}` index; libgit2 has no API for them, so commits are
//! built as raw buffers with the headers spliced in.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use buildnum_refs::validate_remote_name;
use buildnum_types::Author;
use chrono::DateTime;
use git2::{
    Cred, CredentialType, Direction, ErrorCode, FetchOptions, ObjectType, Oid, PushOptions,
    RemoteCallbacks,
};
use tracing::{debug, info, warn};

use crate::error::{RepoError, Result};
use crate::options::{CommitOptions, CommitsOptions, RefsOptions};
use crate::sync::{RefSpec, RefUpdate, SyncOutcome};
use crate::traits::Repository;
use crate::types::{Commit, Reference};

const HEAD: &str = "HEAD";
const FILE_MODE: i32 = 0o100644;

/// Header fields git writes itself.
const STANDARD_HEADERS: &[&str] = &[
    "tree",
    "parent",
    "author",
    "committer",
    "encoding",
    "gpgsig",
    "gpgsig-sha256",
    "mergetag",
];

/// A [`Repository`] backed by libgit2.
pub struct GitRepository {
    repo: git2::Repository,
}

impl GitRepository {
    /// Open the git repository containing `path`, searching parent
    /// directories the way `git` does.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match git2::Repository::discover(path) {
            Ok(repo) => {
                debug!(path = %repo.path().display(), "discovered git repository");
                Ok(Self { repo })
            }
            Err(e) if e.code() == ErrorCode::NotFound => Err(RepoError::NotARepository {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            repo: git2::Repository::init(path)?,
        })
    }

    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            repo: git2::Repository::init_bare(path)?,
        })
    }

    /// The underlying libgit2 handle.
    pub fn git(&self) -> &git2::Repository {
        &self.repo
    }

    fn find_reference(&self, name: &str) -> Result<git2::Reference<'_>> {
        self.repo.find_reference(name).map_err(|e| match e.code() {
            ErrorCode::NotFound => RepoError::ReferenceNotFound {
                name: name.to_string(),
            },
            _ => e.into(),
        })
    }

    fn find_remote(&self, name: &str) -> Result<git2::Remote<'_>> {
        self.repo.find_remote(name).map_err(|e| match e.code() {
            ErrorCode::NotFound => RepoError::RemoteNotFound {
                name: name.to_string(),
            },
            _ => e.into(),
        })
    }

    fn tip(&self, reference: &str) -> Result<git2::Commit<'_>> {
        Ok(self.find_reference(reference)?.peel_to_commit()?)
    }

    /// Push raw refspecs, collecting what moved on the remote.
    fn push_specs(&self, remote: &str, specs: &[String]) -> Result<SyncOutcome> {
        let mut handle = self.find_remote(remote)?;
        let updates = RefCell::new(Vec::new());
        let rejected = RefCell::new(None);
        {
            let mut callbacks = remote_callbacks();
            callbacks.push_negotiation(|proposed| {
                let mut updates = updates.borrow_mut();
                for update in proposed.iter().filter(|u| u.src() != u.dst()) {
                    updates.push(RefUpdate {
                        name: update.dst_refname().unwrap_or_default().to_string(),
                        old: hex(update.src()),
                        new: hex(update.dst()),
                    });
                }
                Ok(())
            });
            callbacks.push_update_reference(|name, status| {
                if let Some(message) = status {
                    rejected
                        .borrow_mut()
                        .get_or_insert((name.to_string(), message.to_string()));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            handle
                .push(specs, Some(&mut options))
                .map_err(|e| match e.code() {
                    ErrorCode::NotFastForward => RepoError::NonFastForward {
                        reference: specs.join(" "),
                    },
                    _ => e.into(),
                })?;
        }

        if let Some((reference, message)) = rejected.into_inner() {
            debug!(reference, message, "push rejected");
            return Err(RepoError::NonFastForward { reference });
        }
        Ok(SyncOutcome::from_updates(updates.into_inner()))
    }
}

impl Repository for GitRepository {
    fn head(&self) -> Result<Reference> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Err(RepoError::ReferenceNotFound {
                    name: HEAD.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let tip = head.peel_to_commit()?.id();
        Ok(Reference::with_hash(
            head.name().unwrap_or(HEAD),
            tip.to_string(),
        ))
    }

    fn refs(&self, options: &RefsOptions) -> Result<Vec<Reference>> {
        let mut refs = Vec::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            let Some(path) = reference.name() else {
                continue;
            };
            if !path.starts_with(options.prefix()) {
                continue;
            }
            // Dangling symbolic refs have no tip to report.
            if let Some(tip) = reference.resolve().ok().and_then(|r| r.target()) {
                refs.push(Reference::with_hash(path, tip.to_string()));
            }
        }
        refs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(refs)
    }

    fn remote_refs(&self, remote: &str, options: &RefsOptions) -> Result<Vec<Reference>> {
        let mut handle = self.find_remote(remote)?;
        let connection = handle.connect_auth(Direction::Fetch, Some(remote_callbacks()), None)?;
        let mut refs: Vec<Reference> = connection
            .list()?
            .iter()
            .filter(|head| head.name() != HEAD && head.name().starts_with(options.prefix()))
            .map(|head| Reference::with_hash(head.name(), head.oid().to_string()))
            .collect();
        refs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(refs)
    }

    fn content(&self, reference: &str, file: &str) -> Result<Vec<u8>> {
        let tree = self.tip(reference)?.tree()?;
        let entry = tree.get_name(file).ok_or_else(|| RepoError::FileNotFound {
            reference: reference.to_string(),
            file: file.to_string(),
        })?;
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(blob.content().to_vec())
    }

    fn commits(&self, reference: &str, options: &CommitsOptions) -> Result<Vec<Commit>> {
        let mut next = Some(self.tip(reference)?);
        let mut history = Vec::new();
        while let Some(commit) = next {
            let headers = parse_extra_headers(commit.raw_header().unwrap_or_default());
            next = if commit.parent_count() > 0 {
                Some(commit.parent(0)?)
            } else {
                None
            };
            match &options.header_key {
                Some(key) if headers.contains_key(key) => {
                    return Ok(vec![to_commit(&commit, headers)]);
                }
                Some(_) => {}
                None => history.push(to_commit(&commit, headers)),
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
        let parent = match self.repo.find_reference(reference) {
            Ok(current) => Some(current.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let blob = self.repo.blob(content)?;
        let mut builder = self.repo.treebuilder(None)?;
        builder.insert(file, blob, FILE_MODE)?;
        let tree = self.repo.find_tree(builder.write()?)?;

        let author = options.author.clone().unwrap_or_default();
        let signature = git2::Signature::now(&author.name, &author.email)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let buffer =
            self.repo
                .commit_create_buffer(&signature, &signature, message, &tree, &parents)?;
        let raw = insert_headers(&buffer, &options.headers);
        let id = self.repo.odb()?.write(ObjectType::Commit, &raw)?;

        let summary = message.lines().next().unwrap_or_default();
        self.repo
            .reference(reference, id, true, &format!("commit: {summary}"))?;
        if options.set_head {
            self.repo.set_head(reference)?;
        }
        debug!(reference, commit = %id, "committed");
        Ok(Reference::with_hash(reference, id.to_string()))
    }

    fn delete(&self, reference: &str) -> Result<()> {
        self.find_reference(reference)?.delete()?;
        debug!(reference, "deleted reference");
        Ok(())
    }

    fn fetch(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome> {
        let spec = RefSpec::parse(refspec)?.with_force(force);
        let mut handle = self.find_remote(remote)?;
        let updates = RefCell::new(Vec::new());
        {
            let mut callbacks = remote_callbacks();
            callbacks.update_tips(|name, old, new| {
                updates.borrow_mut().push(RefUpdate {
                    name: name.to_string(),
                    old: hex(old),
                    new: hex(new),
                });
                true
            });
            let mut options = FetchOptions::new();
            options.remote_callbacks(callbacks);
            handle.fetch(&[spec.to_string()], Some(&mut options), None)?;
        }

        let outcome = SyncOutcome::from_updates(updates.into_inner());
        info!(remote, refspec = %spec, updated = outcome.updates().len(), "fetched");
        Ok(outcome)
    }

    fn push(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome> {
        let spec = RefSpec::parse(refspec)?.with_force(force);
        let outcome = self.push_specs(remote, &[spec.to_string()])?;
        info!(remote, refspec = %spec, updated = outcome.updates().len(), "pushed");
        Ok(outcome)
    }

    fn mirror(&self, prefix: &str, remote: &str) -> Result<SyncOutcome> {
        let prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        let spec = RefSpec::forced(format!("{prefix}*"), format!("{prefix}*"));
        let mut updates = self.push_specs(remote, &[spec.to_string()])?.into_updates();

        let filter = RefsOptions::with_prefix(prefix.clone());
        let local: BTreeSet<String> = self.refs(&filter)?.into_iter().map(|r| r.path).collect();
        for orphan in self.remote_refs(remote, &filter)? {
            if local.contains(&orphan.path) {
                continue;
            }
            warn!(remote, reference = %orphan.path, "pruning remote reference");
            let outcome = self
                .push_specs(remote, &[format!(":{}", orphan.path)])
                .map_err(|e| RepoError::MirrorDelete {
                    reference: orphan.path.clone(),
                    source: Box::new(e),
                })?;
            updates.extend(outcome.into_updates());
        }

        info!(remote, prefix = %prefix, updated = updates.len(), "mirrored");
        Ok(SyncOutcome::from_updates(updates))
    }

    fn add_remote(&self, name: &str, urls: &[String]) -> Result<()> {
        validate_remote_name(name)?;
        let Some((url, extra)) = urls.split_first() else {
            return Err(RepoError::InvalidRemote {
                name: name.to_string(),
                reason: "at least one url is required".into(),
            });
        };

        match self.repo.remote(name, url) {
            Ok(_) => {}
            Err(e) if e.code() == ErrorCode::Exists => {
                return Err(RepoError::RemoteAlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
        if !extra.is_empty() {
            let mut config = self.repo.config()?;
            let key = format!("remote.{name}.url");
            for url in extra {
                config.set_multivar(&key, "^$", url)?;
            }
        }
        info!(remote = name, url = %url, "added remote");
        Ok(())
    }
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.repo.path())
            .finish_non_exhaustive()
    }
}

/// Credentials from the ssh agent or the default helper.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username, allowed| {
        if allowed.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key_from_agent(username.unwrap_or("git"))
        } else {
            Cred::default()
        }
    });
    callbacks
}

fn hex(id: Oid) -> Option<String> {
    (!id.is_zero()).then(|| id.to_string())
}

fn to_commit(commit: &git2::Commit<'_>, headers: BTreeMap<String, String>) -> Commit {
    let author = commit.author();
    Commit {
        hash: commit.id().to_string(),
        author: Author::new(
            author.name().unwrap_or_default(),
            author.email().unwrap_or_default(),
        ),
        when: DateTime::from_timestamp(author.when().seconds(), 0).unwrap_or_default(),
        message: commit.message().unwrap_or_default().to_string(),
        headers,
    }
}

/// Header fields other than the ones git writes itself. Continuation
/// lines (leading space) extend the previous value.
fn parse_extra_headers(raw: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let mut current: Option<(String, String)> = None;
    let mut flush = |field: Option<(String, String)>| {
        if let Some((key, value)) = field {
            if !STANDARD_HEADERS.contains(&key.as_str()) {
                headers.insert(key, value);
            }
        }
    };

    for line in raw.lines() {
        if let Some(continued) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push('\n');
                value.push_str(continued);
            }
            continue;
        }
        flush(current.take());
        current = line
            .split_once(' ')
            .map(|(key, value)| (key.to_string(), value.to_string()));
    }
    flush(current);
    headers
}

/// Splice `headers` into a raw commit between the standard fields and the
/// blank line that starts the message.
fn insert_headers(buffer: &[u8], headers: &BTreeMap<String, String>) -> Vec<u8> {
    let split = buffer
        .windows(2)
        .position(|pair| pair == b"\n\n")
        .map(|i| i + 1)
        .unwrap_or(buffer.len());

    let mut raw = Vec::with_capacity(buffer.len() + headers.len() * 64);
    raw.extend_from_slice(&buffer[..split]);
    for (key, value) in headers {
        raw.extend_from_slice(key.as_bytes());
        raw.push(b' ');
        raw.extend_from_slice(value.replace('\n', "\n ").as_bytes());
        raw.push(b'\n');
    }
    raw.extend_from_slice(&buffer[split..]);
    raw
}
