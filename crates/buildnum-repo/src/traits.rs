//! The [`Repository`] trait: everything the ledger needs from a commit graph.

use crate::error::Result;
use crate::options::{CommitOptions, CommitsOptions, RefsOptions};
use crate::sync::SyncOutcome;
use crate::types::{Commit, Reference};

/// A commit graph with named references and remotes.
///
/// Calls are synchronous and run to completion. Reference names are full
/// paths such as `refs/build-number/default`.
///
/// # Concurrency
///
/// [`commit`](Repository::commit) reads the reference tip and then writes
/// the new tip in two separate steps, with no compare-and-swap in between.
/// Two writers racing on the same reference can lose an update: the last
/// writer wins. Callers that need stronger guarantees must serialize
/// writers per reference.
pub trait Repository {
    /// The repository-wide current tip.
    ///
    /// Fails with `ReferenceNotFound` when HEAD names a reference without
    /// commits. A detached HEAD is reported with path and name `HEAD`.
    fn head(&self) -> Result<Reference>;

    /// Local references, optionally filtered by path prefix. Sorted by path.
    fn refs(&self, options: &RefsOptions) -> Result<Vec<Reference>>;

    /// References of a configured remote, read without fetching.
    fn remote_refs(&self, remote: &str, options: &RefsOptions) -> Result<Vec<Reference>>;

    /// Bytes of `file` in the tree of the commit `reference` points at.
    fn content(&self, reference: &str, file: &str) -> Result<Vec<u8>>;

    /// First-parent history from the tip of `reference`, newest first.
    ///
    /// With a header key, stops at the newest commit carrying that key and
    /// returns just that one, or nothing when no commit has it.
    fn commits(&self, reference: &str, options: &CommitsOptions) -> Result<Vec<Commit>>;

    /// Commit a single-file tree on top of `reference` and move it there.
    fn commit(
        &self,
        reference: &str,
        file: &str,
        content: &[u8],
        message: &str,
        options: &CommitOptions,
    ) -> Result<Reference>;

    /// Remove a reference. Fails with `ReferenceNotFound` if it is absent.
    fn delete(&self, reference: &str) -> Result<()>;

    /// Update local references from a remote according to `refspec`.
    fn fetch(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome>;

    /// Update remote references from local ones according to `refspec`.
    fn push(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome>;

    /// Make the remote's references under `prefix` exactly the local ones.
    ///
    /// Force-pushes every local reference under `prefix`, then deletes each
    /// remote reference under `prefix` that has no local counterpart. Stops
    /// at the first failed deletion.
    fn mirror(&self, prefix: &str, remote: &str) -> Result<SyncOutcome>;

    /// Register a remote. The first URL is used for transport.
    fn add_remote(&self, name: &str, urls: &[String]) -> Result<()>;
}

impl<R: Repository + ?Sized> Repository for Box<R> {
    fn head(&self) -> Result<Reference> {
        (**self).head()
    }

    fn refs(&self, options: &RefsOptions) -> Result<Vec<Reference>> {
        (**self).refs(options)
    }

    fn remote_refs(&self, remote: &str, options: &RefsOptions) -> Result<Vec<Reference>> {
        (**self).remote_refs(remote, options)
    }

    fn content(&self, reference: &str, file: &str) -> Result<Vec<u8>> {
        (**self).content(reference, file)
    }

    fn commits(&self, reference: &str, options: &CommitsOptions) -> Result<Vec<Commit>> {
        (**self).commits(reference, options)
    }

    fn commit(
        &self,
        reference: &str,
        file: &str,
        content: &[u8],
        message: &str,
        options: &CommitOptions,
    ) -> Result<Reference> {
        (**self).commit(reference, file, content, message, options)
    }

    fn delete(&self, reference: &str) -> Result<()> {
        (**self).delete(reference)
    }

    fn fetch(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome> {
        (**self).fetch(refspec, remote, force)
    }

    fn push(&self, refspec: &str, remote: &str, force: bool) -> Result<SyncOutcome> {
        (**self).push(refspec, remote, force)
    }

    fn mirror(&self, prefix: &str, remote: &str) -> Result<SyncOutcome> {
        (**self).mirror(prefix, remote)
    }

    fn add_remote(&self, name: &str, urls: &[String]) -> Result<()> {
        (**self).add_remote(name, urls)
    }
}
