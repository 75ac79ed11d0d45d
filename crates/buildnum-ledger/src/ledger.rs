//! [`BuildNumber`]: named counters kept as commits in a [`Repository`].
//!
//! Namespace `N` is the reference `<ref_root>/N`. Each write commits a
//! single file holding the encoded [`Entry`] and tags the commit with a
//! header `{number: tip hash}`, so the tip a number was assigned for can be
//! found again without decoding file content.

use buildnum_repo::{
    validate_ref_name, Author, CommitOptions, CommitsOptions, RefsOptions, Repository,
    SyncOutcome,
};
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::entry::{Entry, Namespace};
use crate::error::{LedgerError, Result};

/// The build number ledger over a repository.
#[derive(Debug)]
pub struct BuildNumber<R> {
    repository: R,
    config: LedgerConfig,
}

impl<R: Repository> BuildNumber<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, LedgerConfig::default())
    }

    pub fn with_config(repository: R, config: LedgerConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Reference path for a namespace.
    fn reference(&self, namespace: &str) -> Result<String> {
        let invalid = |reason: String| LedgerError::InvalidNamespace {
            name: namespace.to_string(),
            reason,
        };
        if namespace.is_empty() {
            return Err(invalid("namespace must not be empty".into()));
        }
        if namespace.contains('/') {
            return Err(invalid("namespace must not contain '/'".into()));
        }
        let path = format!("{}/{namespace}", self.config.ref_root);
        validate_ref_name(&path).map_err(|e| invalid(e.to_string()))?;
        Ok(path)
    }

    fn head_hash(&self) -> Result<String> {
        match self.repository.head() {
            Ok(head) => Ok(head.hash),
            Err(e) if e.is_reference_not_found() => Err(LedgerError::NoHead { source: Some(e) }),
            Err(e) => Err(e.into()),
        }
    }

    /// Current entry of a namespace.
    ///
    /// A namespace that was never written fails with `BuildNumberNotFound`,
    /// unless `create` is set, in which case number 1 is assigned.
    pub fn get(&self, namespace: &str, author: &Author, create: bool) -> Result<Entry> {
        let reference = self.reference(namespace)?;
        match self.repository.content(&reference, &self.config.file_name) {
            Ok(content) => Entry::decode(&content),
            Err(e) if e.is_reference_not_found() => {
                if create {
                    self.set(namespace, author, 1)
                } else {
                    Err(LedgerError::BuildNumberNotFound { source: Some(e) })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Assign `number` to a namespace, linked to the repository tip.
    pub fn set(&self, namespace: &str, author: &Author, number: u64) -> Result<Entry> {
        let reference = self.reference(namespace)?;
        let entry = Entry::new(number, self.head_hash()?);
        let content = entry.encode()?;
        let message = format!("Set build number to {number} for {}\n", entry.hash);
        let options = CommitOptions::new()
            .with_author(author.clone())
            .with_header(number.to_string(), entry.hash.clone());

        self.repository.commit(
            &reference,
            &self.config.file_name,
            &content,
            &message,
            &options,
        )?;
        info!(namespace, number, hash = %entry.hash, "build number set");
        Ok(entry)
    }

    /// Advance a namespace to the next number.
    ///
    /// Returns the resulting entry and whether it changed. When the entry is
    /// already linked to the current tip nothing is written unless `force`
    /// is set.
    pub fn inc(&self, namespace: &str, author: &Author, force: bool) -> Result<(Entry, bool)> {
        let entry = self.get(namespace, author, true)?;
        if self.head_hash()? == entry.hash && !force {
            debug!(namespace, number = entry.number, "build number already current");
            return Ok((entry, false));
        }

        let next = entry
            .number
            .checked_add(1)
            .ok_or(LedgerError::NumberOverflow {
                number: entry.number,
            })?;
        Ok((self.set(namespace, author, next)?, true))
    }

    /// The entry that assigned `number` in a namespace.
    pub fn hash(&self, namespace: &str, number: u64) -> Result<Entry> {
        let reference = self.reference(namespace)?;
        let key = number.to_string();
        let commits = match self
            .repository
            .commits(&reference, &CommitsOptions::with_header_key(key.clone()))
        {
            Ok(commits) => commits,
            Err(e) if e.is_reference_not_found() => {
                return Err(LedgerError::BuildNumberNotFound { source: Some(e) })
            }
            Err(e) => return Err(e.into()),
        };

        match commits.as_slice() {
            [commit] => commit
                .header(&key)
                .map(|hash| Entry::new(number, hash))
                .ok_or(LedgerError::BuildNumberNotFound { source: None }),
            _ => Err(LedgerError::BuildNumberNotFound { source: None }),
        }
    }

    /// Delete namespaces in order, stopping at the first failure.
    pub fn delete<I, S>(&self, namespaces: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for namespace in namespaces {
            let namespace = namespace.as_ref();
            self.repository.delete(&self.reference(namespace)?)?;
            info!(namespace, "namespace deleted");
        }
        Ok(())
    }

    /// Delete every namespace.
    pub fn clear(&self) -> Result<()> {
        let namespaces = self.namespaces()?;
        self.delete(namespaces.iter().map(|ns| ns.name.as_str()))
    }

    /// All namespaces with their current entries, sorted by name.
    pub fn namespaces(&self) -> Result<Vec<Namespace>> {
        let refs = self
            .repository
            .refs(&RefsOptions::with_prefix(self.config.prefix()))?;

        let mut namespaces = refs
            .into_iter()
            .map(|reference| {
                let entry = self.get(&reference.name, &Author::default(), false)?;
                Ok(Namespace {
                    name: reference.name,
                    entry,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(namespaces)
    }

    /// Make the remote's namespaces exactly the local ones.
    pub fn mirror(&self, remote: &str) -> Result<SyncOutcome> {
        Ok(self.repository.mirror(&self.config.prefix(), remote)?)
    }

    /// Force-push every namespace to a remote.
    pub fn push(&self, remote: &str) -> Result<SyncOutcome> {
        Ok(self.repository.push(&self.config.pattern(), remote, true)?)
    }

    /// Force-fetch every namespace from a remote.
    pub fn fetch(&self, remote: &str) -> Result<SyncOutcome> {
        Ok(self.repository.fetch(&self.config.pattern(), remote, true)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildnum_repo::{GitRepository, GraphRepository, RepoError, DEFAULT_HEAD};

    const NS: &str = "default";

    fn author() -> Author {
        Author::new("build number", "not set")
    }

    /// Move the repository tip, as a code commit would.
    fn advance_head(repo: &GraphRepository, message: &str) -> String {
        repo.commit(
            DEFAULT_HEAD,
            "README",
            message.as_bytes(),
            message,
            &CommitOptions::new().with_head(),
        )
        .unwrap()
        .hash
    }

    fn ledger() -> (BuildNumber<GraphRepository>, String) {
        let repo = GraphRepository::in_memory();
        let tip = advance_head(&repo, "initial");
        (BuildNumber::new(repo), tip)
    }

    fn with_remote(ledger: &BuildNumber<GraphRepository>) -> (tempfile::TempDir, GraphRepository) {
        let dir = tempfile::tempdir().unwrap();
        let remote = GraphRepository::init_bare(dir.path()).unwrap();
        ledger
            .repository()
            .add_remote("origin", &[dir.path().display().to_string()])
            .unwrap();
        (dir, remote)
    }

    fn names(ledger: &BuildNumber<GraphRepository>) -> Vec<String> {
        ledger
            .namespaces()
            .unwrap()
            .into_iter()
            .map(|ns| ns.name)
            .collect()
    }

    // ---- get ----

    #[test]
    fn get_with_create_assigns_one() {
        let (ledger, tip) = ledger();
        let entry = ledger.get(NS, &author(), true).unwrap();
        assert_eq!(entry, Entry::new(1, tip));
        assert_eq!(ledger.get(NS, &author(), false).unwrap().number, 1);
    }

    #[test]
    fn get_without_create_is_not_found() {
        let (ledger, _) = ledger();
        let err = ledger.get(NS, &author(), false).unwrap_err();
        assert!(err.is_build_number_not_found());
        assert!(err.repo_error().unwrap().is_reference_not_found());
    }

    #[test]
    fn get_rejects_malformed_content() {
        let (ledger, _) = ledger();
        ledger
            .repository()
            .commit(
                "refs/build-number/broken",
                "build-number",
                b"garbage",
                "broken",
                &CommitOptions::default(),
            )
            .unwrap();
        assert!(matches!(
            ledger.get("broken", &author(), false),
            Err(LedgerError::InvalidFormat { .. })
        ));
        assert!(matches!(
            ledger.namespaces(),
            Err(LedgerError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn invalid_namespaces_are_rejected() {
        let (ledger, _) = ledger();
        for bad in ["", "a/b", "bad..name", "with space"] {
            assert!(
                matches!(
                    ledger.get(bad, &author(), true),
                    Err(LedgerError::InvalidNamespace { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    // ---- set ----

    #[test]
    fn set_commits_entry_with_header_and_message() {
        let (ledger, tip) = ledger();
        let entry = ledger.set("android", &author(), 41).unwrap();
        assert_eq!(entry, Entry::new(41, tip.clone()));

        let history = ledger
            .repository()
            .commits("refs/build-number/android", &CommitsOptions::default())
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, format!("Set build number to 41 for {tip}\n"));
        assert_eq!(history[0].header("41"), Some(tip.as_str()));
        assert_eq!(history[0].author, author());
        assert_eq!(
            ledger
                .repository()
                .content("refs/build-number/android", "build-number")
                .unwrap(),
            format!("41 {tip}").into_bytes()
        );
    }

    #[test]
    fn set_zero_is_rejected() {
        let (ledger, _) = ledger();
        assert!(matches!(
            ledger.set(NS, &author(), 0),
            Err(LedgerError::ZeroBuildNumber)
        ));
        assert!(ledger.get(NS, &author(), false).is_err());
    }

    #[test]
    fn set_without_head_is_no_head() {
        let ledger = BuildNumber::new(GraphRepository::in_memory());
        let err = ledger.set(NS, &author(), 5).unwrap_err();
        assert!(matches!(err, LedgerError::NoHead { .. }));
        assert!(err.repo_error().unwrap().is_reference_not_found());
        assert!(matches!(
            ledger.inc(NS, &author(), false),
            Err(LedgerError::NoHead { .. })
        ));
    }

    // ---- inc ----

    #[test]
    fn inc_on_fresh_namespace_creates_without_update() {
        let (ledger, _) = ledger();
        let (entry, updated) = ledger.inc(NS, &author(), false).unwrap();
        assert_eq!(entry.number, 1);
        assert!(!updated);

        let (again, updated) = ledger.inc(NS, &author(), false).unwrap();
        assert_eq!(again, entry);
        assert!(!updated);

        let (forced, updated) = ledger.inc(NS, &author(), true).unwrap();
        assert_eq!(forced.number, 2);
        assert!(updated);
    }

    #[test]
    fn inc_follows_new_tip() {
        let (ledger, _) = ledger();
        ledger.inc(NS, &author(), false).unwrap();
        let tip = advance_head(ledger.repository(), "feature");

        let (entry, updated) = ledger.inc(NS, &author(), false).unwrap();
        assert!(updated);
        assert_eq!(entry, Entry::new(2, tip));
    }

    #[test]
    fn inc_at_max_overflows() {
        let (ledger, _) = ledger();
        ledger.set(NS, &author(), u64::MAX).unwrap();
        assert!(matches!(
            ledger.inc(NS, &author(), true),
            Err(LedgerError::NumberOverflow { number: u64::MAX })
        ));
    }

    // ---- hash ----

    #[test]
    fn hash_finds_assigning_tip() {
        let (ledger, first_tip) = ledger();
        let set = ledger.set(NS, &author(), 123).unwrap();
        advance_head(ledger.repository(), "later");
        ledger.inc(NS, &author(), false).unwrap();

        let found = ledger.hash(NS, 123).unwrap();
        assert_eq!(found, set);
        assert_eq!(found.hash, first_tip);

        assert!(ledger.hash(NS, 999).unwrap_err().is_build_number_not_found());
    }

    #[test]
    fn hash_on_missing_namespace_is_not_found() {
        let (ledger, _) = ledger();
        let err = ledger.hash("nope", 1).unwrap_err();
        assert!(err.is_build_number_not_found());
        assert!(err.repo_error().is_some());
    }

    // ---- namespaces / delete / clear ----

    #[test]
    fn namespaces_sorted_with_entries() {
        let (ledger, tip) = ledger();
        ledger.set("zeta", &author(), 3).unwrap();
        ledger.set("alpha", &author(), 7).unwrap();

        let listed = ledger.namespaces().unwrap();
        assert_eq!(
            listed,
            vec![
                Namespace {
                    name: "alpha".into(),
                    entry: Entry::new(7, tip.clone()),
                },
                Namespace {
                    name: "zeta".into(),
                    entry: Entry::new(3, tip),
                },
            ]
        );
    }

    #[test]
    fn namespaces_ignore_other_refs() {
        let (ledger, _) = ledger();
        ledger.set("a", &author(), 1).unwrap();
        assert_eq!(names(&ledger), ["a"]);
    }

    #[test]
    fn delete_removes_only_named_namespace() {
        let (ledger, _) = ledger();
        ledger.set("a", &author(), 1).unwrap();
        ledger.set("b", &author(), 2).unwrap();

        ledger.delete(["a"]).unwrap();
        let listed = ledger.namespaces().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "b");
        assert_eq!(listed[0].entry.number, 2);
    }

    #[test]
    fn delete_stops_at_first_failure() {
        let (ledger, _) = ledger();
        ledger.set("a", &author(), 1).unwrap();
        ledger.set("c", &author(), 1).unwrap();

        let err = ledger.delete(["a", "missing", "c"]).unwrap_err();
        assert!(err.repo_error().unwrap().is_reference_not_found());
        assert_eq!(names(&ledger), ["c"]);
    }

    #[test]
    fn clear_removes_everything() {
        let (ledger, _) = ledger();
        for ns in ["a", "b", "c"] {
            ledger.set(ns, &author(), 1).unwrap();
        }
        ledger.clear().unwrap();
        assert!(ledger.namespaces().unwrap().is_empty());
        ledger.repository().head().unwrap();
    }

    // ---- remotes ----

    #[test]
    fn push_and_fetch_without_remote_fail() {
        let (ledger, _) = ledger();
        ledger.set(NS, &author(), 1).unwrap();

        for result in [ledger.push("origin"), ledger.fetch("origin"), ledger.mirror("origin")] {
            let err = result.unwrap_err();
            assert!(matches!(
                err.repo_error(),
                Some(RepoError::RemoteNotFound { .. })
            ));
        }
        assert_eq!(names(&ledger), [NS]);
    }

    #[test]
    fn push_then_fetch_into_another_clone() {
        let (ledger, _) = ledger();
        let (remote_dir, _remote) = with_remote(&ledger);
        ledger.set(NS, &author(), 10).unwrap();
        assert!(!ledger.push("origin").unwrap().is_up_to_date());

        let (other, _) = self::ledger();
        other
            .repository()
            .add_remote("origin", &[remote_dir.path().display().to_string()])
            .unwrap();
        other.fetch("origin").unwrap();
        assert_eq!(other.get(NS, &author(), false).unwrap().number, 10);

        let (entry, updated) = other.inc(NS, &author(), false).unwrap();
        assert!(updated);
        assert_eq!(entry.number, 11);
    }

    #[test]
    fn push_overwrites_diverged_remote() {
        let (ledger, _) = ledger();
        let (_dir, remote) = with_remote(&ledger);
        let remote_ledger = BuildNumber::new(remote);
        advance_head(remote_ledger.repository(), "remote tip");
        remote_ledger.set(NS, &author(), 99).unwrap();

        ledger.set(NS, &author(), 5).unwrap();
        ledger.push("origin").unwrap();
        assert_eq!(remote_ledger.get(NS, &author(), false).unwrap().number, 5);
    }

    #[test]
    fn mirror_replaces_remote_namespace_set() {
        let (ledger, _) = ledger();
        let (_dir, remote) = with_remote(&ledger);
        let remote_ledger = BuildNumber::new(remote);
        advance_head(remote_ledger.repository(), "remote tip");
        remote_ledger.set("z", &author(), 4).unwrap();

        ledger.set("x", &author(), 1).unwrap();
        ledger.set("y", &author(), 2).unwrap();
        ledger.mirror("origin").unwrap();

        assert_eq!(names(&remote_ledger), ["x", "y"]);
        assert_eq!(names(&ledger), ["x", "y"]);
    }

    // ---- git backend ----

    #[test]
    fn counters_over_git_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GitRepository::init(dir.path()).unwrap();
        assert!(matches!(
            BuildNumber::new(GitRepository::open(dir.path()).unwrap()).set(NS, &author(), 1),
            Err(LedgerError::NoHead { .. })
        ));

        let first = repo
            .commit(DEFAULT_HEAD, "README", b"a", "a", &CommitOptions::new().with_head())
            .unwrap()
            .hash;
        let ledger = BuildNumber::new(repo);
        let (entry, updated) = ledger.inc(NS, &author(), false).unwrap();
        assert_eq!((entry.number, updated), (1, false));
        assert_eq!(entry.hash, first);

        let second = ledger
            .repository()
            .commit(DEFAULT_HEAD, "README", b"b", "b", &CommitOptions::new().with_head())
            .unwrap()
            .hash;
        let (entry, updated) = ledger.inc(NS, &author(), false).unwrap();
        assert_eq!((entry.number, updated), (2, true));
        assert_eq!(ledger.hash(NS, 1).unwrap().hash, first);
        assert_eq!(ledger.hash(NS, 2).unwrap().hash, second);
        assert!(ledger.hash(NS, 3).unwrap_err().is_build_number_not_found());
    }
}
