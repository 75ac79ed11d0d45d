//! Ref synchronization between two object graphs.
//!
//! A transfer walks from each source tip, copies every object the
//! destination lacks (dependencies before the objects that point at them),
//! and then moves the destination ref. Push and fetch are the same transfer
//! run in opposite directions.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use buildnum_refs::RefStore;
use buildnum_store::{CommitObject, ObjectKind, ObjectStore, StoredObject, Tree};
use buildnum_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RepoError, Result};

const GLOB: char = '*';

/// A refspec mapping source refs to destination refs.
///
/// Parsed from `[+]src[:dst]`. `src` and `dst` may both end in a single
/// `*`; an empty `src` deletes `dst`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSpec {
    pub src: String,
    pub dst: String,
    pub force: bool,
}

impl RefSpec {
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force: false,
        }
    }

    pub fn forced(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            force: true,
            ..Self::new(src, dst)
        }
    }

    /// A spec that deletes `dst` on the destination.
    pub fn delete(dst: impl Into<String>) -> Self {
        Self::forced("", dst)
    }

    /// Parse `"+refs/build-number/*:refs/build-number/*"`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| RepoError::InvalidRefSpec {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let (force, rest) = match s.strip_prefix('+') {
            Some(stripped) => (true, stripped),
            None => (false, s),
        };
        let (src, dst) = match rest.split_once(':') {
            Some((src, dst)) => (src, dst),
            None => (rest, rest),
        };
        if dst.is_empty() {
            return Err(invalid("missing destination"));
        }
        for side in [src, dst] {
            if side.trim_end_matches(GLOB).contains(GLOB) || side.ends_with("**") {
                return Err(invalid("'*' is only allowed once, at the end"));
            }
        }
        if !src.is_empty() && src.ends_with(GLOB) != dst.ends_with(GLOB) {
            return Err(invalid("source and destination must both be patterns"));
        }
        if src.is_empty() && dst.ends_with(GLOB) {
            return Err(invalid("cannot delete a pattern"));
        }

        Ok(Self {
            src: src.to_string(),
            dst: dst.to_string(),
            force,
        })
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force |= force;
        self
    }

    pub fn is_delete(&self) -> bool {
        self.src.is_empty()
    }

    pub fn is_pattern(&self) -> bool {
        self.src.ends_with(GLOB)
    }

    /// Pair each matching source ref with its destination name.
    fn expand(&self, source: &dyn RefStore) -> Result<Vec<(String, ObjectId)>> {
        if !self.is_pattern() {
            let tip = source.require_ref(&self.src)?;
            return Ok(vec![(self.dst.clone(), tip)]);
        }

        let src_prefix = self.src.trim_end_matches(GLOB);
        let dst_prefix = self.dst.trim_end_matches(GLOB);
        Ok(source
            .list_refs(src_prefix)?
            .into_iter()
            .map(|(name, tip)| (format!("{dst_prefix}{}", &name[src_prefix.len()..]), tip))
            .collect())
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.force {
            f.write_str("+")?;
        }
        write!(f, "{}:{}", self.src, self.dst)
    }
}

/// One destination ref that moved. Ids are hex, whatever the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefUpdate {
    pub name: String,
    /// `None` when the ref was created.
    pub old: Option<String>,
    /// `None` when the ref was deleted.
    pub new: Option<String>,
}

impl RefUpdate {
    pub fn is_delete(&self) -> bool {
        self.new.is_none()
    }
}

fn short(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

impl fmt::Display for RefUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (_, None) => write!(f, "[deleted] {}", self.name),
            (None, Some(new)) => write!(f, "[new] {} -> {}", short(new), self.name),
            (Some(old), Some(new)) => {
                write!(f, "{}..{} {}", short(old), short(new), self.name)
            }
        }
    }
}

/// Result of a transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to do.
    #[default]
    UpToDate,
    Updated(Vec<RefUpdate>),
}

impl SyncOutcome {
    pub fn from_updates(updates: Vec<RefUpdate>) -> Self {
        if updates.is_empty() {
            SyncOutcome::UpToDate
        } else {
            SyncOutcome::Updated(updates)
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        matches!(self, SyncOutcome::UpToDate)
    }

    pub fn updates(&self) -> &[RefUpdate] {
        match self {
            SyncOutcome::UpToDate => &[],
            SyncOutcome::Updated(updates) => updates,
        }
    }

    pub fn into_updates(self) -> Vec<RefUpdate> {
        match self {
            SyncOutcome::UpToDate => Vec::new(),
            SyncOutcome::Updated(updates) => updates,
        }
    }
}

/// One side of a transfer.
#[derive(Clone, Copy)]
pub struct Endpoint<'a> {
    pub objects: &'a dyn ObjectStore,
    pub refs: &'a dyn RefStore,
}

/// Apply `spec` from `source` to `destination`.
pub fn transfer(source: Endpoint<'_>, destination: Endpoint<'_>, spec: &RefSpec) -> Result<SyncOutcome> {
    if spec.is_delete() {
        let old = destination.refs.read_ref(&spec.dst)?;
        if !destination.refs.delete_ref(&spec.dst)? {
            return Ok(SyncOutcome::UpToDate);
        }
        debug!(reference = %spec.dst, "remote ref deleted");
        return Ok(SyncOutcome::Updated(vec![RefUpdate {
            name: spec.dst.clone(),
            old: old.map(|id| id.to_hex()),
            new: None,
        }]));
    }

    let mut updates = Vec::new();
    for (name, tip) in spec.expand(source.refs)? {
        let old = destination.refs.read_ref(&name)?;
        if old == Some(tip) {
            continue;
        }
        if let Some(old) = old {
            if !spec.force && !is_ancestor(source.objects, &old, &tip)? {
                return Err(RepoError::NonFastForward { reference: name });
            }
        }

        let copied = copy_missing(source.objects, destination.objects, tip)?;
        destination.refs.write_ref(&name, tip)?;
        debug!(reference = %name, tip = %tip.short_hex(), objects = copied, "ref transferred");
        updates.push(RefUpdate {
            name,
            old: old.map(|id| id.to_hex()),
            new: Some(tip.to_hex()),
        });
    }
    Ok(SyncOutcome::from_updates(updates))
}

/// Make the refs under `prefix` in `destination` match `source`.
///
/// Every source ref is force-transferred, then destination refs the source
/// lacks are deleted one at a time. The first failed delete stops the prune
/// and is reported as [`RepoError::MirrorDelete`]; refs after it are left in
/// place.
pub fn mirror(source: Endpoint<'_>, destination: Endpoint<'_>, prefix: &str) -> Result<SyncOutcome> {
    let prefix = if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };

    let spec = RefSpec::forced(format!("{prefix}*"), format!("{prefix}*"));
    let mut updates = transfer(source, destination, &spec)?.into_updates();

    let kept: BTreeSet<String> = source
        .refs
        .list_refs(&prefix)?
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    for (path, _) in destination.refs.list_refs(&prefix)? {
        if kept.contains(&path) {
            continue;
        }
        warn!(reference = %path, "pruning remote reference");
        let outcome = transfer(source, destination, &RefSpec::delete(path.clone())).map_err(|e| {
            RepoError::MirrorDelete {
                reference: path,
                source: Box::new(e),
            }
        })?;
        updates.extend(outcome.into_updates());
    }
    Ok(SyncOutcome::from_updates(updates))
}

/// Ids an object points at.
fn children(object: &StoredObject) -> Result<Vec<ObjectId>> {
    Ok(match object.kind {
        ObjectKind::Blob => Vec::new(),
        ObjectKind::Tree => Tree::from_stored_object(object)?
            .entries
            .iter()
            .map(|entry| entry.object_id)
            .collect(),
        ObjectKind::Commit => {
            let commit = CommitObject::from_stored_object(object)?;
            std::iter::once(commit.tree).chain(commit.parents).collect()
        }
    })
}

/// Copy every object reachable from `tip` that `to` lacks. Returns the
/// number of objects written.
///
/// An object already present in `to` is assumed to have its whole closure
/// there as well, which holds because objects are only ever written after
/// their dependencies.
fn copy_missing(from: &dyn ObjectStore, to: &dyn ObjectStore, tip: ObjectId) -> Result<usize> {
    let mut loaded: HashMap<ObjectId, StoredObject> = HashMap::new();
    let mut order = Vec::new();
    let mut stack = vec![(tip, false)];

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if loaded.contains_key(&id) || to.exists(&id)? {
            continue;
        }
        let object = from.require(&id)?;
        stack.push((id, true));
        stack.extend(children(&object)?.into_iter().map(|child| (child, false)));
        loaded.insert(id, object);
    }

    for id in &order {
        if let Some(object) = loaded.get(id) {
            to.write(object)?;
        }
    }
    Ok(order.len())
}

/// True when `ancestor` is reachable from `descendant` through parent links.
pub fn is_ancestor(objects: &dyn ObjectStore, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([*descendant]);
    while let Some(id) = queue.pop_front() {
        if id == *ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            continue;
        }
        queue.extend(objects.read_commit(&id)?.parents);
    }
    Ok(false)
}
