//! The [`RefStore`] trait defining the reference storage interface.

use buildnum_types::ObjectId;

use crate::error::{RefError, Result};
use crate::types::Head;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`). Ref names are full
/// paths (`refs/heads/main`, `refs/build-number/default`) and every write
/// is validated with [`validate_ref_name`](crate::names::validate_ref_name).
///
/// Writes are unconditional: the last writer wins. Callers that need
/// fast-forward semantics check ancestry themselves before writing.
pub trait RefStore: Send + Sync {
    /// Read a ref by its full path.
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Create or move a ref.
    fn write_ref(&self, name: &str, target: ObjectId) -> Result<()>;

    /// Delete a ref. Returns `Ok(false)` if it did not exist.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// List all refs whose path starts with `prefix`, sorted by path.
    ///
    /// Pass `""` to list all refs.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>>;

    /// Read the current HEAD state. `Ok(None)` if HEAD has never been set.
    fn head(&self) -> Result<Option<Head>>;

    /// Point HEAD at a ref path (symbolic). The ref need not exist yet.
    fn set_head(&self, target: &str) -> Result<()>;

    /// Detach HEAD at a commit id.
    fn set_head_detached(&self, target: ObjectId) -> Result<()>;

    /// Read a ref, failing with [`RefError::NotFound`] if it is absent.
    fn require_ref(&self, name: &str) -> Result<ObjectId> {
        self.read_ref(name)?.ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }
}
