use buildnum_types::ObjectId;
use serde::{Deserialize, Serialize};

/// The state of HEAD: either symbolic (naming a ref) or detached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    /// HEAD names a ref by its full path, e.g. `refs/heads/main`.
    Symbolic(String),
    /// HEAD points directly at a commit.
    Detached(ObjectId),
}

impl Head {
    /// Text stored in an on-disk `HEAD` file.
    pub fn to_file_contents(&self) -> String {
        match self {
            Head::Symbolic(target) => format!("ref: {target}\n"),
            Head::Detached(id) => format!("{id}\n"),
        }
    }
}
