//! Where the ledger keeps its references, and how a repository's `[ledger]` section overrides that.

use buildnum_repo::LedgerSection;

/// Where the ledger keeps its references and which file each one tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Namespace `N` lives at `<ref_root>/N`.
    pub ref_root: String,
    /// File name holding the encoded entry in each commit.
    pub file_name: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ref_root: "refs/build-number".to_string(),
            file_name: "build-number".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by a repository's `[ledger]` section.
    pub fn from_section(section: Option<&LedgerSection>) -> Self {
        let defaults = Self::default();
        let Some(section) = section else {
            return defaults;
        };
        Self {
            ref_root: section
                .ref_root
                .as_deref()
                .map(|root| root.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ref_root),
            file_name: section.file_name.clone().unwrap_or(defaults.file_name),
        }
    }

    /// Prefix shared by every namespace reference, with trailing `/`.
    pub fn prefix(&self) -> String {
        format!("{}/", self.ref_root)
    }

    /// `<ref_root>/*`, matching every namespace.
    pub fn pattern(&self) -> String {
        format!("{}/*", self.ref_root)
    }
}
