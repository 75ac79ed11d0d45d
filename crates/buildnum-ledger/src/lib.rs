//! Build number ledger.
//!
//! Keeps any number of independent counters ("namespaces") in a buildnum
//! repository. Every change is a commit on the namespace's reference, so the
//! full history of a counter is auditable and can be pushed to, fetched
//! from, or mirrored onto a remote with the repository's own transport.
//!
//! ```no_run
//! use buildnum_ledger::BuildNumber;
//! use buildnum_repo::{Author, GraphRepository};
//!
//! let ledger = BuildNumber::new(GraphRepository::open(".")?);
//! let (entry, updated) = ledger.inc("android", &Author::default(), false)?;
//! println!("{} (updated: {updated})", entry.number);
//! # Ok::<(), buildnum_ledger::LedgerError>(())
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod ledger;

pub use config::LedgerConfig;
pub use entry::{Entry, Namespace};
pub use error::{LedgerError, Result};
pub use ledger::BuildNumber;
