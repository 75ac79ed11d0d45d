//! Counter values and their on-disk text form.
//!
//! An entry is stored as `<number> <hash>`: the decimal build number and
//! the hex id of the repository tip it was assigned for. Decoding accepts
//! any whitespace around and between the two fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// A decoded build number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub number: u64,
    /// Hex id of the repository tip this number was assigned for.
    pub hash: String,
}

impl Entry {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }

    /// Encode as `<number> <hash>`.
    ///
    /// Fails with `ZeroBuildNumber` for a zero number and `InvalidHash` for
    /// an empty hash.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.number == 0 {
            return Err(LedgerError::ZeroBuildNumber);
        }
        if self.hash.is_empty() {
            return Err(LedgerError::InvalidHash);
        }
        Ok(self.to_string().into_bytes())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(data);
        let mut fields = text.split_whitespace();
        let (Some(number), Some(hash)) = (fields.next(), fields.next()) else {
            return Err(LedgerError::InvalidFormat {
                content: text.into_owned(),
            });
        };
        let number = number
            .parse::<u64>()
            .map_err(|source| LedgerError::InvalidBuildNumber { source })?;
        Ok(Self::new(number, hash))
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.hash)
    }
}

/// A namespace and its current entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub entry: Entry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_uses_single_space() {
        let entry = Entry::new(42, "cafe");
        assert_eq!(entry.encode().unwrap(), b"42 cafe");
    }

    #[test]
    fn encode_rejects_zero_and_empty_hash() {
        assert!(matches!(
            Entry::new(0, "cafe").encode(),
            Err(LedgerError::ZeroBuildNumber)
        ));
        assert!(matches!(
            Entry::new(0, "").encode(),
            Err(LedgerError::ZeroBuildNumber)
        ));
        assert!(matches!(
            Entry::new(7, "").encode(),
            Err(LedgerError::InvalidHash)
        ));
    }

    #[test]
    fn decode_tolerates_whitespace() {
        let entry = Entry::decode(b"  \n12\t\t  beef \n\n").unwrap();
        assert_eq!(entry, Entry::new(12, "beef"));
    }

    #[test]
    fn decode_ignores_trailing_fields() {
        assert_eq!(Entry::decode(b"3 abc extra").unwrap(), Entry::new(3, "abc"));
    }

    #[test]
    fn decode_rejects_missing_fields() {
        for input in [&b""[..], b"   ", b"12", b" 12 \n"] {
            assert!(matches!(
                Entry::decode(input),
                Err(LedgerError::InvalidFormat { .. })
            ));
        }
    }

    #[test]
    fn decode_rejects_non_numeric_number() {
        for input in [&b"abc def"[..], b"-1 def", b"1.5 def"] {
            assert!(matches!(
                Entry::decode(input),
                Err(LedgerError::InvalidBuildNumber { .. })
            ));
        }
    }

    fn arb_entry() -> impl Strategy<Value = Entry> {
        (1..=u64::MAX, "[0-9a-f]{1,64}").prop_map(|(number, hash)| Entry::new(number, hash))
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(entry in arb_entry()) {
            let encoded = entry.encode().unwrap();
            prop_assert_eq!(Entry::decode(&encoded).unwrap(), entry);
        }

        #[test]
        fn prop_decode_ignores_padding(
            entry in arb_entry(),
            lead in "[ \t\n]{0,4}",
            mid in "[ \t\n]{1,4}",
            tail in "[ \t\n]{0,4}",
        ) {
            let padded = format!("{lead}{}{mid}{}{tail}", entry.number, entry.hash);
            prop_assert_eq!(Entry::decode(padded.as_bytes()).unwrap(), entry);
        }
    }
}
