//! Single-use reference keys for payment discovery.
//!
//! A reference is a random 32-byte value in base58 public-key form. Wallets
//! include it as a read-only account in the payment transaction, which makes
//! the payment discoverable by a signature lookup on the reference instead of
//! a scan of the recipient's history.

use rand::RngExt;
use rand::rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_pubkey::{ParsePubkeyError, Pubkey};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The reference key of one payment request.
///
/// Each reference is drawn fresh from the process CSPRNG and must never be
/// reused across requests: the watcher treats the first transaction that
/// mentions the reference as the payment, with no further ranking.
///
/// # Serialization
///
/// Serialized as the base58 string form, the same form embedded in payment
/// URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference(Pubkey);

impl Reference {
    /// Generates a fresh reference from 32 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rng().random();
        Self(Pubkey::new_from_array(bytes))
    }

    /// Returns the reference as a ledger account key.
    #[must_use]
    pub const fn as_pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl From<Pubkey> for Reference {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Reference> for Pubkey {
    fn from(reference: Reference) -> Self {
        reference.0
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Reference {
    type Err = ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s).map(Self)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_is_unique() {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            assert!(seen.insert(Reference::generate()));
        }
    }

    #[test]
    fn test_display_parses_back() {
        let reference = Reference::generate();
        let parsed = Reference::from_str(&reference.to_string()).unwrap();
        assert_eq!(reference, parsed);
    }

    #[test]
    fn test_from_str_rejects_invalid_base58() {
        assert!(Reference::from_str("not-a-key").is_err());
        assert!(Reference::from_str("").is_err());
        // 0, O, I, and l are outside the base58 alphabet.
        assert!(Reference::from_str("O0Il").is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let reference = Reference::generate();
        let json = serde_json::to_string(&reference).unwrap();
        let back: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(reference, back);
    }
}
