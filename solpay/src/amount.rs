//! Exact decimal SOL amounts.
//!
//! Payment confirmation compares the requested amount against observed
//! balance changes for exact equality, so amounts are held as decimals end
//! to end. Binary floating point never enters: `0.1 + 0.2` style drift would
//! make an honest payment fail validation.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Number of lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal places of one lamport.
const SOL_SCALE: u32 = 9;

/// Errors from parsing an untrusted amount string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a plain decimal number.
    #[error("'{0}' is not a decimal number")]
    Unparsable(String),

    /// The input parsed but is zero or negative.
    #[error("amount must be strictly positive, got {0}")]
    NotPositive(Decimal),
}

/// An exact decimal SOL quantity.
///
/// [`Amount::parse`] is the gate for untrusted input and only admits strictly
/// positive values. Observed on-ledger credits enter through
/// [`Amount::from_lamports`]. Equality is numeric, so `0.2` equals
/// `0.200000000`.
///
/// # Serialization
///
/// Serialized as the normalized decimal string (`"0.2"`, not `"0.200000000"`),
/// the same form embedded in payment URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Parses an untrusted amount string.
    ///
    /// Accepts plain decimal notation only. Scientific notation, infinities,
    /// `NaN`, and anything non-numeric are rejected, as are zero and negative
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Unparsable`] if the input is not a decimal
    /// number, or [`AmountError::NotPositive`] if it is not strictly positive.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let value = Decimal::from_str(input.trim())
            .map_err(|_| AmountError::Unparsable(input.to_owned()))?;
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Converts a raw lamport count into a SOL amount.
    #[must_use]
    pub fn from_lamports(lamports: u64) -> Self {
        Self(Decimal::from_i128_with_scale(i128::from(lamports), SOL_SCALE))
    }

    /// Returns the amount as its exact decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
