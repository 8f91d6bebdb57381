//! # bond-types
//!
//! Shared domain types used across the bonding workspace: account and token
//! identifiers, asset classes, numeric constants, and the protocol event
//! records emitted by the vesting, staking and vault engines.

pub mod events;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Token quantity in base units (18 decimals for every token in the protocol).
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Fixed-point scale of reward accumulators (1e18).
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// One whole token in base units.
pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000;

/// Basis-point denominator (100% = 10,000 bps).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Length of an account identifier in bytes.
pub const ACCOUNT_ID_LEN: usize = 20;

/// An account on the ledger (a holder, a staker, or a contract's custody).
///
/// Serialized as a lowercase hex string without prefix.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; ACCOUNT_ID_LEN]);

impl AccountId {
    /// The all-zero account. Never a valid recipient.
    pub const ZERO: AccountId = AccountId([0u8; ACCOUNT_ID_LEN]);

    /// Create an account id from raw bytes.
    pub const fn new(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Whether this is the all-zero account.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ACCOUNT_ID_LEN]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Error returned when parsing an [`AccountId`] from text.
#[derive(Debug, thiserror::Error)]
pub enum ParseAccountError {
    /// The input is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded input has the wrong length.
    #[error("account id must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual decoded length.
        actual: usize,
    },
}

impl FromStr for AccountId {
    type Err = ParseAccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)?;
        let array: [u8; ACCOUNT_ID_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ParseAccountError::InvalidLength {
                    expected: ACCOUNT_ID_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }
}

/// Identifier of a fungible token held on the ledger (e.g. `"stETH"`, `"esBND"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    /// Create a token id.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// The token symbol.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An asset class eligible for staking (e.g. the yield token, an LP token).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetClass(pub String);

impl AssetClass {
    /// Create an asset class id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The class name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
