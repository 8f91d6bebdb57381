//! Scenario files.
//!
//! A scenario is a JSON document listing steps to run in order:
//!
//! ```json
//! {
//!   "start": 1700000000,
//!   "steps": [
//!     { "fund": { "account": "alice", "amount": "100" } },
//!     { "deposit": { "account": "alice", "amount": "10" } },
//!     { "stake": { "account": "alice", "amount": "10" } },
//!     { "add_yield": { "amount": "1" } },
//!     "harvest",
//!     { "advance": { "seconds": 86400 } }
//!   ]
//! }
//! ```
//!
//! Accounts are names; the simulator assigns each a stable id on first
//! use. Amounts are decimal strings in whole tokens (18 decimals).

use std::fmt;
use std::str::FromStr;

use bond_types::{Amount, AssetClass, Timestamp, ONE_TOKEN};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::config::default_class;

const DECIMALS: usize = 18;

/// A token amount written as a decimal string of whole tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAmount(pub Amount);

/// Error returned when parsing a [`TokenAmount`].
#[derive(Debug, thiserror::Error)]
pub enum ParseAmountError {
    /// Not a decimal number.
    #[error("invalid amount {0:?}")]
    Invalid(String),
    /// More than 18 fractional digits.
    #[error("amount {0:?} has more than 18 decimals")]
    TooPrecise(String),
    /// Larger than `u128::MAX` base units.
    #[error("amount {0:?} overflows")]
    Overflow(String),
}

impl FromStr for TokenAmount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseAmountError::Invalid(s.to_string());
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > DECIMALS {
            return Err(ParseAmountError::TooPrecise(s.to_string()));
        }
        let overflow = || ParseAmountError::Overflow(s.to_string());
        let whole: Amount = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let fraction: Amount = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = DECIMALS);
            padded.parse().map_err(|_| invalid())?
        };
        whole
            .checked_mul(ONE_TOKEN)
            .and_then(|base| base.checked_add(fraction))
            .map(TokenAmount)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE_TOKEN;
        let fraction = self.0 % ONE_TOKEN;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:0>width$}", width = DECIMALS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// A full scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Clock reading before the first step.
    #[serde(default = "default_start")]
    pub start: Timestamp,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

fn default_start() -> Timestamp {
    1_700_000_000
}

/// One scenario step.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Mint underlying to an account.
    Fund {
        account: String,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Deposit underlying into the vault.
    Deposit {
        account: String,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Redeem deposit and yield tokens.
    Redeem {
        account: String,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Stake into an asset class (`amount` zero settles only).
    Stake {
        account: String,
        #[serde(default = "default_class")]
        class: AssetClass,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Unstake from an asset class.
    Unstake {
        account: String,
        #[serde(default = "default_class")]
        class: AssetClass,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Withdraw principal, forfeiting rewards.
    EmergencyWithdraw {
        account: String,
        #[serde(default = "default_class")]
        class: AssetClass,
    },
    /// Simulate a rebase: mint underlying straight into the vault.
    AddYield {
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Harvest vault yield into the staking pool.
    Harvest,
    /// Pay protocol surplus to the fee recipient.
    CollectSurplus,
    /// Mint escrow tokens (as the owner).
    MintEscrow {
        to: String,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Commit escrow tokens to vesting.
    Vest {
        account: String,
        #[serde_as(as = "DisplayFromStr")]
        amount: TokenAmount,
    },
    /// Claim one position, or all when `index` is omitted.
    Claim {
        account: String,
        #[serde(default)]
        index: Option<usize>,
    },
    /// Move the clock forward.
    Advance { seconds: u64 },
}

impl Step {
    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Fund { .. } => "fund",
            Step::Deposit { .. } => "deposit",
            Step::Redeem { .. } => "redeem",
            Step::Stake { .. } => "stake",
            Step::Unstake { .. } => "unstake",
            Step::EmergencyWithdraw { .. } => "emergency_withdraw",
            Step::AddYield { .. } => "add_yield",
            Step::Harvest => "harvest",
            Step::CollectSurplus => "collect_surplus",
            Step::MintEscrow { .. } => "mint_escrow",
            Step::Vest { .. } => "vest",
            Step::Claim { .. } => "claim",
            Step::Advance { .. } => "advance",
        }
    }
}

impl Scenario {
    /// Parse a scenario from JSON text.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
