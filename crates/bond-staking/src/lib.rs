//! # bond-staking
//!
//! Pro-rata reward distribution to stakers of one or more asset classes.
//!
//! Each asset class keeps an independent reward-per-share accumulator. A
//! distribution bumps the accumulator in O(1); stakers settle lazily on
//! their next interaction.
//!
//! ## Modules
//!
//! - [`accumulator`] — reward-per-share math
//! - [`pool`] — staking pool with per-class positions

pub mod accumulator;
pub mod pool;

pub use accumulator::{PoolAccumulator, StakePosition};
pub use pool::{ClassConfig, ClassState, Distribution, StakingPool};

use bond_ledger::{AccessDenied, LedgerError};
use bond_math::MathError;
use bond_types::Amount;

/// Error types for staking operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    /// The caller lacks a required role.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AccessDenied),

    /// Zero or otherwise unusable amount, or an unrecognised asset class.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Unstake above the staked position.
    #[error("insufficient stake: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount requested.
        required: Amount,
        /// Amount staked.
        available: Amount,
    },

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fixed-point arithmetic failure.
    #[error(transparent)]
    Math(#[from] MathError),

    /// Balance movement failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience result type for staking operations.
pub type Result<T> = std::result::Result<T, StakingError>;
