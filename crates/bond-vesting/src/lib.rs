//! # bond-vesting
//!
//! Linear vesting of escrowed tokens into liquid tokens.
//!
//! Holders commit escrow tokens to a vesting position. The position unlocks
//! linearly over a fixed duration; unlocked value is released by burning the
//! escrow tokens held in custody and minting the same amount of the liquid
//! token to the holder.
//!
//! ## Modules
//!
//! - [`position`] — per-position accrual math
//! - [`escrow`] — the vesting ledger and escrow token roles

pub mod escrow;
pub mod position;

pub use escrow::{VestOutcome, VestingConfig, VestingLedger, VestingStrategy};
pub use position::VestingPosition;

use bond_ledger::{AccessDenied, LedgerError};
use bond_math::MathError;
use bond_types::AccountId;

/// Error types for vesting operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VestingError {
    /// The caller lacks a required role.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AccessDenied),

    /// Zero amount where a positive one is required, or an unknown position.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// No position exists at the given index.
    #[error("no vesting position {index} for {holder}")]
    UnknownPosition {
        /// Holder that was looked up.
        holder: AccountId,
        /// Requested index.
        index: usize,
    },

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fixed-point arithmetic failure.
    #[error(transparent)]
    Math(#[from] MathError),

    /// Balance movement failure (including insufficient balance).
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience result type for vesting operations.
pub type Result<T> = std::result::Result<T, VestingError>;
