//! # bond-vault
//!
//! Perpetual bond vault and yield harvester.
//!
//! Depositors lock a rebasing underlying (stETH) and receive deposit and
//! yield tokens 1:1. Whatever the vault holds above principal and the
//! protocol surplus is yield; a harvest routes it to the staking pool,
//! split across asset classes, with a configurable skim kept as surplus.
//!
//! ## Modules
//!
//! - [`config`] — fees, split mode and idle-yield policy
//! - [`vault`] — deposits, redemptions, fee setters and surplus collection
//! - [`harvest`] — yield measurement and distribution; harvest-first stake changes

pub mod config;
pub mod harvest;
pub mod vault;

pub use config::{IdleYieldPolicy, SplitMode, VaultConfig, MAX_MINT_FEE_BPS};
pub use harvest::{HarvestOutcome, HarvestReport};
pub use vault::BondVault;

use bond_ledger::{AccessDenied, LedgerError};
use bond_math::MathError;
use bond_staking::StakingError;

/// Error types for vault operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// The caller lacks a required role.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AccessDenied),

    /// Zero amount, out-of-range fee, or zero account.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The operation's precondition does not hold.
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(String),

    /// Failure inside the staking pool.
    #[error(transparent)]
    Staking(#[from] StakingError),

    /// Fixed-point arithmetic failure.
    #[error(transparent)]
    Math(#[from] MathError),

    /// Balance movement failure (including insufficient balance).
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
