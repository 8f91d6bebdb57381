//! # bond-ledger
//!
//! External collaborators consumed by the accounting engines.
//!
//! The engines never own balances or time. They are handed a [`Ledger`]
//! holding fungible balances and a [`Clock`] on every call, and consult an
//! [`AccessControl`] table before mutating anything.
//!
//! ## Modules
//!
//! - [`ledger`] — `Ledger` trait and the in-memory implementation
//! - [`clock`] — `Clock` trait, manual and wall clocks
//! - [`access`] — owner and role capability checks

pub mod access;
pub mod clock;
pub mod ledger;

pub use access::{AccessControl, AccessDenied, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{Ledger, MemoryLedger};

use bond_types::{AccountId, Amount, TokenId};

/// Error types for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The debited account does not hold enough of the token.
    #[error("insufficient {token} balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        /// Token being debited.
        token: TokenId,
        /// Account being debited.
        account: AccountId,
        /// Amount required.
        required: Amount,
        /// Amount held.
        available: Amount,
    },

    /// Supply or balance would exceed `u128::MAX`.
    #[error("arithmetic overflow in {token} balance")]
    Overflow {
        /// Token whose supply overflowed.
        token: TokenId,
    },

    /// The zero account cannot send or receive tokens.
    #[error("zero account is not a valid participant")]
    ZeroAccount,
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Fail with [`LedgerError::InsufficientBalance`] unless `account` holds at
/// least `required` of `token`.
///
/// Engines call this before mutating their own state so that a later
/// transfer cannot fail halfway through an operation.
pub fn ensure_balance<L: Ledger + ?Sized>(
    ledger: &L,
    token: &TokenId,
    account: &AccountId,
    required: Amount,
) -> Result<()> {
    let available = ledger.balance_of(token, account);
    if available < required {
        return Err(LedgerError::InsufficientBalance {
            token: token.clone(),
            account: *account,
            required,
            available,
        });
    }
    Ok(())
}

/// Fail with [`LedgerError::Overflow`] if minting `amount` more of `token`
/// would overflow its supply.
pub fn ensure_mintable<L: Ledger + ?Sized>(ledger: &L, token: &TokenId, amount: Amount) -> Result<()> {
    ledger
        .total_supply(token)
        .checked_add(amount)
        .map(|_| ())
        .ok_or_else(|| LedgerError::Overflow {
            token: token.clone(),
        })
}
