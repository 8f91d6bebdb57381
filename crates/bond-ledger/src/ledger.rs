//! Fungible balance ledger.

use std::collections::BTreeMap;

use bond_types::{AccountId, Amount, TokenId};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result};

/// Fungible balances for any number of tokens.
///
/// Implementations must apply each call atomically: a failed `transfer`,
/// `mint` or `burn` leaves every balance unchanged.
pub trait Ledger {
    /// Balance of `account` in `token`.
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> Amount;

    /// Total supply of `token`.
    fn total_supply(&self, token: &TokenId) -> Amount;

    /// Move `amount` of `token` from `from` to `to`.
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Create `amount` of `token` in `to`.
    fn mint(&mut self, token: &TokenId, to: &AccountId, amount: Amount) -> Result<()>;

    /// Destroy `amount` of `token` held by `from`.
    fn burn(&mut self, token: &TokenId, from: &AccountId, amount: Amount) -> Result<()>;
}

/// In-memory ledger backing tests and the scenario runner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLedger {
    balances: BTreeMap<TokenId, BTreeMap<AccountId, Amount>>,
    supply: BTreeMap<TokenId, Amount>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-zero balance of `token`, ordered by account.
    pub fn holders(&self, token: &TokenId) -> Vec<(AccountId, Amount)> {
        self.balances
            .get(token)
            .map(|accounts| {
                accounts
                    .iter()
                    .filter(|(_, amount)| **amount > 0)
                    .map(|(account, amount)| (*account, *amount))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn debit(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()> {
        let available = self.balance_of(token, account);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    token: token.clone(),
                    account: *account,
                    required: amount,
                    available,
                })?;
        self.balances
            .entry(token.clone())
            .or_default()
            .insert(*account, remaining);
        Ok(())
    }

    fn credit(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()> {
        let balance = self
            .balance_of(token, account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                token: token.clone(),
            })?;
        self.balances
            .entry(token.clone())
            .or_default()
            .insert(*account, balance);
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> Amount {
        self.balances
            .get(token)
            .and_then(|accounts| accounts.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self, token: &TokenId) -> Amount {
        self.supply.get(token).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        if to.is_zero() || from.is_zero() {
            return Err(LedgerError::ZeroAccount);
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        // Check the credit side first so the debit can never be orphaned.
        self.balance_of(token, to)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                token: token.clone(),
            })?;
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)?;
        tracing::trace!(%token, %from, %to, amount, "ledger: transfer");
        Ok(())
    }

    fn mint(&mut self, token: &TokenId, to: &AccountId, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAccount);
        }
        let supply = self
            .total_supply(token)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                token: token.clone(),
            })?;
        self.credit(token, to, amount)?;
        self.supply.insert(token.clone(), supply);
        tracing::trace!(%token, %to, amount, "ledger: mint");
        Ok(())
    }

    fn burn(&mut self, token: &TokenId, from: &AccountId, amount: Amount) -> Result<()> {
        self.debit(token, from, amount)?;
        let supply = self.total_supply(token).saturating_sub(amount);
        self.supply.insert(token.clone(), supply);
        tracing::trace!(%token, %from, amount, "ledger: burn");
        Ok(())
    }
}
