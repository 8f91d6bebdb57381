//! Per-position accrual math.
//!
//! ## Accrual
//!
//! ```text
//! locked    = vesting_amount - cumulative_claim_amount
//! window    = vesting_end - last_vesting_time
//! elapsed   = min(now - last_vesting_time, window)
//! accrued   = floor(locked * elapsed / window)     (locked once window == 0)
//! claimable = cumulative_claim_amount + accrued - claimed_amount
//! ```
//!
//! A checkpoint folds `accrued` into `cumulative_claim_amount` and moves
//! `last_vesting_time` to `now` without touching `vesting_end`, so the
//! still-locked remainder keeps vesting over the original remaining window
//! and everything is unlocked exactly at `vesting_end`.

use bond_math::{mul_div, MathError, Result};
use bond_types::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// One linear vesting position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingPosition {
    /// Total escrow committed to this position.
    pub vesting_amount: Amount,
    /// Amount already released to the holder.
    pub claimed_amount: Amount,
    /// Amount unlocked as of `last_vesting_time`.
    pub cumulative_claim_amount: Amount,
    /// Time of the last checkpoint.
    pub last_vesting_time: Timestamp,
    /// Time at which everything still locked is fully unlocked.
    pub vesting_end: Timestamp,
    /// Duration applied when the position is opened or topped up.
    pub vesting_duration: u64,
}

impl VestingPosition {
    /// Open a position of `amount` vesting over `duration` seconds from `now`.
    pub fn new(amount: Amount, now: Timestamp, duration: u64) -> Self {
        Self {
            vesting_amount: amount,
            claimed_amount: 0,
            cumulative_claim_amount: 0,
            last_vesting_time: now,
            vesting_end: now.saturating_add(duration),
            vesting_duration: duration,
        }
    }

    /// Amount not yet unlocked at the last checkpoint.
    pub fn locked(&self) -> Amount {
        self.vesting_amount
            .saturating_sub(self.cumulative_claim_amount)
    }

    /// Amount not yet released to the holder.
    pub fn remaining(&self) -> Amount {
        self.vesting_amount.saturating_sub(self.claimed_amount)
    }

    /// Whether everything has been claimed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Amount unlocked since the last checkpoint.
    pub fn accrued(&self, now: Timestamp) -> Result<Amount> {
        let locked = self.locked();
        let window = self.vesting_end.saturating_sub(self.last_vesting_time);
        let elapsed = now.saturating_sub(self.last_vesting_time).min(window);
        if window == 0 || elapsed == window {
            return Ok(locked);
        }
        mul_div(locked, u128::from(elapsed), u128::from(window))
    }

    /// Amount the holder could claim at `now`.
    pub fn claimable(&self, now: Timestamp) -> Result<Amount> {
        let unlocked = self
            .cumulative_claim_amount
            .checked_add(self.accrued(now)?)
            .ok_or(MathError::Overflow)?;
        Ok(unlocked.saturating_sub(self.claimed_amount))
    }

    /// Fold accrual up to `now` into the cumulative unlocked amount.
    ///
    /// A `now` at or before the last checkpoint changes nothing.
    pub fn checkpoint(&mut self, now: Timestamp) -> Result<()> {
        if now <= self.last_vesting_time {
            return Ok(());
        }
        let accrued = self.accrued(now)?;
        self.cumulative_claim_amount = self
            .cumulative_claim_amount
            .checked_add(accrued)
            .ok_or(MathError::Overflow)?;
        self.last_vesting_time = now;
        Ok(())
    }

    /// Checkpoint and mark everything unlocked as claimed.
    ///
    /// Returns the amount newly released. Calling it twice at the same
    /// instant returns zero the second time.
    pub fn settle(&mut self, now: Timestamp) -> Result<Amount> {
        self.checkpoint(now)?;
        let payout = self
            .cumulative_claim_amount
            .saturating_sub(self.claimed_amount);
        self.claimed_amount = self.cumulative_claim_amount;
        Ok(payout)
    }

    /// Add `amount` to the position and restart the full window for
    /// everything still locked. Already unlocked value is preserved.
    pub fn top_up(&mut self, amount: Amount, now: Timestamp) -> Result<()> {
        self.checkpoint(now)?;
        self.vesting_amount = self
            .vesting_amount
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        self.vesting_end = self
            .last_vesting_time
            .max(now)
            .saturating_add(self.vesting_duration);
        Ok(())
    }
}
