//! Reward-per-share accumulator.
//!
//! ## Formula
//!
//! ```text
//! on distribute(r):  acc += floor(r * SCALE / total_staked)
//! pending(p)      =  floor(p.amount * acc / SCALE) - p.reward_debt
//! after any touch:   p.reward_debt = floor(p.amount * acc / SCALE)
//! ```
//!
//! The accumulator only grows, so `pending` never goes negative for a
//! position whose debt was synced against an earlier value.

use bond_math::{from_scaled, to_scaled, MathError, Result};
use bond_types::Amount;
use serde::{Deserialize, Serialize};

/// Pool-wide accumulator for one asset class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAccumulator {
    /// Sum of all staked amounts.
    pub total_staked: Amount,
    /// Cumulative reward per staked unit, scaled by `SCALE`.
    pub acc_rewards_per_share: u128,
}

impl PoolAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reward owed to `amount` staked units since the accumulator was zero.
    pub fn accrued(&self, amount: Amount) -> Result<Amount> {
        from_scaled(amount, self.acc_rewards_per_share)
    }

    /// Accumulator value after spreading `reward` over the current stake,
    /// or `None` when nothing is staked. Leaves `self` untouched.
    pub fn preview_credit(&self, reward: Amount) -> Result<Option<u128>> {
        if self.total_staked == 0 {
            return Ok(None);
        }
        let delta = to_scaled(reward, self.total_staked)?;
        let acc = self
            .acc_rewards_per_share
            .checked_add(delta)
            .ok_or(MathError::Overflow)?;
        Ok(Some(acc))
    }

    /// Spread `reward` over the current stake.
    ///
    /// Returns `false` and leaves the accumulator untouched when nothing is
    /// staked.
    pub fn credit(&mut self, reward: Amount) -> Result<bool> {
        let Some(acc) = self.preview_credit(reward)? else {
            return Ok(false);
        };
        tracing::trace!(
            reward,
            delta = acc - self.acc_rewards_per_share,
            acc,
            total_staked = self.total_staked,
            "accumulator: credited"
        );
        self.acc_rewards_per_share = acc;
        Ok(true)
    }
}

/// One staker's position in an asset class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Staked amount.
    pub amount: Amount,
    /// Accrued reward already accounted for at the last touch.
    pub reward_debt: Amount,
}

impl StakePosition {
    /// Rewards accrued since the last touch.
    pub fn pending(&self, accumulator: &PoolAccumulator) -> Result<Amount> {
        Ok(accumulator
            .accrued(self.amount)?
            .saturating_sub(self.reward_debt))
    }

    /// Reset the debt to the current accrual.
    pub fn sync_debt(&mut self, accumulator: &PoolAccumulator) -> Result<()> {
        self.reward_debt = accumulator.accrued(self.amount)?;
        Ok(())
    }
}
