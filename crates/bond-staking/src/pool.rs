//! Staking pool.
//!
//! The pool custodies staked tokens and reward tokens in a single account.
//! Every stake-changing call settles the caller's pending reward first, then
//! applies the change, then re-syncs the reward debt.
//!
//! The pool tracks the reward tokens it owes as `reward_reserve`. Reward
//! tokens that reach the pool account any other way are unallocated; each
//! `stake`/`unstake` (or an explicit [`StakingPool::absorb`]) spreads them
//! over the staked classes by `total_staked * weight` before settling.

use std::collections::BTreeMap;

use bond_ledger::{ensure_balance, AccessControl, Ledger, Role};
use bond_math::{mul_div, MathError};
use bond_types::events::{DistributionRecord, DistributionTarget, EventLog, ProtocolEvent};
use bond_types::{AccountId, Amount, AssetClass, TokenId};
use serde::{Deserialize, Serialize};

use crate::accumulator::{PoolAccumulator, StakePosition};
use crate::{Result, StakingError};

fn default_weight() -> u64 {
    1
}

/// Registration parameters for one asset class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Class identifier.
    pub class: AssetClass,
    /// Token staked into this class.
    pub staking_token: TokenId,
    /// Relative weight used when a harvest is split across classes.
    #[serde(default = "default_weight")]
    pub weight: u64,
}

/// Live state of one asset class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassState {
    /// Registration parameters.
    pub config: ClassConfig,
    /// Reward-per-share accumulator.
    pub accumulator: PoolAccumulator,
    /// Positions by staker.
    pub positions: BTreeMap<AccountId, StakePosition>,
    /// Rewards given up through emergency withdrawals.
    pub forfeited_rewards: Amount,
}

/// What a distribution did with the amount it was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Distribution {
    /// Credited to the accumulator, spread over `total_staked`.
    Credited {
        /// Stake the amount was spread over.
        total_staked: Amount,
    },
    /// Nothing staked; the amount was not credited and stays with the caller.
    Diverted {
        /// Amount handed back.
        amount: Amount,
    },
}

/// Multi-class staking pool sharing one reward token.
#[derive(Debug)]
pub struct StakingPool {
    account: AccountId,
    reward_token: TokenId,
    access: AccessControl,
    classes: BTreeMap<AssetClass, ClassState>,
    reward_reserve: Amount,
    events: EventLog,
}

/// A planned accumulator bump: class, amount credited, new accumulator value.
type Credit = (AssetClass, Amount, u128);

impl StakingPool {
    /// Create a pool owned by `owner` that custodies funds in `account`.
    pub fn new(owner: AccountId, account: AccountId, reward_token: TokenId) -> Result<Self> {
        if account.is_zero() {
            return Err(StakingError::InvalidConfig(
                "pool account must not be zero".into(),
            ));
        }
        Ok(Self {
            account,
            reward_token,
            access: AccessControl::new(owner),
            classes: BTreeMap::new(),
            reward_reserve: 0,
            events: EventLog::new(),
        })
    }

    /// Register a new asset class. Owner only.
    pub fn register_class(&mut self, caller: &AccountId, config: ClassConfig) -> Result<()> {
        self.access.require_owner(caller)?;
        if self.classes.contains_key(&config.class) {
            return Err(StakingError::InvalidConfig(format!(
                "asset class {} already registered",
                config.class
            )));
        }
        tracing::info!(
            class = %config.class,
            token = %config.staking_token,
            weight = config.weight,
            "staking: class registered"
        );
        self.classes.insert(
            config.class.clone(),
            ClassState {
                config,
                accumulator: PoolAccumulator::new(),
                positions: BTreeMap::new(),
                forfeited_rewards: 0,
            },
        );
        Ok(())
    }

    /// Allow or disallow `account` to call [`distribute`](Self::distribute).
    /// Owner only.
    pub fn set_distributor(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        enabled: bool,
    ) -> Result<()> {
        if self
            .access
            .set_role(caller, Role::Distributor, account, enabled)?
        {
            self.events.emit(ProtocolEvent::RoleUpdated {
                account,
                role: Role::Distributor.to_string(),
                enabled,
            });
        }
        Ok(())
    }

    /// Stake `amount` of the class's token, paying out any pending reward.
    ///
    /// `amount == 0` only settles. Returns the reward paid.
    pub fn stake<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staker: AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<Amount> {
        let credits = self.plan_absorb(&*ledger)?;
        let (staking_token, accumulator, mut position) =
            self.settle_view(class, &staker, &credits)?;
        let reward = position.pending(&accumulator)?;

        position.amount = position
            .amount
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        let total_staked = accumulator
            .total_staked
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        position.sync_debt(&accumulator)?;

        if amount > 0 {
            ensure_balance(&*ledger, &staking_token, &staker, amount)?;
        }
        self.ensure_reward_available(&*ledger, reward)?;

        self.apply_absorbed(credits);
        self.commit(class, staker, position, total_staked);
        if amount > 0 {
            ledger.transfer(&staking_token, &staker, &self.account, amount)?;
            self.events.emit(ProtocolEvent::Staked {
                staker,
                class: class.clone(),
                amount,
            });
            tracing::debug!(%staker, %class, amount, total_staked, "staking: staked");
        }
        self.pay_reward(ledger, staker, class, reward)?;
        Ok(reward)
    }

    /// Unstake `amount`, paying out any pending reward. Returns the reward
    /// paid.
    pub fn unstake<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staker: AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<Amount> {
        self.check_unstake(&staker, class, amount)?;
        let credits = self.plan_absorb(&*ledger)?;
        let (staking_token, accumulator, mut position) =
            self.settle_view(class, &staker, &credits)?;
        let reward = position.pending(&accumulator)?;

        position.amount -= amount;
        let total_staked = accumulator.total_staked.saturating_sub(amount);
        position.sync_debt(&accumulator)?;

        if staking_token == self.reward_token {
            let required = amount.checked_add(reward).ok_or(MathError::Overflow)?;
            ensure_balance(&*ledger, &staking_token, &self.account, required)?;
        } else {
            ensure_balance(&*ledger, &staking_token, &self.account, amount)?;
            self.ensure_reward_available(&*ledger, reward)?;
        }

        self.apply_absorbed(credits);
        self.commit(class, staker, position, total_staked);
        if amount > 0 {
            ledger.transfer(&staking_token, &self.account, &staker, amount)?;
            self.events.emit(ProtocolEvent::Unstaked {
                staker,
                class: class.clone(),
                amount,
            });
            tracing::debug!(%staker, %class, amount, total_staked, "staking: unstaked");
        }
        self.pay_reward(ledger, staker, class, reward)?;
        Ok(reward)
    }

    /// Fail with the error [`stake`](Self::stake) would return for reasons
    /// that depend only on the staker: an unknown class or a short balance.
    pub fn check_stake<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        staker: &AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<()> {
        let state = self.class(class)?;
        if amount > 0 {
            ensure_balance(ledger, &state.config.staking_token, staker, amount)?;
        }
        Ok(())
    }

    /// Fail with the error [`unstake`](Self::unstake) would return for an
    /// unknown class or an amount above the staked position.
    pub fn check_unstake(
        &self,
        staker: &AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<()> {
        let state = self.class(class)?;
        let available = state
            .positions
            .get(staker)
            .map(|position| position.amount)
            .unwrap_or(0);
        if amount > available {
            return Err(StakingError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Return the whole staked principal without settling rewards.
    ///
    /// Pending rewards are forfeited. Reward arithmetic can never make this
    /// fail; the forfeited figure is best effort.
    pub fn emergency_withdraw<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staker: AccountId,
        class: &AssetClass,
    ) -> Result<Amount> {
        let account = self.account;
        let state = self.class_mut(class)?;
        let Some(position) = state.positions.get(&staker).cloned() else {
            return Ok(0);
        };
        let amount = position.amount;
        let forfeited = position.pending(&state.accumulator).unwrap_or(0);
        ensure_balance(&*ledger, &state.config.staking_token, &account, amount)?;

        state.positions.remove(&staker);
        state.accumulator.total_staked = state.accumulator.total_staked.saturating_sub(amount);
        state.forfeited_rewards = state.forfeited_rewards.saturating_add(forfeited);
        let staking_token = state.config.staking_token.clone();

        ledger.transfer(&staking_token, &account, &staker, amount)?;
        self.events.emit(ProtocolEvent::EmergencyWithdrawn {
            staker,
            class: class.clone(),
            amount,
            forfeited,
        });
        tracing::warn!(%staker, %class, amount, forfeited, "staking: emergency withdrawal");
        Ok(amount)
    }

    /// Reward `staker` could collect from `class` right now.
    pub fn pending_rewards(&self, staker: &AccountId, class: &AssetClass) -> Result<Amount> {
        let state = self.class(class)?;
        match state.positions.get(staker) {
            Some(position) => Ok(position.pending(&state.accumulator)?),
            None => Ok(0),
        }
    }

    /// Credit `amount` of reward token to the stakers of `class`.
    ///
    /// Restricted to registered distributors. The reward tokens must reach
    /// the pool account as part of the same operation. With nothing staked
    /// the accumulator is left alone and the amount is reported as
    /// [`Distribution::Diverted`].
    pub fn distribute(
        &mut self,
        caller: &AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<Distribution> {
        let mut outcomes = self.distribute_batch(caller, &[(class.clone(), amount)])?;
        Ok(outcomes.remove(0))
    }

    /// What [`distribute`](Self::distribute) would do, without doing it.
    ///
    /// Fails exactly when `distribute` would, including when the scaled
    /// increment does not fit the accumulator.
    pub fn preview_distribute(
        &self,
        caller: &AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<Distribution> {
        self.access.require(Role::Distributor, caller)?;
        let state = self.class(class)?;
        Ok(match state.accumulator.preview_credit(amount)? {
            Some(_) => Distribution::Credited {
                total_staked: state.accumulator.total_staked,
            },
            None => Distribution::Diverted { amount },
        })
    }

    /// Credit several classes at once. Either every slice is applied or,
    /// on error, none is.
    pub fn distribute_batch(
        &mut self,
        caller: &AccountId,
        slices: &[(AssetClass, Amount)],
    ) -> Result<Vec<Distribution>> {
        self.access.require(Role::Distributor, caller)?;
        let mut outcomes = Vec::with_capacity(slices.len());
        let mut credits: Vec<Credit> = Vec::with_capacity(slices.len());
        let mut credited: Amount = 0;
        for (class, amount) in slices {
            if credits.iter().any(|(seen, ..)| seen == class) {
                return Err(StakingError::InvalidAmount(format!(
                    "asset class {class} appears twice in one distribution"
                )));
            }
            let state = self.class(class)?;
            match state.accumulator.preview_credit(*amount)? {
                Some(acc) => {
                    credited = credited.checked_add(*amount).ok_or(MathError::Overflow)?;
                    credits.push((class.clone(), *amount, acc));
                    outcomes.push(Distribution::Credited {
                        total_staked: state.accumulator.total_staked,
                    });
                }
                None => {
                    tracing::debug!(
                        %class,
                        amount,
                        "staking: nothing staked, distribution diverted"
                    );
                    outcomes.push(Distribution::Diverted { amount: *amount });
                }
            }
        }
        self.reward_reserve
            .checked_add(credited)
            .ok_or(MathError::Overflow)?;
        self.apply_credits(&credits);
        Ok(outcomes)
    }

    /// Reward tokens held by the pool account beyond what it owes and the
    /// principal staked in the reward token itself.
    pub fn unallocated<L: Ledger + ?Sized>(&self, ledger: &L) -> Amount {
        let held = ledger.balance_of(&self.reward_token, &self.account);
        let principal: Amount = self
            .classes
            .values()
            .filter(|state| state.config.staking_token == self.reward_token)
            .fold(0, |sum: Amount, state| {
                sum.saturating_add(state.accumulator.total_staked)
            });
        held.saturating_sub(self.reward_reserve.saturating_add(principal))
    }

    /// Spread unallocated reward tokens over the staked classes. Returns
    /// the amount credited; rounding remainders stay unallocated.
    pub fn absorb<L: Ledger + ?Sized>(&mut self, ledger: &L) -> Result<Amount> {
        let credits = self.plan_absorb(ledger)?;
        let credited: Amount = credits.iter().map(|(_, amount, _)| amount).sum();
        self.apply_absorbed(credits);
        Ok(credited)
    }

    /// Sum of outstanding rewards across every position.
    ///
    /// The reward balance held by the pool account never falls below this.
    pub fn total_pending(&self) -> Result<Amount> {
        let mut total: Amount = 0;
        for state in self.classes.values() {
            for position in state.positions.values() {
                total = total
                    .checked_add(position.pending(&state.accumulator)?)
                    .ok_or(MathError::Overflow)?;
            }
        }
        Ok(total)
    }

    /// Reward tokens credited to stakers and not yet paid out.
    pub fn reward_reserve(&self) -> Amount {
        self.reward_reserve
    }

    /// Account custodying staked and reward tokens.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Token paid out as reward.
    pub fn reward_token(&self) -> &TokenId {
        &self.reward_token
    }

    /// The owner of this pool.
    pub fn owner(&self) -> AccountId {
        self.access.owner()
    }

    /// Whether `account` may call [`distribute`](Self::distribute).
    pub fn is_distributor(&self, account: &AccountId) -> bool {
        self.access.has_role(Role::Distributor, account)
    }

    /// Registered classes in identifier order.
    pub fn classes(&self) -> impl Iterator<Item = (&AssetClass, &ClassState)> {
        self.classes.iter()
    }

    /// State of `class`, if registered.
    pub fn class_state(&self, class: &AssetClass) -> Option<&ClassState> {
        self.classes.get(class)
    }

    /// Accumulator of `class`, if registered.
    pub fn accumulator(&self, class: &AssetClass) -> Option<&PoolAccumulator> {
        self.classes.get(class).map(|state| &state.accumulator)
    }

    /// Position of `staker` in `class`, if any.
    pub fn position(&self, class: &AssetClass, staker: &AccountId) -> Option<&StakePosition> {
        self.classes
            .get(class)
            .and_then(|state| state.positions.get(staker))
    }

    /// Total staked in `class`. Zero for unknown classes.
    pub fn total_staked(&self, class: &AssetClass) -> Amount {
        self.accumulator(class)
            .map(|acc| acc.total_staked)
            .unwrap_or(0)
    }

    /// Buffered events.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take all buffered events.
    pub fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.drain()
    }

    fn class(&self, class: &AssetClass) -> Result<&ClassState> {
        self.classes
            .get(class)
            .ok_or_else(|| StakingError::InvalidAmount(format!("unknown asset class {class}")))
    }

    fn class_mut(&mut self, class: &AssetClass) -> Result<&mut ClassState> {
        self.classes
            .get_mut(class)
            .ok_or_else(|| StakingError::InvalidAmount(format!("unknown asset class {class}")))
    }

    /// Token, accumulator and position of `staker` in `class` as they will
    /// stand once `credits` are applied.
    fn settle_view(
        &self,
        class: &AssetClass,
        staker: &AccountId,
        credits: &[Credit],
    ) -> Result<(TokenId, PoolAccumulator, StakePosition)> {
        let state = self.class(class)?;
        let mut accumulator = state.accumulator.clone();
        if let Some((_, _, acc)) = credits.iter().find(|(credited, ..)| credited == class) {
            accumulator.acc_rewards_per_share = *acc;
        }
        let position = state.positions.get(staker).cloned().unwrap_or_default();
        Ok((state.config.staking_token.clone(), accumulator, position))
    }

    fn plan_absorb<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<Vec<Credit>> {
        let unallocated = self.unallocated(ledger);
        if unallocated == 0 {
            return Ok(Vec::new());
        }
        let mut weights = Vec::new();
        let mut total_weight: Amount = 0;
        for (class, state) in &self.classes {
            let weight = state
                .accumulator
                .total_staked
                .checked_mul(u128::from(state.config.weight))
                .ok_or(MathError::Overflow)?;
            if weight > 0 {
                total_weight = total_weight.checked_add(weight).ok_or(MathError::Overflow)?;
                weights.push((class, state, weight));
            }
        }
        let mut credits = Vec::with_capacity(weights.len());
        for (class, state, weight) in weights {
            let amount = mul_div(unallocated, weight, total_weight)?;
            if amount == 0 {
                continue;
            }
            match state.accumulator.preview_credit(amount) {
                Ok(Some(acc)) => credits.push((class.clone(), amount, acc)),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        %class,
                        amount,
                        error = %err,
                        "staking: unallocated share left uncredited"
                    );
                }
            }
        }
        Ok(credits)
    }

    fn apply_credits(&mut self, credits: &[Credit]) {
        for (class, amount, acc) in credits {
            if let Some(state) = self.classes.get_mut(class) {
                state.accumulator.acc_rewards_per_share = *acc;
                self.reward_reserve = self.reward_reserve.saturating_add(*amount);
                tracing::debug!(
                    %class,
                    amount,
                    total_staked = state.accumulator.total_staked,
                    acc,
                    "staking: distributed"
                );
            }
        }
    }

    /// Apply credits drawn from unallocated reward tokens and record them.
    fn apply_absorbed(&mut self, credits: Vec<Credit>) {
        self.apply_credits(&credits);
        for (class, amount, _) in credits {
            let total_staked = self.total_staked(&class);
            self.events.emit(ProtocolEvent::Distributed(DistributionRecord {
                target: DistributionTarget::AssetClass(class),
                amount,
                total_staked,
            }));
        }
    }

    fn commit(
        &mut self,
        class: &AssetClass,
        staker: AccountId,
        position: StakePosition,
        total_staked: Amount,
    ) {
        if let Some(state) = self.classes.get_mut(class) {
            state.accumulator.total_staked = total_staked;
            if position.amount == 0 && position.reward_debt == 0 {
                state.positions.remove(&staker);
            } else {
                state.positions.insert(staker, position);
            }
        }
    }

    fn ensure_reward_available<L: Ledger + ?Sized>(&self, ledger: &L, reward: Amount) -> Result<()> {
        if reward > 0 {
            ensure_balance(ledger, &self.reward_token, &self.account, reward)?;
        }
        Ok(())
    }

    fn pay_reward<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staker: AccountId,
        class: &AssetClass,
        reward: Amount,
    ) -> Result<()> {
        if reward == 0 {
            return Ok(());
        }
        ledger.transfer(&self.reward_token, &self.account, &staker, reward)?;
        self.reward_reserve = self.reward_reserve.saturating_sub(reward);
        self.events.emit(ProtocolEvent::RewardPaid {
            staker,
            class: class.clone(),
            amount: reward,
        });
        tracing::info!(%staker, %class, reward, "staking: reward paid");
        Ok(())
    }
}
