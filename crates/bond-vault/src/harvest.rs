//! Yield measurement and distribution.
//!
//! ## Routing
//!
//! ```text
//! pending   = custody - total_deposits - surplus
//! allotment = floor(pending * w_class / sum(w))
//! skim      = floor(allotment * surplus_fee_bps / 10_000)
//! credited  = allotment - skim                  -> staking pool
//! surplus  += skims + diverted credits + (pending - sum(allotment))
//! ```
//!
//! A credit is diverted when the pool reports nothing staked in its class or
//! when spreading it would overflow the class accumulator. Every slice is
//! planned before anything moves, so a failed harvest changes nothing.
//!
//! [`BondVault::stake`] and [`BondVault::unstake`] harvest before touching a
//! position, so yield earned before a stake change is never shared with it.

use bond_ledger::{ensure_balance, AccessDenied, Ledger, Role};
use bond_math::{bps, mul_div, MathError};
use bond_staking::{Distribution, StakingError, StakingPool};
use bond_types::events::{DistributionRecord, DistributionTarget, ProtocolEvent};
use bond_types::{AccountId, Amount, AssetClass};

use crate::{BondVault, IdleYieldPolicy, Result, SplitMode, VaultError};

/// Where one harvest's yield went.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarvestReport {
    /// Yield measured and routed.
    pub amount: Amount,
    /// One record per credited class, then the protocol slice if any.
    pub distributions: Vec<DistributionRecord>,
    /// Amount added to protocol surplus.
    pub surplus_added: Amount,
}

/// Result of [`BondVault::harvest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// No yield above principal and surplus.
    NoYield,
    /// Nothing staked; the yield stays pending.
    NoStake {
        /// Yield left in the vault.
        pending: Amount,
    },
    /// Yield was routed.
    Harvested(HarvestReport),
}

struct ClassShare {
    class: AssetClass,
    weight: Amount,
    total_staked: Amount,
}

impl BondVault {
    /// Underlying held above principal and surplus.
    ///
    /// Saturates at zero; a shortfall means bookkeeping is inconsistent and
    /// is logged.
    pub fn pending_yield<L: Ledger + ?Sized>(&self, ledger: &L) -> Amount {
        let held = ledger.balance_of(&self.underlying, &self.account);
        let committed = self.total_deposits.saturating_add(self.surplus);
        if held < committed {
            tracing::warn!(
                held,
                total_deposits = self.total_deposits,
                surplus = self.surplus,
                "vault: custody below deposits plus surplus"
            );
            return 0;
        }
        held - committed
    }

    /// Measure pending yield and route it to the staking pool and surplus.
    ///
    /// The vault account must be a registered distributor of `staking`, and
    /// the pool must pay rewards in this vault's underlying.
    pub fn harvest<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staking: &mut StakingPool,
    ) -> Result<HarvestOutcome> {
        if !staking.is_distributor(&self.account) {
            return Err(AccessDenied {
                role: Role::Distributor,
                account: self.account,
            }
            .into());
        }
        if staking.reward_token() != &self.underlying {
            return Err(VaultError::PreconditionUnmet(format!(
                "staking pool pays {} but vault holds {}",
                staking.reward_token(),
                self.underlying
            )));
        }

        let pending = self.pending_yield(&*ledger);
        if pending == 0 {
            tracing::debug!("vault: no yield to harvest");
            return Ok(HarvestOutcome::NoYield);
        }

        let shares = self.class_shares(staking)?;
        let staked_weight = shares
            .iter()
            .filter(|share| share.total_staked > 0)
            .try_fold(0u128, |sum, share| sum.checked_add(share.weight))
            .ok_or(MathError::Overflow)?;
        if staked_weight == 0 {
            return match self.config.idle_policy {
                IdleYieldPolicy::Accumulate => {
                    tracing::debug!(pending, "vault: nothing staked, yield left pending");
                    Ok(HarvestOutcome::NoStake { pending })
                }
                IdleYieldPolicy::Divert => {
                    self.surplus = self
                        .surplus
                        .checked_add(pending)
                        .ok_or(MathError::Overflow)?;
                    Ok(self.finish(pending, Vec::new(), pending))
                }
            };
        }

        let total_weight = shares
            .iter()
            .try_fold(0u128, |sum, share| sum.checked_add(share.weight))
            .ok_or(MathError::Overflow)?;
        let mut records = Vec::new();
        let mut allotted: Amount = 0;
        let mut to_surplus: Amount = 0;
        for share in shares {
            if share.weight == 0 {
                continue;
            }
            let allotment = mul_div(pending, share.weight, total_weight)?;
            let skim = bps(allotment, self.config.surplus_fee_bps)?;
            let credit = allotment - skim;
            allotted += allotment;
            to_surplus += skim;
            if credit == 0 {
                continue;
            }
            match staking.preview_distribute(&self.account, &share.class, credit) {
                Ok(Distribution::Credited { total_staked }) => records.push(DistributionRecord {
                    target: DistributionTarget::AssetClass(share.class),
                    amount: credit,
                    total_staked,
                }),
                Ok(Distribution::Diverted { amount }) => to_surplus += amount,
                Err(StakingError::Math(err)) => {
                    tracing::warn!(
                        class = %share.class,
                        credit,
                        total_staked = share.total_staked,
                        error = %err,
                        "vault: class credit does not fit accumulator, diverted to surplus"
                    );
                    to_surplus += credit;
                }
                Err(err) => return Err(err.into()),
            }
        }
        to_surplus += pending - allotted;

        let credited: Amount = records.iter().map(|record| record.amount).sum();
        let surplus = self
            .surplus
            .checked_add(to_surplus)
            .ok_or(MathError::Overflow)?;
        ensure_balance(&*ledger, &self.underlying, &self.account, credited)?;
        let slices: Vec<(AssetClass, Amount)> = records
            .iter()
            .filter_map(|record| match &record.target {
                DistributionTarget::AssetClass(class) => Some((class.clone(), record.amount)),
                DistributionTarget::Protocol => None,
            })
            .collect();
        staking.distribute_batch(&self.account, &slices)?;

        self.surplus = surplus;
        if credited > 0 {
            ledger.transfer(&self.underlying, &self.account, &staking.account(), credited)?;
        }
        Ok(self.finish(pending, records, to_surplus))
    }

    /// Harvest, then stake `amount` of `class` for `staker`. Returns the
    /// reward paid.
    ///
    /// Staker-side failures are caught before the harvest runs.
    pub fn stake<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staking: &mut StakingPool,
        staker: AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<Amount> {
        staking.check_stake(&*ledger, &staker, class, amount)?;
        self.harvest(ledger, staking)?;
        Ok(staking.stake(ledger, staker, class, amount)?)
    }

    /// Harvest, then unstake `amount` of `class` for `staker`. Returns the
    /// reward paid.
    pub fn unstake<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        staking: &mut StakingPool,
        staker: AccountId,
        class: &AssetClass,
        amount: Amount,
    ) -> Result<Amount> {
        staking.check_unstake(&staker, class, amount)?;
        self.harvest(ledger, staking)?;
        Ok(staking.unstake(ledger, staker, class, amount)?)
    }

    fn class_shares(&self, staking: &StakingPool) -> Result<Vec<ClassShare>> {
        staking
            .classes()
            .map(|(class, state)| {
                let total_staked = state.accumulator.total_staked;
                let weight = u128::from(state.config.weight);
                let weight = match self.config.split_mode {
                    SplitMode::StakeWeighted => total_staked
                        .checked_mul(weight)
                        .ok_or(VaultError::Math(MathError::Overflow))?,
                    SplitMode::FixedShares => weight,
                };
                Ok(ClassShare {
                    class: class.clone(),
                    weight,
                    total_staked,
                })
            })
            .collect()
    }

    fn finish(
        &mut self,
        amount: Amount,
        mut distributions: Vec<DistributionRecord>,
        surplus_added: Amount,
    ) -> HarvestOutcome {
        if surplus_added > 0 {
            distributions.push(DistributionRecord {
                target: DistributionTarget::Protocol,
                amount: surplus_added,
                total_staked: 0,
            });
        }
        for record in &distributions {
            self.events.emit(ProtocolEvent::Distributed(record.clone()));
        }
        self.events.emit(ProtocolEvent::Harvested { amount });
        tracing::info!(
            amount,
            surplus_added,
            surplus = self.surplus,
            slices = distributions.len(),
            "vault: harvested"
        );
        HarvestOutcome::Harvested(HarvestReport {
            amount,
            distributions,
            surplus_added,
        })
    }
}
