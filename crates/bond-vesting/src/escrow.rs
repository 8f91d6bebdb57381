//! The vesting ledger.
//!
//! Escrow tokens are committed by the holder and held in a custody account
//! until they unlock. A release burns the unlocked escrow from custody and
//! mints the same amount of the liquid token to the holder.

use std::collections::BTreeMap;

use bond_ledger::{ensure_balance, ensure_mintable, AccessControl, Clock, Ledger, Role};
use bond_math::MathError;
use bond_types::events::{EventLog, ProtocolEvent};
use bond_types::{AccountId, Amount, Timestamp, TokenId, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};

use crate::position::VestingPosition;
use crate::{Result, VestingError};

fn default_vesting_duration() -> u64 {
    SECONDS_PER_YEAR
}

/// How successive `vest` calls by one holder are recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingStrategy {
    /// One position per holder; each `vest` settles it and tops it up.
    /// `vest(0)` is a claim.
    #[default]
    Aggregate,
    /// Every `vest` opens a new position.
    Indexed,
}

/// Vesting parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingConfig {
    /// Length of a vesting window in seconds.
    #[serde(default = "default_vesting_duration")]
    pub vesting_duration_secs: u64,
    /// Position bookkeeping strategy.
    #[serde(default)]
    pub strategy: VestingStrategy,
}

impl Default for VestingConfig {
    fn default() -> Self {
        Self {
            vesting_duration_secs: default_vesting_duration(),
            strategy: VestingStrategy::default(),
        }
    }
}

/// Result of a [`VestingLedger::vest`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VestOutcome {
    /// Position that was opened or topped up, if any.
    pub index: Option<usize>,
    /// Liquid tokens released as a side effect.
    pub claimed: Amount,
}

/// Linear vesting of an escrow token into a liquid token.
#[derive(Debug)]
pub struct VestingLedger {
    config: VestingConfig,
    escrow_token: TokenId,
    liquid_token: TokenId,
    custody: AccountId,
    access: AccessControl,
    positions: BTreeMap<AccountId, Vec<VestingPosition>>,
    events: EventLog,
}

impl VestingLedger {
    /// Create a vesting ledger owned by `owner`.
    ///
    /// Vested escrow is parked in `custody` until released.
    pub fn new(
        owner: AccountId,
        custody: AccountId,
        escrow_token: TokenId,
        liquid_token: TokenId,
        config: VestingConfig,
    ) -> Result<Self> {
        if config.vesting_duration_secs == 0 {
            return Err(VestingError::InvalidConfig(
                "vesting duration must be positive".into(),
            ));
        }
        if custody.is_zero() {
            return Err(VestingError::InvalidConfig(
                "custody account must not be zero".into(),
            ));
        }
        Ok(Self {
            config,
            escrow_token,
            liquid_token,
            custody,
            access: AccessControl::new(owner),
            positions: BTreeMap::new(),
            events: EventLog::new(),
        })
    }

    /// Commit `amount` escrow tokens from `holder` to vesting.
    ///
    /// In [`VestingStrategy::Aggregate`] mode the holder's position is
    /// settled first and anything unlocked is released; `amount == 0` only
    /// does that. In [`VestingStrategy::Indexed`] mode a new position is
    /// opened and a zero amount is rejected.
    pub fn vest<L, C>(
        &mut self,
        ledger: &mut L,
        clock: &C,
        holder: AccountId,
        amount: Amount,
    ) -> Result<VestOutcome>
    where
        L: Ledger + ?Sized,
        C: Clock + ?Sized,
    {
        let now = clock.now();
        let duration = self.config.vesting_duration_secs;
        if amount == 0 && self.config.strategy == VestingStrategy::Indexed {
            return Err(VestingError::InvalidAmount(
                "cannot open an empty vesting position".into(),
            ));
        }
        if amount > 0 {
            ensure_balance(&*ledger, &self.escrow_token, &holder, amount)?;
        }

        let existing = self.positions(&holder);
        let (index, next, claimed) = match (self.config.strategy, existing.first()) {
            (VestingStrategy::Aggregate, Some(current)) => {
                let mut next = current.clone();
                let claimed = next.settle(now)?;
                if amount > 0 {
                    next.top_up(amount, now)?;
                }
                (0, next, claimed)
            }
            (VestingStrategy::Aggregate, None) if amount == 0 => {
                return Ok(VestOutcome {
                    index: None,
                    claimed: 0,
                });
            }
            (VestingStrategy::Aggregate, None) => {
                (0, VestingPosition::new(amount, now, duration), 0)
            }
            (VestingStrategy::Indexed, _) => (
                existing.len(),
                VestingPosition::new(amount, now, duration),
                0,
            ),
        };
        self.ensure_releasable(&*ledger, claimed)?;

        self.store(holder, index, next);
        if amount > 0 {
            ledger.transfer(&self.escrow_token, &holder, &self.custody, amount)?;
            self.events.emit(ProtocolEvent::Vested {
                holder,
                index,
                amount,
            });
            tracing::info!(%holder, index, amount, "vesting: escrow committed");
        }
        if claimed > 0 {
            self.events.emit(ProtocolEvent::Claimed {
                holder,
                index,
                amount: claimed,
            });
            self.pay_out(ledger, holder, claimed)?;
        }
        Ok(VestOutcome {
            index: Some(index),
            claimed,
        })
    }

    /// Release everything unlocked in position `index` of `holder`.
    ///
    /// Returns the amount released, which is zero when nothing has unlocked
    /// since the last claim.
    pub fn claim<L, C>(
        &mut self,
        ledger: &mut L,
        clock: &C,
        holder: AccountId,
        index: usize,
    ) -> Result<Amount>
    where
        L: Ledger + ?Sized,
        C: Clock + ?Sized,
    {
        self.release(ledger, clock.now(), holder, &[index])
    }

    /// Release everything unlocked across all of `holder`'s positions.
    pub fn claim_all<L, C>(&mut self, ledger: &mut L, clock: &C, holder: AccountId) -> Result<Amount>
    where
        L: Ledger + ?Sized,
        C: Clock + ?Sized,
    {
        let indices: Vec<usize> = (0..self.positions(&holder).len()).collect();
        self.release(ledger, clock.now(), holder, &indices)
    }

    /// Amount claimable from position `index` of `holder` right now.
    pub fn claimable<C: Clock + ?Sized>(
        &self,
        clock: &C,
        holder: &AccountId,
        index: usize,
    ) -> Result<Amount> {
        let position = self
            .position(holder, index)
            .ok_or(VestingError::UnknownPosition {
                holder: *holder,
                index,
            })?;
        Ok(position.claimable(clock.now())?)
    }

    /// Amount claimable across all of `holder`'s positions right now.
    pub fn total_claimable<C: Clock + ?Sized>(&self, clock: &C, holder: &AccountId) -> Result<Amount> {
        let now = clock.now();
        self.positions(holder).iter().try_fold(0u128, |total, position| {
            total
                .checked_add(position.claimable(now)?)
                .ok_or(VestingError::Math(MathError::Overflow))
        })
    }

    /// Mint `amount` escrow tokens to `to`. Minter only.
    pub fn mint_escrow<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        caller: &AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.access.require(Role::Minter, caller)?;
        if amount == 0 {
            return Err(VestingError::InvalidAmount("cannot mint zero".into()));
        }
        ledger.mint(&self.escrow_token, &to, amount)?;
        self.events.emit(ProtocolEvent::EscrowMinted { to, amount });
        tracing::info!(%caller, %to, amount, "vesting: escrow minted");
        Ok(())
    }

    /// Move `amount` escrow tokens from `from` to `to`. Transferer only.
    ///
    /// Escrow balances are otherwise non-transferable.
    pub fn transfer_escrow<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        caller: &AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.access.require(Role::Transferer, caller)?;
        ledger.transfer(&self.escrow_token, &from, &to, amount)?;
        self.events
            .emit(ProtocolEvent::EscrowTransferred { from, to, amount });
        tracing::debug!(%caller, %from, %to, amount, "vesting: escrow transferred");
        Ok(())
    }

    /// Grant or revoke the minter role. Owner only.
    pub fn set_minter(&mut self, caller: &AccountId, account: AccountId, enabled: bool) -> Result<()> {
        self.set_role(caller, Role::Minter, account, enabled)
    }

    /// Grant or revoke the transferer role. Owner only.
    pub fn set_transferer(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        enabled: bool,
    ) -> Result<()> {
        self.set_role(caller, Role::Transferer, account, enabled)
    }

    /// Whether `account` may mint escrow tokens.
    pub fn is_minter(&self, account: &AccountId) -> bool {
        self.access.has_role(Role::Minter, account)
    }

    /// Whether `account` may move escrow tokens.
    pub fn is_transferer(&self, account: &AccountId) -> bool {
        self.access.has_role(Role::Transferer, account)
    }

    /// The owner of this ledger.
    pub fn owner(&self) -> AccountId {
        self.access.owner()
    }

    /// Vesting parameters.
    pub fn config(&self) -> &VestingConfig {
        &self.config
    }

    /// Token committed to vesting.
    pub fn escrow_token(&self) -> &TokenId {
        &self.escrow_token
    }

    /// Token released by claims.
    pub fn liquid_token(&self) -> &TokenId {
        &self.liquid_token
    }

    /// Account holding vested escrow.
    pub fn custody(&self) -> AccountId {
        self.custody
    }

    /// All positions of `holder`, in opening order.
    pub fn positions(&self, holder: &AccountId) -> &[VestingPosition] {
        self.positions.get(holder).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position `index` of `holder`.
    pub fn position(&self, holder: &AccountId, index: usize) -> Option<&VestingPosition> {
        self.positions(holder).get(index)
    }

    /// Every holder with at least one position.
    pub fn holders(&self) -> impl Iterator<Item = &AccountId> {
        self.positions.keys()
    }

    /// Buffered events.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take all buffered events.
    pub fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.drain()
    }

    fn set_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
        enabled: bool,
    ) -> Result<()> {
        if self.access.set_role(caller, role, account, enabled)? {
            self.events.emit(ProtocolEvent::RoleUpdated {
                account,
                role: role.to_string(),
                enabled,
            });
        }
        Ok(())
    }

    fn store(&mut self, holder: AccountId, index: usize, position: VestingPosition) {
        let positions = self.positions.entry(holder).or_default();
        match positions.get_mut(index) {
            Some(slot) => *slot = position,
            None => positions.push(position),
        }
    }

    fn release<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        now: Timestamp,
        holder: AccountId,
        indices: &[usize],
    ) -> Result<Amount> {
        let current = self.positions(&holder);
        let mut settled = Vec::with_capacity(indices.len());
        let mut total: Amount = 0;
        for &index in indices {
            let mut next = current
                .get(index)
                .cloned()
                .ok_or(VestingError::UnknownPosition { holder, index })?;
            let payout = next.settle(now)?;
            total = total.checked_add(payout).ok_or(MathError::Overflow)?;
            settled.push((index, next, payout));
        }
        self.ensure_releasable(&*ledger, total)?;

        for (index, next, payout) in settled {
            self.store(holder, index, next);
            if payout > 0 {
                self.events.emit(ProtocolEvent::Claimed {
                    holder,
                    index,
                    amount: payout,
                });
            }
        }
        self.pay_out(ledger, holder, total)?;
        Ok(total)
    }

    fn ensure_releasable<L: Ledger + ?Sized>(&self, ledger: &L, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        ensure_balance(ledger, &self.escrow_token, &self.custody, amount)?;
        ensure_mintable(ledger, &self.liquid_token, amount)?;
        Ok(())
    }

    fn pay_out<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        holder: AccountId,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        ledger.burn(&self.escrow_token, &self.custody, amount)?;
        ledger.mint(&self.liquid_token, &holder, amount)?;
        tracing::info!(%holder, amount, "vesting: claimed");
        Ok(())
    }
}
