//! Deposits, redemptions and surplus.

use bond_ledger::{ensure_balance, ensure_mintable, AccessControl, Ledger};
use bond_math::{bps, MathError};
use bond_types::events::{EventLog, ProtocolEvent};
use bond_types::{AccountId, Amount, TokenId};

use crate::config::{check_mint_fee, check_recipient, check_surplus_fee};
use crate::{IdleYieldPolicy, Result, SplitMode, VaultConfig, VaultError};

/// A perpetual bond vault over one underlying token.
#[derive(Debug)]
pub struct BondVault {
    pub(crate) account: AccountId,
    pub(crate) underlying: TokenId,
    deposit_token: TokenId,
    yield_token: TokenId,
    access: AccessControl,
    pub(crate) config: VaultConfig,
    pub(crate) total_deposits: Amount,
    pub(crate) surplus: Amount,
    pub(crate) events: EventLog,
}

impl BondVault {
    /// Create a vault owned by `owner` that custodies `underlying` in
    /// `account` and issues `deposit_token` and `yield_token`.
    pub fn new(
        owner: AccountId,
        account: AccountId,
        underlying: TokenId,
        deposit_token: TokenId,
        yield_token: TokenId,
        config: VaultConfig,
    ) -> Result<Self> {
        config.validate()?;
        if account.is_zero() {
            return Err(VaultError::InvalidAmount(
                "vault account must not be zero".into(),
            ));
        }
        Ok(Self {
            account,
            underlying,
            deposit_token,
            yield_token,
            access: AccessControl::new(owner),
            config,
            total_deposits: 0,
            surplus: 0,
            events: EventLog::new(),
        })
    }

    /// Deposit `amount` of underlying from `depositor`.
    ///
    /// The mint fee goes to the fee recipient; the rest is added to
    /// principal and minted 1:1 as deposit and yield tokens. Returns the
    /// amount minted.
    pub fn deposit<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        depositor: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount("cannot deposit zero".into()));
        }
        let (fee, recipient) = self.fee_on(amount)?;
        let net = amount - fee;
        let total_deposits = self
            .total_deposits
            .checked_add(net)
            .ok_or(MathError::Overflow)?;
        ensure_balance(&*ledger, &self.underlying, &depositor, amount)?;
        ensure_mintable(&*ledger, &self.deposit_token, net)?;
        ensure_mintable(&*ledger, &self.yield_token, net)?;

        self.total_deposits = total_deposits;
        ledger.transfer(&self.underlying, &depositor, &self.account, net)?;
        if let Some(recipient) = recipient {
            ledger.transfer(&self.underlying, &depositor, &recipient, fee)?;
        }
        ledger.mint(&self.deposit_token, &depositor, net)?;
        ledger.mint(&self.yield_token, &depositor, net)?;

        self.events.emit(ProtocolEvent::Deposited {
            account: depositor,
            amount,
            fee,
        });
        tracing::info!(%depositor, amount, fee, total_deposits, "vault: deposit");
        Ok(net)
    }

    /// Burn `amount` of both deposit and yield tokens from `holder` and
    /// release that much principal, less the mint fee. Returns the amount
    /// paid to the holder.
    pub fn redeem<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        holder: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount("cannot redeem zero".into()));
        }
        let total_deposits = self.total_deposits.checked_sub(amount).ok_or_else(|| {
            VaultError::PreconditionUnmet(format!(
                "redeem of {amount} exceeds total deposits {}",
                self.total_deposits
            ))
        })?;
        let (fee, recipient) = self.fee_on(amount)?;
        let payout = amount - fee;
        ensure_balance(&*ledger, &self.deposit_token, &holder, amount)?;
        ensure_balance(&*ledger, &self.yield_token, &holder, amount)?;
        ensure_balance(&*ledger, &self.underlying, &self.account, amount)?;

        self.total_deposits = total_deposits;
        ledger.burn(&self.deposit_token, &holder, amount)?;
        ledger.burn(&self.yield_token, &holder, amount)?;
        ledger.transfer(&self.underlying, &self.account, &holder, payout)?;
        if let Some(recipient) = recipient {
            ledger.transfer(&self.underlying, &self.account, &recipient, fee)?;
        }

        self.events.emit(ProtocolEvent::Redeemed {
            account: holder,
            amount,
            fee,
        });
        tracing::info!(%holder, amount, fee, total_deposits, "vault: redeem");
        Ok(payout)
    }

    /// Pay the whole protocol surplus to the fee recipient. Owner only.
    ///
    /// Returns the amount paid; zero surplus is a no-op.
    pub fn collect_surplus<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        caller: &AccountId,
    ) -> Result<Amount> {
        self.access.require_owner(caller)?;
        if self.surplus == 0 {
            return Ok(0);
        }
        let recipient = self.config.fee_recipient.ok_or_else(|| {
            VaultError::PreconditionUnmet("no fee recipient configured".into())
        })?;
        let amount = self.surplus;
        ensure_balance(&*ledger, &self.underlying, &self.account, amount)?;

        self.surplus = 0;
        ledger.transfer(&self.underlying, &self.account, &recipient, amount)?;
        self.events
            .emit(ProtocolEvent::SurplusCollected { recipient, amount });
        tracing::info!(%recipient, amount, "vault: surplus collected");
        Ok(amount)
    }

    /// Set the deposit/redeem fee. Owner only.
    pub fn set_mint_fee(&mut self, caller: &AccountId, fee_bps: u32) -> Result<()> {
        self.access.require_owner(caller)?;
        check_mint_fee(fee_bps)?;
        self.config.mint_fee_bps = fee_bps;
        tracing::info!(fee_bps, "vault: mint fee updated");
        Ok(())
    }

    /// Set the share of each harvest allotment kept as surplus. Owner only.
    pub fn set_surplus_fee(&mut self, caller: &AccountId, fee_bps: u32) -> Result<()> {
        self.access.require_owner(caller)?;
        check_surplus_fee(fee_bps)?;
        self.config.surplus_fee_bps = fee_bps;
        tracing::info!(fee_bps, "vault: surplus fee updated");
        Ok(())
    }

    /// Set or clear the fee recipient. Owner only.
    pub fn set_fee_recipient(
        &mut self,
        caller: &AccountId,
        recipient: Option<AccountId>,
    ) -> Result<()> {
        self.access.require_owner(caller)?;
        if let Some(recipient) = &recipient {
            check_recipient(recipient)?;
        }
        self.config.fee_recipient = recipient;
        tracing::info!(recipient = ?recipient, "vault: fee recipient updated");
        Ok(())
    }

    /// Set the harvest split mode. Owner only.
    pub fn set_split_mode(&mut self, caller: &AccountId, mode: SplitMode) -> Result<()> {
        self.access.require_owner(caller)?;
        self.config.split_mode = mode;
        Ok(())
    }

    /// Set the idle-yield policy. Owner only.
    pub fn set_idle_policy(&mut self, caller: &AccountId, policy: IdleYieldPolicy) -> Result<()> {
        self.access.require_owner(caller)?;
        self.config.idle_policy = policy;
        Ok(())
    }

    /// Hand ownership to `new_owner`. Owner only.
    pub fn transfer_ownership(&mut self, caller: &AccountId, new_owner: AccountId) -> Result<()> {
        Ok(self.access.transfer_ownership(caller, new_owner)?)
    }

    /// The owner of this vault.
    pub fn owner(&self) -> AccountId {
        self.access.owner()
    }

    /// Account custodying the underlying.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Token deposited.
    pub fn underlying(&self) -> &TokenId {
        &self.underlying
    }

    /// Principal claim token.
    pub fn deposit_token(&self) -> &TokenId {
        &self.deposit_token
    }

    /// Yield claim token, staked to earn harvests.
    pub fn yield_token(&self) -> &TokenId {
        &self.yield_token
    }

    /// Current configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Outstanding principal.
    pub fn total_deposits(&self) -> Amount {
        self.total_deposits
    }

    /// Protocol surplus awaiting collection.
    pub fn surplus(&self) -> Amount {
        self.surplus
    }

    /// Buffered events.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take all buffered events.
    pub fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.drain()
    }

    fn fee_on(&self, amount: Amount) -> Result<(Amount, Option<AccountId>)> {
        match self.config.fee_recipient {
            Some(recipient) if self.config.mint_fee_bps > 0 => {
                Ok((bps(amount, self.config.mint_fee_bps)?, Some(recipient)))
            }
            _ => Ok((0, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bond_ledger::{LedgerError, MemoryLedger};
    use bond_types::ONE_TOKEN;

    fn owner() -> AccountId {
        AccountId::new([1; 20])
    }

    fn other() -> AccountId {
        AccountId::new([2; 20])
    }

    fn steth() -> TokenId {
        TokenId::new("stETH")
    }

    fn dtoken() -> TokenId {
        TokenId::new("dToken")
    }

    fn ytoken() -> TokenId {
        TokenId::new("yToken")
    }

    fn tokens(tenths: u128) -> Amount {
        tenths * ONE_TOKEN / 10
    }

    fn setup() -> (BondVault, MemoryLedger) {
        let vault = BondVault::new(
            owner(),
            AccountId::new([0xbb; 20]),
            steth(),
            dtoken(),
            ytoken(),
            VaultConfig::default(),
        )
        .expect("new");
        let mut ledger = MemoryLedger::new();
        for account in [owner(), other()] {
            ledger.mint(&steth(), &account, tokens(1000)).expect("mint");
        }
        (vault, ledger)
    }

    #[test]
    fn test_deposit() {
        let (mut vault, mut ledger) = setup();
        let minted = vault
            .deposit(&mut ledger, owner(), tokens(100))
            .expect("deposit");
        assert_eq!(minted, tokens(100));
        assert_eq!(vault.total_deposits(), tokens(100));
        assert_eq!(ledger.balance_of(&steth(), &owner()), tokens(900));
        assert_eq!(ledger.balance_of(&dtoken(), &owner()), tokens(100));
        assert_eq!(ledger.balance_of(&ytoken(), &owner()), tokens(100));
        assert_eq!(
            vault.drain_events(),
            vec![ProtocolEvent::Deposited {
                account: owner(),
                amount: tokens(100),
                fee: 0
            }]
        );
    }

    #[test]
    fn test_deposit_with_fee() {
        let (mut vault, mut ledger) = setup();
        vault
            .set_fee_recipient(&owner(), Some(other()))
            .expect("recipient");
        vault.set_mint_fee(&owner(), 100).expect("fee");
        vault
            .deposit(&mut ledger, owner(), tokens(100))
            .expect("deposit");
        assert_eq!(vault.total_deposits(), tokens(99));
        assert_eq!(ledger.balance_of(&steth(), &owner()), tokens(900));
        assert_eq!(ledger.balance_of(&steth(), &other()), tokens(1001));
        assert_eq!(ledger.balance_of(&dtoken(), &owner()), tokens(99));
        assert_eq!(ledger.balance_of(&ytoken(), &owner()), tokens(99));
        assert_eq!(vault.pending_yield(&ledger), 0);
    }

    #[test]
    fn test_deposit_above_balance_rejected() {
        let (mut vault, mut ledger) = setup();
        assert!(matches!(
            vault.deposit(&mut ledger, owner(), tokens(1001)),
            Err(VaultError::Ledger(LedgerError::InsufficientBalance { .. }))
        ));
        assert_eq!(vault.total_deposits(), 0);
        assert!(matches!(
            vault.deposit(&mut ledger, owner(), 0),
            Err(VaultError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_redeem() {
        let (mut vault, mut ledger) = setup();
        vault
            .deposit(&mut ledger, owner(), tokens(100))
            .expect("deposit");
        let paid = vault
            .redeem(&mut ledger, owner(), tokens(100))
            .expect("redeem");
        assert_eq!(paid, tokens(100));
        assert_eq!(vault.total_deposits(), 0);
        assert_eq!(ledger.balance_of(&steth(), &owner()), tokens(1000));
        assert_eq!(ledger.balance_of(&dtoken(), &owner()), 0);
        assert_eq!(ledger.balance_of(&ytoken(), &owner()), 0);
    }

    #[test]
    fn test_redeem_with_fee() {
        let (mut vault, mut ledger) = setup();
        vault
            .deposit(&mut ledger, owner(), tokens(100))
            .expect("deposit");
        vault
            .set_fee_recipient(&owner(), Some(other()))
            .expect("recipient");
        vault.set_mint_fee(&owner(), 100).expect("fee");
        vault
            .redeem(&mut ledger, owner(), tokens(100))
            .expect("redeem");
        assert_eq!(vault.total_deposits(), 0);
        assert_eq!(ledger.balance_of(&steth(), &owner()), tokens(999));
        assert_eq!(ledger.balance_of(&steth(), &other()), tokens(1001));
    }

    #[test]
    fn test_redeem_above_balance_rejected() {
        let (mut vault, mut ledger) = setup();
        vault
            .deposit(&mut ledger, owner(), tokens(100))
            .expect("deposit");
        vault
            .deposit(&mut ledger, other(), tokens(100))
            .expect("deposit");
        assert!(matches!(
            vault.redeem(&mut ledger, owner(), tokens(110)),
            Err(VaultError::Ledger(LedgerError::InsufficientBalance { .. }))
        ));
        assert_eq!(vault.total_deposits(), tokens(200));
        assert_eq!(ledger.balance_of(&dtoken(), &owner()), tokens(100));
    }

    #[test]
    fn test_fee_setters() {
        let (mut vault, _) = setup();
        assert!(matches!(
            vault.set_mint_fee(&owner(), 101),
            Err(VaultError::InvalidAmount(_))
        ));
        assert!(matches!(
            vault.set_surplus_fee(&owner(), 10_001),
            Err(VaultError::InvalidAmount(_))
        ));
        assert!(matches!(
            vault.set_mint_fee(&other(), 50),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            vault.set_fee_recipient(&owner(), Some(AccountId::ZERO)),
            Err(VaultError::InvalidAmount(_))
        ));
        vault.set_surplus_fee(&owner(), 10_000).expect("fee");
        assert_eq!(vault.config().surplus_fee_bps, 10_000);
    }

    #[test]
    fn test_pending_yield() {
        let (mut vault, mut ledger) = setup();
        assert_eq!(vault.pending_yield(&ledger), 0);
        vault
            .deposit(&mut ledger, owner(), tokens(100))
            .expect("deposit");
        assert_eq!(vault.pending_yield(&ledger), 0);
        ledger
            .mint(&steth(), &vault.account(), ONE_TOKEN)
            .expect("rebase");
        assert_eq!(vault.pending_yield(&ledger), ONE_TOKEN);
    }

    #[test]
    fn test_collect_surplus() {
        let (mut vault, mut ledger) = setup();
        assert_eq!(vault.collect_surplus(&mut ledger, &owner()).expect("noop"), 0);

        ledger
            .mint(&steth(), &vault.account(), ONE_TOKEN)
            .expect("rebase");
        vault.surplus = ONE_TOKEN;
        assert!(matches!(
            vault.collect_surplus(&mut ledger, &other()),
            Err(VaultError::Unauthorized(_))
        ));
        assert!(matches!(
            vault.collect_surplus(&mut ledger, &owner()),
            Err(VaultError::PreconditionUnmet(_))
        ));
        assert_eq!(vault.surplus(), ONE_TOKEN);

        vault
            .set_fee_recipient(&owner(), Some(other()))
            .expect("recipient");
        assert_eq!(
            vault.collect_surplus(&mut ledger, &owner()).expect("collect"),
            ONE_TOKEN
        );
        assert_eq!(vault.surplus(), 0);
        assert_eq!(ledger.balance_of(&steth(), &other()), tokens(1000) + ONE_TOKEN);
    }
}
