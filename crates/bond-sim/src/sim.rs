//! Scenario execution against in-memory collaborators.

use std::collections::BTreeMap;

use anyhow::Context;
use bond_ledger::{Clock, Ledger, ManualClock, MemoryLedger};
use bond_staking::StakingPool;
use bond_types::events::ProtocolEvent;
use bond_types::{AccountId, Amount, AssetClass, Timestamp, TokenId};
use bond_vault::BondVault;
use bond_vesting::VestingLedger;
use serde::Serialize;

use crate::config::SimConfig;
use crate::scenario::{Scenario, Step};

/// Name of the account that owns every engine.
pub const OWNER: &str = "owner";

/// Outcome of one step.
#[derive(Debug, Serialize)]
pub struct StepReport {
    /// Position in the scenario.
    pub index: usize,
    /// Step name.
    pub step: &'static str,
    /// Clock reading when the step ran.
    pub time: Timestamp,
    /// Events emitted by the step.
    pub events: Vec<ProtocolEvent>,
    /// Failure message, if the step was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state after a scenario.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Per-step results.
    pub steps: Vec<StepReport>,
    /// Account names and the ids assigned to them.
    pub accounts: BTreeMap<String, AccountId>,
    /// Non-zero balances by token, then account name.
    pub balances: BTreeMap<TokenId, BTreeMap<String, Amount>>,
    /// Pending staking rewards by account name, then class.
    pub pending_rewards: BTreeMap<String, BTreeMap<AssetClass, Amount>>,
    /// Claimable vesting by account name.
    pub claimable: BTreeMap<String, Amount>,
    /// Vault principal.
    pub total_deposits: Amount,
    /// Protocol surplus awaiting collection.
    pub surplus: Amount,
    /// Yield not yet harvested.
    pub pending_yield: Amount,
    /// Final clock reading.
    pub time: Timestamp,
}

/// In-memory protocol deployment driven by scenario steps.
pub struct Simulator {
    config: SimConfig,
    ledger: MemoryLedger,
    clock: ManualClock,
    vault: BondVault,
    staking: StakingPool,
    vesting: VestingLedger,
    accounts: BTreeMap<String, AccountId>,
}

impl Simulator {
    /// Deploy the engines described by `config` with the clock at `start`.
    pub fn new(config: SimConfig, start: Timestamp) -> anyhow::Result<Self> {
        let mut accounts = BTreeMap::new();
        let owner = account_id(0);
        accounts.insert(OWNER.to_string(), owner);
        let vault_account = account_id(1);
        let pool_account = account_id(2);
        let custody = account_id(3);
        accounts.insert("vault".to_string(), vault_account);
        accounts.insert("staking".to_string(), pool_account);
        accounts.insert("vesting".to_string(), custody);

        let tokens = &config.tokens;
        let vault = BondVault::new(
            owner,
            vault_account,
            tokens.underlying.clone(),
            tokens.deposit_token.clone(),
            tokens.yield_token.clone(),
            config.vault.clone(),
        )
        .context("vault configuration")?;

        let mut staking = StakingPool::new(owner, pool_account, tokens.underlying.clone())
            .context("staking configuration")?;
        for class in &config.staking.classes {
            staking
                .register_class(&owner, class.clone())
                .with_context(|| format!("registering class {}", class.class))?;
        }
        staking.set_distributor(&owner, vault_account, true)?;

        let mut vesting = VestingLedger::new(
            owner,
            custody,
            tokens.escrow_token.clone(),
            tokens.liquid_token.clone(),
            config.vesting.clone(),
        )
        .context("vesting configuration")?;
        vesting.set_minter(&owner, owner, true)?;

        tracing::info!(
            start,
            classes = config.staking.classes.len(),
            "sim: deployed"
        );
        Ok(Self {
            config,
            ledger: MemoryLedger::new(),
            clock: ManualClock::new(start),
            vault,
            staking,
            vesting,
            accounts,
        })
    }

    /// Run every step of `scenario` and report the final state.
    ///
    /// A rejected step is recorded in the report and does not stop the run.
    pub fn run(mut self, scenario: &Scenario) -> anyhow::Result<Report> {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let time = self.now();
            let error = match self.apply(step) {
                Ok(()) => {
                    tracing::info!(index, step = step.name(), "sim: step applied");
                    None
                }
                Err(err) => {
                    tracing::warn!(index, step = step.name(), error = %err, "sim: step rejected");
                    Some(format!("{err:#}"))
                }
            };
            steps.push(StepReport {
                index,
                step: step.name(),
                time,
                events: self.drain_events(),
                error,
            });
        }
        self.report(steps)
    }

    /// Apply one step.
    pub fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
        let owner = self.account(OWNER);
        match step {
            Step::Fund { account, amount } => {
                let to = self.account(account);
                self.ledger
                    .mint(&self.config.tokens.underlying, &to, amount.0)?;
            }
            Step::Deposit { account, amount } => {
                let depositor = self.account(account);
                self.vault.deposit(&mut self.ledger, depositor, amount.0)?;
            }
            Step::Redeem { account, amount } => {
                let holder = self.account(account);
                self.vault.redeem(&mut self.ledger, holder, amount.0)?;
            }
            Step::Stake {
                account,
                class,
                amount,
            } => {
                let staker = self.account(account);
                self.vault
                    .stake(&mut self.ledger, &mut self.staking, staker, class, amount.0)?;
            }
            Step::Unstake {
                account,
                class,
                amount,
            } => {
                let staker = self.account(account);
                self.vault
                    .unstake(&mut self.ledger, &mut self.staking, staker, class, amount.0)?;
            }
            Step::EmergencyWithdraw { account, class } => {
                let staker = self.account(account);
                self.staking
                    .emergency_withdraw(&mut self.ledger, staker, class)?;
            }
            Step::AddYield { amount } => {
                let vault = self.vault.account();
                self.ledger
                    .mint(&self.config.tokens.underlying, &vault, amount.0)?;
            }
            Step::Harvest => {
                let outcome = self.vault.harvest(&mut self.ledger, &mut self.staking)?;
                tracing::debug!(?outcome, "sim: harvest outcome");
            }
            Step::CollectSurplus => {
                self.vault.collect_surplus(&mut self.ledger, &owner)?;
            }
            Step::MintEscrow { to, amount } => {
                let to = self.account(to);
                self.vesting
                    .mint_escrow(&mut self.ledger, &owner, to, amount.0)?;
            }
            Step::Vest { account, amount } => {
                let holder = self.account(account);
                self.vesting
                    .vest(&mut self.ledger, &self.clock, holder, amount.0)?;
            }
            Step::Claim { account, index } => {
                let holder = self.account(account);
                match index {
                    Some(index) => {
                        self.vesting
                            .claim(&mut self.ledger, &self.clock, holder, *index)?;
                    }
                    None => {
                        self.vesting
                            .claim_all(&mut self.ledger, &self.clock, holder)?;
                    }
                }
            }
            Step::Advance { seconds } => self.clock.advance(*seconds),
        }
        Ok(())
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Id for `name`, assigning the next free one on first use.
    fn account(&mut self, name: &str) -> AccountId {
        if let Some(id) = self.accounts.get(name) {
            return *id;
        }
        let id = match name.parse::<AccountId>() {
            Ok(id) => id,
            Err(_) => account_id(self.accounts.len() as u32),
        };
        self.accounts.insert(name.to_string(), id);
        id
    }

    fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        let mut events = self.vault.drain_events();
        events.extend(self.staking.drain_events());
        events.extend(self.vesting.drain_events());
        events
    }

    fn report(self, steps: Vec<StepReport>) -> anyhow::Result<Report> {
        let names: BTreeMap<AccountId, String> = self
            .accounts
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
        let label = |id: &AccountId| names.get(id).cloned().unwrap_or_else(|| id.to_string());

        let tokens = &self.config.tokens;
        let mut token_ids = vec![
            tokens.underlying.clone(),
            tokens.deposit_token.clone(),
            tokens.yield_token.clone(),
            tokens.escrow_token.clone(),
            tokens.liquid_token.clone(),
        ];
        for class in &self.config.staking.classes {
            if !token_ids.contains(&class.staking_token) {
                token_ids.push(class.staking_token.clone());
            }
        }
        let balances = token_ids
            .into_iter()
            .map(|token| {
                let holders = self
                    .ledger
                    .holders(&token)
                    .into_iter()
                    .map(|(id, amount)| (label(&id), amount))
                    .collect();
                (token, holders)
            })
            .collect();

        let mut pending_rewards: BTreeMap<String, BTreeMap<AssetClass, Amount>> = BTreeMap::new();
        let mut claimable = BTreeMap::new();
        for (name, id) in &self.accounts {
            for (class, state) in self.staking.classes() {
                if state.positions.contains_key(id) {
                    let pending = self.staking.pending_rewards(id, class)?;
                    pending_rewards
                        .entry(name.clone())
                        .or_default()
                        .insert(class.clone(), pending);
                }
            }
            if !self.vesting.positions(id).is_empty() {
                claimable.insert(name.clone(), self.vesting.total_claimable(&self.clock, id)?);
            }
        }

        Ok(Report {
            steps,
            accounts: self.accounts.clone(),
            balances,
            pending_rewards,
            claimable,
            total_deposits: self.vault.total_deposits(),
            surplus: self.vault.surplus(),
            pending_yield: self.vault.pending_yield(&self.ledger),
            time: self.now(),
        })
    }
}

/// Deterministic id for the `n`th named account.
fn account_id(n: u32) -> AccountId {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xb0;
    bytes[16..].copy_from_slice(&(n + 1).to_be_bytes());
    AccountId::new(bytes)
}
