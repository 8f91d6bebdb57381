//! Integration test: perpetual bond staking walkthrough.
//!
//! Exercises the full deposit → stake → rebase → harvest → settle → unstake
//! → redeem loop with two participants and checks every intermediate
//! accumulator value and balance:
//! 1. Solo staker receives the whole first harvest
//! 2. A late staker earns nothing retroactively
//! 3. `stake(0)` settles without changing the position
//! 4. Unstaking shifts future shares
//! 5. Everyone exits with principal plus exactly the yield distributed
//! 6. Staking through the vault harvests first, so a newcomer never shares
//!    yield earned before it arrived
//! 7. Reward tokens sent straight to the pool are spread on the next touch
//!
//! This test uses bond-vault (deposit, harvest, stake, unstake, redeem),
//! bond-staking (stake, unstake, pending rewards) and bond-ledger
//! (balances).

use bond_ledger::{Ledger, MemoryLedger};
use bond_staking::{ClassConfig, StakingPool};
use bond_types::events::ProtocolEvent;
use bond_types::{AccountId, Amount, AssetClass, TokenId, ONE_TOKEN};
use bond_vault::{BondVault, HarvestOutcome, VaultConfig};

fn owner() -> AccountId {
    AccountId::new([0x01; 20])
}

fn other() -> AccountId {
    AccountId::new([0x02; 20])
}

fn vault_account() -> AccountId {
    AccountId::new([0xbb; 20])
}

fn pool_account() -> AccountId {
    AccountId::new([0xaa; 20])
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

fn bonds() -> AssetClass {
    AssetClass::new("bonds")
}

/// `x` tenths of a token, e.g. `t(915)` is 91.5.
fn t(tenths: u128) -> Amount {
    tenths * ONE_TOKEN / 10
}

/// `x` hundredths of a token.
fn h(hundredths: u128) -> Amount {
    hundredths * ONE_TOKEN / 100
}

struct Bond {
    ledger: MemoryLedger,
    vault: BondVault,
    staking: StakingPool,
}

impl Bond {
    /// Vault and staking pool wired together; both participants hold 100 stETH.
    fn create() -> Self {
        let vault = BondVault::new(
            owner(),
            vault_account(),
            steth(),
            dtoken(),
            ytoken(),
            VaultConfig::default(),
        )
        .expect("Vault creation should succeed");
        let mut staking =
            StakingPool::new(owner(), pool_account(), steth()).expect("Pool creation should succeed");
        staking
            .register_class(
                &owner(),
                ClassConfig {
                    class: bonds(),
                    staking_token: ytoken(),
                    weight: 1,
                },
            )
            .expect("Class registration should succeed");
        staking
            .set_distributor(&owner(), vault_account(), true)
            .expect("Distributor grant should succeed");

        let mut ledger = MemoryLedger::new();
        for account in [owner(), other()] {
            ledger
                .mint(&steth(), &account, t(1000))
                .expect("Funding should succeed");
        }
        Self {
            ledger,
            vault,
            staking,
        }
    }

    fn deposit(&mut self, who: AccountId, amount: Amount) {
        self.vault
            .deposit(&mut self.ledger, who, amount)
            .expect("Deposit should succeed");
    }

    fn redeem(&mut self, who: AccountId, amount: Amount) {
        self.vault
            .redeem(&mut self.ledger, who, amount)
            .expect("Redeem should succeed");
    }

    fn stake(&mut self, who: AccountId, amount: Amount) {
        self.staking
            .stake(&mut self.ledger, who, &bonds(), amount)
            .expect("Stake should succeed");
    }

    fn unstake(&mut self, who: AccountId, amount: Amount) {
        self.staking
            .unstake(&mut self.ledger, who, &bonds(), amount)
            .expect("Unstake should succeed");
    }

    fn vault_stake(&mut self, who: AccountId, amount: Amount) {
        self.vault
            .stake(&mut self.ledger, &mut self.staking, who, &bonds(), amount)
            .expect("Vault stake should succeed");
    }

    fn vault_unstake(&mut self, who: AccountId, amount: Amount) {
        self.vault
            .unstake(&mut self.ledger, &mut self.staking, who, &bonds(), amount)
            .expect("Vault unstake should succeed");
    }

    /// Reward tokens sent to the pool account outside any harvest.
    fn donate(&mut self, amount: Amount) {
        self.ledger
            .mint(&steth(), &pool_account(), amount)
            .expect("Donation should succeed");
    }

    fn rebase(&mut self, amount: Amount) {
        self.ledger
            .mint(&steth(), &vault_account(), amount)
            .expect("Rebase should succeed");
    }

    fn harvest(&mut self) -> HarvestOutcome {
        self.vault
            .harvest(&mut self.ledger, &mut self.staking)
            .expect("Harvest should succeed")
    }

    fn acc(&self) -> Amount {
        self.staking
            .accumulator(&bonds())
            .expect("Class should exist")
            .acc_rewards_per_share
    }

    fn pending(&self, who: AccountId) -> Amount {
        self.staking
            .pending_rewards(&who, &bonds())
            .expect("Pending rewards should compute")
    }

    fn balance(&self, token: &TokenId, who: AccountId) -> Amount {
        self.ledger.balance_of(token, &who)
    }
}

#[test]
fn test_pending_rewards_with_two_stakers() {
    let mut bond = Bond::create();
    bond.deposit(owner(), t(100));
    bond.stake(owner(), t(100));
    bond.rebase(t(10));
    bond.harvest();
    assert_eq!(bond.acc(), t(1));
    assert_eq!(bond.pending(owner()), t(10));

    bond.deposit(other(), t(100));
    bond.stake(other(), t(100));
    assert_eq!(bond.acc(), t(1));
    assert_eq!(bond.pending(other()), 0);

    bond.rebase(t(10));
    bond.harvest();
    assert_eq!(bond.acc(), h(15));
    assert_eq!(bond.pending(owner()), t(15));
    assert_eq!(bond.pending(other()), t(5));
}

#[test]
fn test_collect_yield_walkthrough() {
    let mut bond = Bond::create();
    bond.deposit(owner(), t(100));

    // Owner stakes half, one token of yield arrives.
    bond.stake(owner(), t(50));
    bond.rebase(t(10));
    bond.harvest();
    assert_eq!(bond.acc(), t(2));
    assert_eq!(bond.pending(owner()), t(10));

    // Owner stakes the rest; the pending token is paid out.
    bond.stake(owner(), t(50));
    assert_eq!(bond.harvest(), HarvestOutcome::NoYield);

    bond.deposit(other(), t(100));
    bond.stake(other(), t(100));
    bond.rebase(t(10));
    bond.harvest();
    assert_eq!(bond.acc(), h(25));
    assert_eq!(bond.pending(owner()), t(5));
    assert_eq!(bond.pending(other()), t(5));

    bond.stake(owner(), 0);
    bond.stake(other(), 0);
    assert_eq!(bond.pending(owner()), 0);
    assert_eq!(bond.pending(other()), 0);
    assert_eq!(bond.balance(&steth(), owner()), t(915));
    assert_eq!(bond.balance(&steth(), other()), t(905));

    bond.unstake(owner(), t(50));
    bond.rebase(t(30));
    bond.harvest();
    assert_eq!(bond.balance(&ytoken(), pool_account()), t(150));
    assert_eq!(bond.acc(), h(45));
    assert_eq!(bond.pending(owner()), t(10));
    assert_eq!(bond.pending(other()), t(20));

    bond.stake(owner(), 0);
    assert_eq!(bond.pending(owner()), 0);
    bond.rebase(t(30));
    bond.harvest();
    assert_eq!(bond.acc(), h(65));
    assert_eq!(bond.pending(owner()), t(10));
    assert_eq!(bond.pending(other()), t(40));

    bond.unstake(owner(), t(50));
    bond.unstake(other(), t(50));
    assert_eq!(bond.pending(owner()), 0);
    assert_eq!(bond.pending(other()), 0);
    assert_eq!(bond.balance(&ytoken(), pool_account()), t(50));
    bond.unstake(other(), t(50));
    assert_eq!(bond.balance(&ytoken(), pool_account()), 0);
    assert_eq!(bond.balance(&steth(), pool_account()), 0);
    assert_eq!(bond.acc(), h(65));

    assert_eq!(bond.balance(&ytoken(), owner()), t(100));
    assert_eq!(bond.balance(&dtoken(), owner()), t(100));
    assert_eq!(bond.balance(&steth(), owner()), t(935));
    bond.redeem(owner(), t(100));
    assert_eq!(bond.balance(&steth(), owner()), t(1035));

    assert_eq!(bond.balance(&ytoken(), other()), t(100));
    assert_eq!(bond.balance(&dtoken(), other()), t(100));
    assert_eq!(bond.balance(&steth(), other()), t(945));
    bond.redeem(other(), t(100));
    assert_eq!(bond.balance(&steth(), other()), t(1045));

    assert_eq!(bond.vault.total_deposits(), 0);
    assert_eq!(bond.balance(&steth(), vault_account()), 0);
}

#[test]
fn test_vault_stake_settles_prior_yield_first() {
    let mut bond = Bond::create();
    bond.deposit(owner(), t(100));
    bond.vault_stake(owner(), t(100));
    bond.rebase(t(10));

    bond.deposit(other(), t(100));
    bond.vault_stake(other(), t(100));
    assert_eq!(bond.vault.pending_yield(&bond.ledger), 0);
    assert_eq!(bond.pending(owner()), t(10));
    assert_eq!(bond.pending(other()), 0);
}

#[test]
fn test_all_actions() {
    let mut bond = Bond::create();
    bond.deposit(owner(), t(100));
    bond.vault_stake(owner(), t(50));
    bond.rebase(t(10));
    bond.donate(t(10));
    bond.vault_stake(owner(), t(50));
    bond.deposit(other(), t(100));
    bond.vault_stake(other(), t(100));
    bond.rebase(t(10));
    bond.rebase(t(5));
    bond.vault_stake(owner(), 0);
    bond.vault_stake(other(), 0);
    bond.vault_unstake(owner(), t(50));
    bond.rebase(t(30));
    bond.vault_stake(owner(), 0);
    bond.rebase(t(30));
    bond.donate(t(30));
    bond.vault_unstake(owner(), t(50));
    bond.vault_unstake(other(), t(50));
    bond.vault_unstake(other(), t(50));
    bond.redeem(owner(), t(100));
    bond.redeem(other(), t(100));
    bond.deposit(owner(), t(20));
    bond.vault_stake(owner(), t(10));
    bond.deposit(other(), t(20));
    bond.vault_stake(other(), t(20));
    bond.rebase(t(3));
    bond.donate(t(3));
    bond.vault_unstake(owner(), t(10));
    bond.vault_unstake(other(), t(20));

    assert_eq!(bond.balance(&steth(), owner()), h(10395));
    assert_eq!(bond.balance(&steth(), other()), h(10515));
    assert_eq!(bond.balance(&steth(), pool_account()), 0);
    assert_eq!(bond.staking.reward_reserve(), 0);
    assert_eq!(bond.vault.pending_yield(&bond.ledger), 0);
}

#[test]
fn test_events_are_emitted_in_order() {
    let mut bond = Bond::create();
    bond.deposit(owner(), t(100));
    bond.stake(owner(), t(100));
    bond.rebase(t(10));
    bond.harvest();
    bond.stake(owner(), 0);

    let vault_events: Vec<String> = bond.vault.drain_events().iter().map(event_name).collect();
    assert_eq!(vault_events, vec!["deposited", "distributed", "harvested"]);

    let staking_events: Vec<String> = bond.staking.drain_events().iter().map(event_name).collect();
    assert_eq!(staking_events, vec!["role_updated", "staked", "reward_paid"]);
}

/// Tag of an externally tagged event as it appears in JSON.
fn event_name(event: &ProtocolEvent) -> String {
    let json = serde_json::to_string(event).expect("Event should serialize");
    json.split('"').nth(1).unwrap_or_default().to_string()
}
