//! Integration test: vault fees, harvest routing and protocol surplus.
//!
//! Exercises:
//! 1. Deposit and redeem fees reaching the fee recipient
//! 2. Equal stakers splitting a harvest equally
//! 3. Idle yield left pending, then picked up by the first staker
//! 4. Idle yield diverted to surplus and recovered by fee collection
//! 5. Surplus skim and empty-class shares across two asset classes
//! 6. Custody always equal to principal + surplus + pending yield
//!
//! This test uses bond-vault, bond-staking and bond-ledger.

use bond_ledger::{Ledger, MemoryLedger};
use bond_staking::{ClassConfig, StakingPool};
use bond_types::events::{DistributionRecord, DistributionTarget, ProtocolEvent};
use bond_types::{AccountId, Amount, AssetClass, TokenId, ONE_TOKEN};
use bond_vault::{BondVault, HarvestOutcome, IdleYieldPolicy, SplitMode, VaultConfig, VaultError};

fn owner() -> AccountId {
    AccountId::new([0x01; 20])
}

fn alice() -> AccountId {
    AccountId::new([0x0a; 20])
}

fn bob() -> AccountId {
    AccountId::new([0x0b; 20])
}

fn treasury() -> AccountId {
    AccountId::new([0x7e; 20])
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

fn ytoken() -> TokenId {
    TokenId::new("yToken")
}

fn lp_token() -> TokenId {
    TokenId::new("LP")
}

fn bonds() -> AssetClass {
    AssetClass::new("bonds")
}

fn lp() -> AssetClass {
    AssetClass::new("lp")
}

fn tokens(whole: u128) -> Amount {
    whole * ONE_TOKEN
}

struct Protocol {
    ledger: MemoryLedger,
    vault: BondVault,
    staking: StakingPool,
}

impl Protocol {
    fn deploy(config: VaultConfig, classes: &[(AssetClass, TokenId, u64)]) -> Self {
        let vault = BondVault::new(
            owner(),
            vault_account(),
            steth(),
            TokenId::new("dToken"),
            ytoken(),
            config,
        )
        .expect("Vault creation should succeed");
        let mut staking =
            StakingPool::new(owner(), pool_account(), steth()).expect("Pool creation should succeed");
        for (class, token, weight) in classes {
            staking
                .register_class(
                    &owner(),
                    ClassConfig {
                        class: class.clone(),
                        staking_token: token.clone(),
                        weight: *weight,
                    },
                )
                .expect("Class registration should succeed");
        }
        staking
            .set_distributor(&owner(), vault_account(), true)
            .expect("Distributor grant should succeed");

        let mut ledger = MemoryLedger::new();
        for account in [alice(), bob()] {
            ledger
                .mint(&steth(), &account, tokens(100))
                .expect("Funding should succeed");
            ledger
                .mint(&lp_token(), &account, tokens(100))
                .expect("Funding should succeed");
        }
        Self {
            ledger,
            vault,
            staking,
        }
    }

    fn single_class(config: VaultConfig) -> Self {
        Self::deploy(config, &[(bonds(), ytoken(), 1)])
    }

    fn deposit_and_stake(&mut self, who: AccountId, amount: Amount) {
        self.vault
            .deposit(&mut self.ledger, who, amount)
            .expect("Deposit should succeed");
        let minted = self.ledger.balance_of(&ytoken(), &who);
        self.staking
            .stake(&mut self.ledger, who, &bonds(), minted)
            .expect("Stake should succeed");
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

    fn pending(&self, who: AccountId, class: &AssetClass) -> Amount {
        self.staking
            .pending_rewards(&who, class)
            .expect("Pending rewards should compute")
    }

    fn assert_custody_balanced(&self) {
        let custody = self.ledger.balance_of(&steth(), &vault_account());
        assert_eq!(
            custody,
            self.vault.total_deposits() + self.vault.surplus() + self.vault.pending_yield(&self.ledger)
        );
    }
}

#[test]
fn test_deposit_fee_goes_to_recipient() {
    let config = VaultConfig {
        mint_fee_bps: 100,
        fee_recipient: Some(treasury()),
        ..VaultConfig::default()
    };
    let mut protocol = Protocol::single_class(config);
    protocol.deposit_and_stake(alice(), tokens(10));

    assert_eq!(protocol.vault.total_deposits(), tokens(99) / 10);
    assert_eq!(protocol.ledger.balance_of(&steth(), &treasury()), tokens(1) / 10);
    assert_eq!(
        protocol.staking.total_staked(&bonds()),
        tokens(99) / 10
    );
    protocol.assert_custody_balanced();

    // Redeeming after unstaking pays principal less the same fee.
    protocol
        .staking
        .unstake(&mut protocol.ledger, alice(), &bonds(), tokens(99) / 10)
        .expect("Unstake should succeed");
    let paid = protocol
        .vault
        .redeem(&mut protocol.ledger, alice(), tokens(99) / 10)
        .expect("Redeem should succeed");
    assert_eq!(paid, tokens(99) / 10 - tokens(99) / 1000);
    assert_eq!(protocol.vault.total_deposits(), 0);
    protocol.assert_custody_balanced();
}

#[test]
fn test_mint_fee_bounds() {
    let mut protocol = Protocol::single_class(VaultConfig::default());
    assert!(matches!(
        protocol.vault.set_mint_fee(&owner(), 101),
        Err(VaultError::InvalidAmount(_))
    ));
    assert!(matches!(
        protocol.vault.set_mint_fee(&alice(), 10),
        Err(VaultError::Unauthorized(_))
    ));
    protocol
        .vault
        .set_mint_fee(&owner(), 100)
        .expect("Fee at the bound should be accepted");
}

#[test]
fn test_equal_stakes_split_equally() {
    let mut protocol = Protocol::single_class(VaultConfig::default());
    protocol.deposit_and_stake(alice(), tokens(10));
    protocol.deposit_and_stake(bob(), tokens(10));
    protocol.rebase(tokens(2));
    protocol.harvest();
    assert_eq!(protocol.pending(alice(), &bonds()), tokens(1));
    assert_eq!(protocol.pending(bob(), &bonds()), tokens(1));
    protocol.assert_custody_balanced();
}

#[test]
fn test_idle_yield_accumulates_then_pays_first_staker() {
    let mut protocol = Protocol::single_class(VaultConfig::default());
    protocol
        .vault
        .deposit(&mut protocol.ledger, alice(), tokens(10))
        .expect("Deposit should succeed");
    protocol.vault.drain_events();
    protocol.rebase(tokens(1));

    let before = protocol.ledger.clone();
    assert_eq!(
        protocol.harvest(),
        HarvestOutcome::NoStake {
            pending: tokens(1)
        }
    );
    assert!(protocol.vault.events().is_empty());
    assert_eq!(
        protocol.ledger.balance_of(&steth(), &vault_account()),
        before.balance_of(&steth(), &vault_account())
    );
    assert_eq!(protocol.ledger.balance_of(&steth(), &pool_account()), 0);

    protocol
        .staking
        .stake(&mut protocol.ledger, alice(), &bonds(), tokens(10))
        .expect("Stake should succeed");
    protocol.harvest();
    assert_eq!(protocol.pending(alice(), &bonds()), tokens(1));
}

#[test]
fn test_diverted_yield_recovered_by_collection() {
    let config = VaultConfig {
        fee_recipient: Some(treasury()),
        idle_policy: IdleYieldPolicy::Divert,
        ..VaultConfig::default()
    };
    let mut protocol = Protocol::single_class(config);
    protocol
        .vault
        .deposit(&mut protocol.ledger, alice(), tokens(10))
        .expect("Deposit should succeed");
    protocol.vault.drain_events();
    protocol.rebase(tokens(1));
    protocol.harvest();

    assert_eq!(protocol.vault.surplus(), tokens(1));
    assert_eq!(protocol.vault.pending_yield(&protocol.ledger), 0);
    assert_eq!(
        protocol.vault.drain_events(),
        vec![
            ProtocolEvent::Distributed(DistributionRecord {
                target: DistributionTarget::Protocol,
                amount: tokens(1),
                total_staked: 0,
            }),
            ProtocolEvent::Harvested { amount: tokens(1) },
        ]
    );
    protocol.assert_custody_balanced();

    let collected = protocol
        .vault
        .collect_surplus(&mut protocol.ledger, &owner())
        .expect("Collection should succeed");
    assert_eq!(collected, tokens(1));
    assert_eq!(protocol.ledger.balance_of(&steth(), &treasury()), tokens(1));
    assert_eq!(protocol.vault.surplus(), 0);
    assert_eq!(
        protocol.ledger.balance_of(&steth(), &vault_account()),
        protocol.vault.total_deposits()
    );

    // A second collection has nothing to do.
    assert_eq!(
        protocol
            .vault
            .collect_surplus(&mut protocol.ledger, &owner())
            .expect("Empty collection should succeed"),
        0
    );
}

#[test]
fn test_collect_without_recipient_fails_cleanly() {
    let config = VaultConfig {
        idle_policy: IdleYieldPolicy::Divert,
        ..VaultConfig::default()
    };
    let mut protocol = Protocol::single_class(config);
    protocol.rebase(tokens(1));
    protocol.harvest();
    assert!(matches!(
        protocol.vault.collect_surplus(&mut protocol.ledger, &owner()),
        Err(VaultError::PreconditionUnmet(_))
    ));
    assert_eq!(protocol.vault.surplus(), tokens(1));
    protocol.assert_custody_balanced();
}

#[test]
fn test_skim_and_empty_class_shares() {
    let config = VaultConfig {
        surplus_fee_bps: 1_000,
        fee_recipient: Some(treasury()),
        split_mode: SplitMode::FixedShares,
        ..VaultConfig::default()
    };
    let mut protocol = Protocol::deploy(
        config,
        &[(bonds(), ytoken(), 3), (lp(), lp_token(), 1)],
    );
    protocol.deposit_and_stake(alice(), tokens(10));
    protocol.rebase(tokens(4));

    let HarvestOutcome::Harvested(report) = protocol.harvest() else {
        panic!("Harvest should route the yield");
    };
    // bonds: 3 of 4 tokens, 10% skimmed. lp: nobody staked, 1 token to surplus.
    let skim = tokens(3) / 10;
    assert_eq!(
        report.distributions,
        vec![
            DistributionRecord {
                target: DistributionTarget::AssetClass(bonds()),
                amount: tokens(3) - skim,
                total_staked: tokens(10),
            },
            DistributionRecord {
                target: DistributionTarget::Protocol,
                amount: tokens(1) + skim,
                total_staked: 0,
            },
        ]
    );
    assert_eq!(protocol.pending(alice(), &bonds()), tokens(3) - skim);
    assert_eq!(protocol.vault.surplus(), tokens(1) + skim);
    protocol.assert_custody_balanced();

    // Once lp has stakers it earns its share.
    protocol
        .staking
        .stake(&mut protocol.ledger, bob(), &lp(), tokens(5))
        .expect("Stake should succeed");
    protocol.rebase(tokens(4));
    protocol.harvest();
    assert_eq!(protocol.pending(bob(), &lp()), tokens(1) - tokens(1) / 10);
    protocol
        .vault
        .collect_surplus(&mut protocol.ledger, &owner())
        .expect("Collection should succeed");
    protocol.assert_custody_balanced();
}
