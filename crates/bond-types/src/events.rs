//! Protocol event records.
//!
//! Every value-moving operation emits one or more [`ProtocolEvent`]s into
//! the owning engine's [`EventLog`]. Callers drain the log after each step;
//! indexers and auditors consume the records in emission order.

use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, AssetClass};

/// Who received a slice of a harvest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionTarget {
    /// Stakers of an asset class, through its accumulator.
    AssetClass(AssetClass),
    /// The protocol surplus, later collected by the fee recipient.
    Protocol,
}

/// One credited slice of a harvest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    /// Recipient of this slice.
    pub target: DistributionTarget,
    /// Amount credited.
    pub amount: Amount,
    /// Denominator the slice was spread over (zero for the protocol slice).
    pub total_staked: Amount,
}

/// An event emitted by one of the accounting engines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// Underlying deposited into the bond vault.
    Deposited {
        account: AccountId,
        amount: Amount,
        fee: Amount,
    },
    /// Deposit and yield tokens redeemed for underlying.
    Redeemed {
        account: AccountId,
        amount: Amount,
        fee: Amount,
    },
    /// Yield measured and routed by a harvest.
    Harvested { amount: Amount },
    /// One slice of a harvest.
    Distributed(DistributionRecord),
    /// Protocol surplus paid out to the fee recipient.
    SurplusCollected { recipient: AccountId, amount: Amount },
    /// Tokens staked into an asset class.
    Staked {
        staker: AccountId,
        class: AssetClass,
        amount: Amount,
    },
    /// Tokens unstaked from an asset class.
    Unstaked {
        staker: AccountId,
        class: AssetClass,
        amount: Amount,
    },
    /// Settled staking reward paid out.
    RewardPaid {
        staker: AccountId,
        class: AssetClass,
        amount: Amount,
    },
    /// Principal returned without rewards.
    EmergencyWithdrawn {
        staker: AccountId,
        class: AssetClass,
        amount: Amount,
        forfeited: Amount,
    },
    /// Escrow tokens committed to a vesting position.
    Vested {
        holder: AccountId,
        index: usize,
        amount: Amount,
    },
    /// Vested amount released as liquid tokens.
    Claimed {
        holder: AccountId,
        index: usize,
        amount: Amount,
    },
    /// Escrow tokens minted by a minter.
    EscrowMinted { to: AccountId, amount: Amount },
    /// Escrow tokens moved by a transferer.
    EscrowTransferred {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    /// A role was granted or revoked.
    RoleUpdated {
        account: AccountId,
        role: String,
        enabled: bool,
    },
}

/// Append-only event buffer with a running sequence number.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
    sequence: u64,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn emit(&mut self, event: ProtocolEvent) {
        self.sequence += 1;
        self.events.push(event);
    }

    /// Events emitted since the last drain.
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Take all buffered events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Total number of events ever emitted (not reset by [`drain`](Self::drain)).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
