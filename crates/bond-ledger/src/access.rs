//! Owner and role capability checks.
//!
//! Permission checks are kept out of the accounting logic: each engine owns
//! an [`AccessControl`] table and asks it for a capability before any
//! mutating operation that is not open to every caller.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bond_types::AccountId;
use serde::{Deserialize, Serialize};

/// A capability an account may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Configures fees, recipients and other roles.
    Owner,
    /// May mint escrow tokens.
    Minter,
    /// May move escrow tokens between accounts.
    Transferer,
    /// The registered vault allowed to push yield into a staking pool.
    Distributor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "owner",
            Role::Minter => "minter",
            Role::Transferer => "transferer",
            Role::Distributor => "distributor",
        };
        f.write_str(name)
    }
}

/// The caller does not hold the required capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{account} lacks the {role} role")]
pub struct AccessDenied {
    /// Role that was required.
    pub role: Role,
    /// Account that attempted the operation.
    pub account: AccountId,
}

/// Owner plus role grants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessControl {
    owner: AccountId,
    grants: BTreeMap<Role, BTreeSet<AccountId>>,
}

impl AccessControl {
    /// Create a table owned by `owner` with no other grants.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            grants: BTreeMap::new(),
        }
    }

    /// The current owner.
    pub fn owner(&self) -> AccountId {
        self.owner
    }

    /// Whether `account` holds `role`.
    pub fn has_role(&self, role: Role, account: &AccountId) -> bool {
        match role {
            Role::Owner => *account == self.owner,
            _ => self
                .grants
                .get(&role)
                .is_some_and(|accounts| accounts.contains(account)),
        }
    }

    /// Fail unless `caller` holds `role`.
    pub fn require(&self, role: Role, caller: &AccountId) -> Result<(), AccessDenied> {
        if self.has_role(role, caller) {
            Ok(())
        } else {
            tracing::debug!(%role, %caller, "access denied");
            Err(AccessDenied {
                role,
                account: *caller,
            })
        }
    }

    /// Fail unless `caller` is the owner.
    pub fn require_owner(&self, caller: &AccountId) -> Result<(), AccessDenied> {
        self.require(Role::Owner, caller)
    }

    /// Grant or revoke a non-owner role. Owner only.
    ///
    /// Returns whether the table changed. Granting [`Role::Owner`] is done
    /// with [`transfer_ownership`](Self::transfer_ownership) instead and is
    /// a no-op here.
    pub fn set_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
        enabled: bool,
    ) -> Result<bool, AccessDenied> {
        self.require_owner(caller)?;
        if role == Role::Owner {
            return Ok(false);
        }
        let accounts = self.grants.entry(role).or_default();
        let changed = if enabled {
            accounts.insert(account)
        } else {
            accounts.remove(&account)
        };
        if changed {
            tracing::info!(%role, %account, enabled, "role updated");
        }
        Ok(changed)
    }

    /// Hand ownership to `new_owner`. Owner only.
    pub fn transfer_ownership(
        &mut self,
        caller: &AccountId,
        new_owner: AccountId,
    ) -> Result<(), AccessDenied> {
        self.require_owner(caller)?;
        tracing::info!(old = %self.owner, new = %new_owner, "ownership transferred");
        self.owner = new_owner;
        Ok(())
    }
}
