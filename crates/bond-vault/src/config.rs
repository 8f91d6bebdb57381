//! Vault configuration.

use bond_types::{AccountId, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

use crate::{Result, VaultError};

/// Upper bound on the deposit/redeem fee (1%).
pub const MAX_MINT_FEE_BPS: u32 = 100;

/// How a harvest is divided between asset classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Proportional to `weight * total_staked` of each class.
    #[default]
    StakeWeighted,
    /// Proportional to the configured weight alone. Shares of classes with
    /// nothing staked go to surplus.
    FixedShares,
}

/// What a harvest does when nothing eligible is staked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleYieldPolicy {
    /// Leave the yield in the vault for a later harvest.
    #[default]
    Accumulate,
    /// Move the yield into protocol surplus.
    Divert,
}

/// Fees and routing for a [`BondVault`](crate::BondVault).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Fee on deposits and redemptions, in basis points. At most
    /// [`MAX_MINT_FEE_BPS`].
    #[serde(default)]
    pub mint_fee_bps: u32,
    /// Share of each class allotment kept as surplus, in basis points.
    #[serde(default)]
    pub surplus_fee_bps: u32,
    /// Receives deposit/redeem fees and collected surplus.
    #[serde(default)]
    pub fee_recipient: Option<AccountId>,
    /// Harvest split across classes.
    #[serde(default)]
    pub split_mode: SplitMode,
    /// Behaviour when nothing is staked.
    #[serde(default)]
    pub idle_policy: IdleYieldPolicy,
}

impl VaultConfig {
    /// Check every bound.
    pub fn validate(&self) -> Result<()> {
        check_mint_fee(self.mint_fee_bps)?;
        check_surplus_fee(self.surplus_fee_bps)?;
        if let Some(recipient) = self.fee_recipient {
            check_recipient(&recipient)?;
        }
        Ok(())
    }
}

pub(crate) fn check_mint_fee(bps: u32) -> Result<()> {
    if bps > MAX_MINT_FEE_BPS {
        return Err(VaultError::InvalidAmount(format!(
            "mint fee {bps} bps exceeds {MAX_MINT_FEE_BPS}"
        )));
    }
    Ok(())
}

pub(crate) fn check_surplus_fee(bps: u32) -> Result<()> {
    if u128::from(bps) > BPS_DENOMINATOR {
        return Err(VaultError::InvalidAmount(format!(
            "surplus fee {bps} bps exceeds {BPS_DENOMINATOR}"
        )));
    }
    Ok(())
}

pub(crate) fn check_recipient(recipient: &AccountId) -> Result<()> {
    if recipient.is_zero() {
        return Err(VaultError::InvalidAmount(
            "fee recipient must not be the zero account".into(),
        ));
    }
    Ok(())
}
