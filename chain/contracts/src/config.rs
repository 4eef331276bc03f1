//! Deployment configuration
//!
//! Values fixed when the contract is deployed: who the admin is, the
//! contract's own script hash, which assets play the principal and
//! collateral roles, and how double withdrawals are detected.

use serde::{Deserialize, Serialize};
use types::ids::{Address, AssetId, ScriptHash, GAS_ASSET, NEO_ASSET};
use types::numeric::{Amount, Height, PERCENT_BASE};

use crate::errors::ConfigError;

/// History-scan limit when none is configured: one day of 15 s blocks.
pub const DEFAULT_SCAN_SPAN: Height = 5760;

/// How the verifier decides that a withdrawal window was already used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReplayGuard {
    /// Scan every block from the window start for an earlier withdrawal to
    /// the same destination. Cost grows with the window age, so windows
    /// older than `max_span` blocks are rejected outright.
    HistoryScan { max_span: Height },
    /// Trust the open window alone. Only sound on hosts that run
    /// `settleWithdrawal` in the same transaction as the transfer and drop
    /// the transfer when settlement fails.
    Sequence,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        ReplayGuard::HistoryScan {
            max_span: DEFAULT_SCAN_SPAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Address whose witness authorizes admin operations
    pub admin: Address,
    /// Script hash of this contract
    pub contract_hash: ScriptHash,
    /// Asset lent out by offers
    #[serde(default = "default_principal_asset")]
    pub principal_asset: AssetId,
    /// Asset pledged by demands
    #[serde(default = "default_collateral_asset")]
    pub collateral_asset: AssetId,
    /// Collateral required per unit of principal, in percent
    #[serde(default = "default_collateral_ratio")]
    pub collateral_ratio: u64,
    #[serde(default)]
    pub replay_guard: ReplayGuard,
}

fn default_principal_asset() -> AssetId {
    GAS_ASSET
}

fn default_collateral_asset() -> AssetId {
    NEO_ASSET
}

fn default_collateral_ratio() -> u64 {
    150
}

impl ContractConfig {
    /// GAS principal, NEO collateral, 150% collateral, bounded history scan.
    pub fn new(admin: Address, contract_hash: ScriptHash) -> Self {
        Self {
            admin,
            contract_hash,
            principal_asset: default_principal_asset(),
            collateral_asset: default_collateral_asset(),
            collateral_ratio: default_collateral_ratio(),
            replay_guard: ReplayGuard::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.principal_asset == self.collateral_asset {
            return Err(ConfigError::Invalid(
                "principal and collateral assets must differ".to_string(),
            ));
        }
        if self.collateral_ratio == 0 {
            return Err(ConfigError::Invalid(
                "collateral ratio must be positive".to_string(),
            ));
        }
        if let ReplayGuard::HistoryScan { max_span: 0 } = self.replay_guard {
            return Err(ConfigError::Invalid(
                "history scan span must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Collateral a borrower must lock against `principal`.
    pub fn collateral_for(&self, principal: Amount) -> Option<Amount> {
        let scaled = u128::from(principal) * u128::from(self.collateral_ratio);
        Amount::try_from(scaled.div_ceil(u128::from(PERCENT_BASE))).ok()
    }

    /// Principal a lender must supply against pledged `collateral`.
    pub fn principal_for(&self, collateral: Amount) -> Amount {
        let scaled = u128::from(collateral) * u128::from(PERCENT_BASE)
            / u128::from(self.collateral_ratio);
        // collateral_ratio >= 1 keeps this within 100x of a u64
        Amount::try_from(scaled).unwrap_or(Amount::MAX)
    }
}
