//! Contract lifecycle state
//!
//! `Initial → Active` happens once, through `initialize`. After that the
//! admin can toggle `Active ↔ Inactive` any number of times.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContractState {
    /// Deployed, only `initialize` is callable
    #[default]
    Initial,
    /// All operations open
    Active,
    /// Suspended by the admin
    Inactive,
}

impl ContractState {
    /// Persisted form. `Initial` is the absence of a value.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            ContractState::Initial => Vec::new(),
            ContractState::Active => vec![0x01],
            ContractState::Inactive => vec![0x02],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        match bytes {
            [] => Ok(ContractState::Initial),
            [0x01] => Ok(ContractState::Active),
            [0x02] => Ok(ContractState::Inactive),
            other => Err(StorageError::Decode {
                key: "state".to_string(),
                reason: format!("unknown state tag {}", hex::encode(other)),
            }),
        }
    }

    pub fn is_initialized(self) -> bool {
        self != ContractState::Initial
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractState::Initial => f.write_str("initial"),
            ContractState::Active => f.write_str("active"),
            ContractState::Inactive => f.write_str("inactive"),
        }
    }
}
