//! Contract-specific error types
//!
//! Error taxonomy for storage, application operations, withdrawal
//! verification and configuration.

use thiserror::Error;
use types::errors::ValidationError;
use types::ids::AssetId;
use types::loan::LoanKind;
use types::numeric::{Amount, Height};

use crate::state::ContractState;

/// Storage encoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to encode value for key {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Corrupt value under key {key}: {reason}")]
    Decode { key: String, reason: String },
}

/// Broad classification of an application failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Arguments or preconditions rejected
    Validation,
    /// Referenced record does not exist
    NotFound,
    /// Witness check failed
    Unauthorized,
    /// Contract lifecycle state forbids the operation
    InvalidState,
    /// Storage corruption or arithmetic overflow
    Internal,
}

/// Application-context errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Unauthorized: witness check failed for {address}")]
    Unauthorized { address: String },

    #[error("Operation not allowed while contract is {actual}")]
    InvalidState { actual: ContractState },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Loan {kind} not found: {loan_id}")]
    LoanNotFound { kind: LoanKind, loan_id: String },

    #[error("Loan already exists: {loan_id}")]
    DuplicateLoan { loan_id: String },

    #[error("Loan {loan_id} expired at height {maturity}, current height {height}")]
    LoanExpired {
        loan_id: String,
        maturity: Height,
        height: Height,
    },

    #[error("Cannot fill own loan")]
    SelfMatch,

    #[error("No matured loan to close for {address}")]
    NoMatchedLoan { address: String },

    #[error("Insufficient balance for {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        required: Amount,
        available: Amount,
    },

    #[error("Withdrawal window already open for {address} since height {since}")]
    WithdrawalWindowOpen { address: String, since: Height },

    #[error("No withdrawal window open for {address}")]
    NoWithdrawalWindow { address: String },

    #[error("Invocation carries no outputs to the contract")]
    NothingToDeposit,

    #[error("Withdrawal rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ContractError::InvalidState { .. } => ErrorKind::InvalidState,
            ContractError::LoanNotFound { .. }
            | ContractError::NoMatchedLoan { .. }
            | ContractError::NoWithdrawalWindow { .. }
            | ContractError::UnknownOperation { .. } => ErrorKind::NotFound,
            ContractError::Overflow | ContractError::Storage(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

/// Reasons the withdrawal verifier turns a transaction away.
///
/// The host only observes accept/reject; the reason is kept for logs and
/// tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("contract not initialized")]
    NotInitialized,

    #[error("transaction is not a withdrawal from this contract")]
    NotWithdrawal,

    #[error("transaction names no destination address")]
    MissingDestination,

    #[error("destination did not sign the withdrawal")]
    MissingWitness,

    #[error("withdrawal of {requested} {asset} exceeds balance {available}")]
    ExceedsBalance {
        asset: AssetId,
        requested: u128,
        available: Amount,
    },

    #[error("no open withdrawal window")]
    NoOpenWindow,

    #[error("window already consumed by a withdrawal at height {height}")]
    AlreadyWithdrawn { height: Height },

    #[error("history scan of {span} blocks exceeds limit {max}")]
    ScanSpanExceeded { span: Height, max: Height },

    #[error("block {height} unavailable")]
    BlockUnavailable { height: Height },

    #[error("inputs {input} do not equal outputs {output}")]
    ValueNotConserved { input: u128, output: u128 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_display() {
        let err = ContractError::InsufficientBalance {
            asset: types::ids::GAS_ASSET,
            required: 1500,
            available: 20,
        };
        assert!(err.to_string().contains("1500"));
        assert!(err.to_string().contains("602c7971"));
    }

    #[test]
    fn test_contract_error_from_validation() {
        let err: ContractError = ValidationError::NonPositiveAmount.into();
        assert!(matches!(err, ContractError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ContractError::Unauthorized {
                address: "A".into()
            }
            .kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            ContractError::LoanNotFound {
                kind: LoanKind::Offer,
                loan_id: "00".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ContractError::InvalidState {
                actual: ContractState::Inactive
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(ContractError::Overflow.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_rejection_display() {
        let r = Rejection::ValueNotConserved {
            input: 10,
            output: 12,
        };
        assert_eq!(r.to_string(), "inputs 10 do not equal outputs 12");
    }
}
