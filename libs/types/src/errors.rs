//! Error types for value-level validation
//!
//! Raised when raw bytes or integers cannot be turned into one of the
//! lending model types.

use thiserror::Error;

/// Validation failure for a model value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Fee rate {rate} out of range: must be within 0..={max}")]
    FeeOutOfRange { rate: i128, max: u8 },

    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Value {value} does not fit in {target}")]
    OutOfRange { value: i128, target: &'static str },

    #[error("Loan maturity {duration} is below current height {height}")]
    MaturityInPast { duration: u64, height: u64 },

    #[error("Interest encoding of {len} bytes does not fit a percentage")]
    InterestNotDecodable { len: usize },

    #[error("Unknown loan kind tag: {0:#04x}")]
    UnknownLoanKind(u8),
}
