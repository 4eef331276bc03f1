//! Types library for the collateralized lending contract
//!
//! Value types shared by the contract logic and its clients: identifiers,
//! amounts and heights, the fee rate, and loan records.
//!
//! # Modules
//! - `ids`: Fixed-width identifiers (Address, AssetId, ScriptHash, LoanId)
//! - `numeric`: Amount and height aliases, percentage math
//! - `fee`: Bounded protocol fee rate
//! - `loan`: Open and matched loan records
//! - `errors`: Validation errors

pub mod errors;
pub mod fee;
pub mod ids;
pub mod loan;
pub mod numeric;

