//! Collateralized peer-to-peer lending contract
//!
//! Lenders post offers, borrowers post demands, and a counterparty fills
//! either side. Filled loans lock collateral until maturity, when a claim
//! pays the lender, charges the protocol fee and returns or seizes the
//! collateral. Withdrawals of contract-held assets are admitted by a
//! read-only verifier that checks balances, the withdrawal window and
//! value conservation.
//!
//! # Modules
//! - `contract`: Lifecycle state machine and operation dispatch
//! - `registry`: Loan creation, matching, closing and cancellation
//! - `verifier`: Withdrawal admission predicate
//! - `balances`: Per-asset balances and withdrawal windows
//! - `fee`: Fee rate and fee address storage
//! - `codec`: Fixed-layout loan record encoding
//! - `storage`: Key-value storage and the per-invocation context
//! - `host`: Ledger, transaction and witness interfaces
//! - `security`: Witness and state guards
//! - `config`: Deployment configuration
//! - `state`: Contract lifecycle state
//! - `events`: Contract events
//! - `errors`: Contract-specific error types

pub mod balances;
pub mod codec;
pub mod config;
pub mod contract;
pub mod errors;
pub mod events;
pub mod fee;
pub mod host;
pub mod registry;
pub mod security;
pub mod state;
pub mod storage;
pub mod verifier;

pub use contract::{InvocationArg, LendingContract, Operation, Value};
