//! Withdrawal verification
//!
//! Decides whether a transaction spending the contract's assets may enter
//! a block. The check is read-only: it consults contract state, the
//! destination's balances and withdrawal window, and (in history-scan
//! mode) recent blocks, but writes nothing.
//!
//! A transaction is admitted when
//! 1. the contract has been initialized,
//! 2. it is an invocation tagged as a withdrawal from this contract,
//! 3. it names a destination address that signed it,
//! 4. no asset's outgoing sum exceeds the destination's balance,
//! 5. the destination has an open withdrawal window,
//! 6. the window has not already been used, and
//! 7. referenced inputs equal outputs in total.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;
use types::ids::{Address, AssetId};
use types::numeric::Height;

use crate::balances;
use crate::config::{ContractConfig, ReplayGuard};
use crate::errors::Rejection;
use crate::host::{Ledger, Transaction, Witness};
use crate::storage::{read_state, StorageRead};

/// What a withdrawal-tagged transaction asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalClaim {
    pub destination: Address,
    /// Per asset, the sum of outputs leaving the contract
    pub outgoing: BTreeMap<AssetId, u128>,
    /// Sum of every output, change back to the contract included
    pub total_out: u128,
}

/// An admitted withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedWithdrawal {
    pub claim: WithdrawalClaim,
    pub window_start: Height,
}

pub struct WithdrawalVerifier<'c> {
    config: &'c ContractConfig,
}

impl<'c> WithdrawalVerifier<'c> {
    pub fn new(config: &'c ContractConfig) -> Self {
        Self { config }
    }

    /// Host-facing predicate. Rejection reasons are logged, not returned.
    pub fn verify(&self, store: &impl StorageRead, ledger: &dyn Ledger, tx: &Transaction) -> bool {
        match self.check(store, ledger, tx) {
            Ok(approved) => {
                debug!(
                    destination = %approved.claim.destination,
                    window_start = approved.window_start,
                    "Withdrawal admitted"
                );
                true
            }
            Err(reason) => {
                debug!(%reason, "Withdrawal rejected");
                false
            }
        }
    }

    /// Full admission check.
    pub fn check(
        &self,
        store: &impl StorageRead,
        ledger: &dyn Ledger,
        tx: &Transaction,
    ) -> Result<ApprovedWithdrawal, Rejection> {
        if !read_state(store)?.is_initialized() {
            return Err(Rejection::NotInitialized);
        }
        let claim = self.claim(tx)?;
        if !tx.check_witness(&claim.destination) {
            return Err(Rejection::MissingWitness);
        }

        for (asset, requested) in &claim.outgoing {
            let available = balances::balance_of(store, &claim.destination, asset)?;
            if *requested > u128::from(available) {
                return Err(Rejection::ExceedsBalance {
                    asset: *asset,
                    requested: *requested,
                    available,
                });
            }
        }

        let window_start = balances::withdrawal_window(store, &claim.destination)?
            .ok_or(Rejection::NoOpenWindow)?;
        self.check_replay(ledger, &claim.destination, window_start)?;

        let total_in: u128 = tx.references.iter().map(|r| u128::from(r.value)).sum();
        if total_in != claim.total_out {
            return Err(Rejection::ValueNotConserved {
                input: total_in,
                output: claim.total_out,
            });
        }

        Ok(ApprovedWithdrawal {
            claim,
            window_start,
        })
    }

    /// Read the withdrawal tag, destination and outgoing sums of `tx`.
    pub fn claim(&self, tx: &Transaction) -> Result<WithdrawalClaim, Rejection> {
        let contract = &self.config.contract_hash;
        if !tx.is_withdrawal_from(contract) {
            return Err(Rejection::NotWithdrawal);
        }
        let destination = tx.destination().ok_or(Rejection::MissingDestination)?;

        let mut outgoing = BTreeMap::new();
        let mut total_out = 0u128;
        for output in &tx.outputs {
            let value = u128::from(output.value);
            total_out += value;
            if output.script_hash != *contract {
                *outgoing.entry(output.asset_id).or_insert(0u128) += value;
            }
        }

        Ok(WithdrawalClaim {
            destination,
            outgoing,
            total_out,
        })
    }

    /// Signed withdrawals to `destination` recorded in blocks `heights`,
    /// oldest first.
    pub fn recorded_withdrawals(
        &self,
        ledger: &dyn Ledger,
        destination: &Address,
        heights: Range<Height>,
    ) -> Result<Vec<(Height, WithdrawalClaim)>, Rejection> {
        let mut recorded = Vec::new();
        for height in heights {
            let block = ledger
                .block(height)
                .ok_or(Rejection::BlockUnavailable { height })?;
            for tx in &block.transactions {
                let Ok(claim) = self.claim(tx) else {
                    continue;
                };
                if claim.destination == *destination && tx.check_witness(destination) {
                    recorded.push((height, claim));
                }
            }
        }
        Ok(recorded)
    }

    fn check_replay(
        &self,
        ledger: &dyn Ledger,
        destination: &Address,
        window_start: Height,
    ) -> Result<(), Rejection> {
        let max_span = match self.config.replay_guard {
            // the host settles in the same transaction, closing the window
            ReplayGuard::Sequence => return Ok(()),
            ReplayGuard::HistoryScan { max_span } => max_span,
        };

        let current = ledger.current_height();
        let span = current.saturating_sub(window_start);
        if span > max_span {
            return Err(Rejection::ScanSpanExceeded {
                span,
                max: max_span,
            });
        }

        let recorded = self.recorded_withdrawals(ledger, destination, window_start..current)?;
        match recorded.first() {
            Some((height, _)) => Err(Rejection::AlreadyWithdrawn { height: *height }),
            None => Ok(()),
        }
    }
}
