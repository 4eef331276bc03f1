//! Loan registry: creating, matching, closing and cancelling loans
//!
//! Open loans live under `kind tag ‖ id` in the fixed [`LoanCodec`] layout.
//! Filling one replaces it with a [`MatchedLoan`] indexed under both
//! parties, so a later claim can find it from either address.
//!
//! Every operation checks all of its preconditions before the first write.
//! Writes go to the invocation's [`StorageContext`], so a failure part way
//! through still leaves the backing store untouched.

use tracing::{debug, info};
use types::errors::ValidationError;
use types::ids::{Address, LoanId};
use types::loan::{InterestRate, Loan, LoanKind, MatchedLoan};
use types::numeric::{Amount, Height};

use crate::balances;
use crate::codec::LoanCodec;
use crate::config::ContractConfig;
use crate::errors::{ContractError, StorageError};
use crate::events::{ClosingClaimed, ContractEvent, LoanCancelled, LoanCreated, LoanFilled};
use crate::fee;
use crate::host::Witness;
use crate::security::require_witness;
use crate::storage::{
    read_value, remove, write_value, StorageContext, StorageKey, StorageRead, StorageWrite,
};

/// Loan operations over one deployment's configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoanRegistry<'c> {
    config: &'c ContractConfig,
}

impl<'c> LoanRegistry<'c> {
    pub fn new(config: &'c ContractConfig) -> Self {
        Self { config }
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Open loan of `kind` under `id`, if any.
    pub fn get_loan(store: &impl StorageRead, kind: LoanKind, id: &LoanId) -> Option<Loan> {
        let bytes = store.get(&StorageKey::Loan(kind, id).to_bytes())?;
        LoanCodec::decode(&bytes, kind)
    }

    pub fn get_matched(
        store: &impl StorageRead,
        id: &LoanId,
    ) -> Result<Option<MatchedLoan>, StorageError> {
        read_value(store, StorageKey::MatchedLoan(id))
    }

    /// Ids of matched loans `address` is party to, oldest first.
    pub fn matched_ids(
        store: &impl StorageRead,
        address: &Address,
    ) -> Result<Vec<LoanId>, StorageError> {
        Ok(read_value(store, StorageKey::MatchIndex(address))?.unwrap_or_default())
    }

    // ───────────────────────── Create ─────────────────────────

    /// Post an offer or a demand for `address`.
    #[allow(clippy::too_many_arguments)]
    pub fn create<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        witness: &impl Witness,
        height: Height,
        kind: LoanKind,
        address: Address,
        amount: Amount,
        interest: InterestRate,
        duration: Height,
    ) -> Result<LoanId, ContractError> {
        require_witness(witness, &address)?;
        if amount == 0 {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        if duration < height {
            return Err(ValidationError::MaturityInPast { duration, height }.into());
        }

        let loan = Loan::new(kind, address, amount, interest, duration);
        let id = loan.id();
        let key = StorageKey::Loan(kind, &id);
        if ctx.get(&key.to_bytes()).is_some() {
            return Err(ContractError::DuplicateLoan {
                loan_id: id.to_string(),
            });
        }
        ctx.put(key.to_bytes(), LoanCodec::encode(&loan));

        debug!(%kind, %id, %address, amount, duration, "Loan created");
        let created = LoanCreated {
            address: loan.address,
            amount: loan.amount,
            interest: loan.interest,
            duration: loan.duration,
            id,
        };
        ctx.notify(match kind {
            LoanKind::Offer => ContractEvent::CreatedOffer(created),
            LoanKind::Demand => ContractEvent::CreatedDemand(created),
        });
        Ok(id)
    }

    // ───────────────────────── Fill ─────────────────────────

    /// Match the open loan `id` of `kind` with `counterparty`.
    ///
    /// Filling an offer makes the counterparty the borrower, who must lock
    /// collateral at the configured ratio. Filling a demand makes the
    /// counterparty the lender, who supplies the principal the pledged
    /// collateral supports. Principal moves lender to borrower; collateral
    /// leaves the borrower's available balance and stays locked in the
    /// matched record until the claim.
    pub fn fill<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        witness: &impl Witness,
        height: Height,
        kind: LoanKind,
        counterparty: Address,
        id: LoanId,
    ) -> Result<MatchedLoan, ContractError> {
        require_witness(witness, &counterparty)?;
        let loan = Self::get_loan(ctx, kind, &id).ok_or_else(|| ContractError::LoanNotFound {
            kind,
            loan_id: id.to_string(),
        })?;
        if loan.address == counterparty {
            return Err(ContractError::SelfMatch);
        }
        if height >= loan.duration {
            return Err(ContractError::LoanExpired {
                loan_id: id.to_string(),
                maturity: loan.duration,
                height,
            });
        }

        let (lender, borrower, principal, collateral) = match kind {
            LoanKind::Offer => {
                let collateral = self
                    .config
                    .collateral_for(loan.amount)
                    .ok_or(ContractError::Overflow)?;
                (loan.address, counterparty, loan.amount, collateral)
            }
            LoanKind::Demand => {
                let principal = self.config.principal_for(loan.amount);
                if principal == 0 {
                    return Err(ValidationError::NonPositiveAmount.into());
                }
                (counterparty, loan.address, principal, loan.amount)
            }
        };

        let matched = MatchedLoan {
            id,
            origin: kind,
            lender,
            borrower,
            principal,
            collateral,
            interest_percent: loan.interest.percent()?,
            maturity: loan.duration,
            matched_at: height,
        };
        matched.repayment_due().ok_or(ContractError::Overflow)?;

        let principal_asset = &self.config.principal_asset;
        let collateral_asset = &self.config.collateral_asset;
        balances::ensure_available(ctx, &lender, principal_asset, principal)?;
        balances::ensure_available(ctx, &borrower, collateral_asset, collateral)?;

        balances::transfer(ctx, &lender, &borrower, principal_asset, principal)?;
        balances::debit(ctx, &borrower, collateral_asset, collateral)?;

        remove(ctx, StorageKey::Loan(kind, &id));
        write_value(ctx, StorageKey::MatchedLoan(&id), &matched)?;
        index_insert(ctx, &lender, id)?;
        index_insert(ctx, &borrower, id)?;

        info!(%kind, %id, %lender, %borrower, principal, collateral, "Loan filled");
        let filled = LoanFilled {
            id,
            lender,
            borrower,
            principal,
            collateral,
            maturity: matched.maturity,
        };
        ctx.notify(match kind {
            LoanKind::Offer => ContractEvent::FilledOffer(filled),
            LoanKind::Demand => ContractEvent::FilledDemand(filled),
        });
        Ok(matched)
    }

    // ───────────────────────── Claim ─────────────────────────

    /// Close the oldest matured loan `sender` is party to.
    ///
    /// When the borrower's available principal-asset balance covers
    /// principal plus interest, the repayment goes to the lender less the
    /// fee and the collateral returns to the borrower. Otherwise the loan
    /// defaults: the collateral goes to the lender less a fee taken at the
    /// same rate in the collateral asset.
    pub fn claim<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        witness: &impl Witness,
        height: Height,
        sender: Address,
    ) -> Result<ClosingClaimed, ContractError> {
        require_witness(witness, &sender)?;

        let mut due = None;
        for id in Self::matched_ids(ctx, &sender)? {
            if let Some(matched) = Self::get_matched(ctx, &id)? {
                if matched.is_matured(height) {
                    due = Some(matched);
                    break;
                }
            }
        }
        let matched = due.ok_or_else(|| ContractError::NoMatchedLoan {
            address: sender.to_string(),
        })?;

        let rate = fee::fee_rate(ctx)?;
        let fee_address = fee::fee_address(ctx)?;
        let repayment = matched.repayment_due().ok_or(ContractError::Overflow)?;
        let principal_asset = &self.config.principal_asset;
        let collateral_asset = &self.config.collateral_asset;
        let repaid =
            balances::balance_of(ctx, &matched.borrower, principal_asset)? >= repayment;

        let (settled_asset, gross, fee) = if repaid {
            (principal_asset, repayment, rate.fee_on(matched.principal))
        } else {
            (collateral_asset, matched.collateral, rate.fee_on(matched.collateral))
        };
        let fee = if fee_address.is_some() { fee } else { 0 };
        let lender_payout = gross.checked_sub(fee).ok_or(ContractError::Overflow)?;

        if repaid {
            balances::debit(ctx, &matched.borrower, principal_asset, repayment)?;
            balances::credit(ctx, &matched.borrower, collateral_asset, matched.collateral)?;
        }
        balances::credit(ctx, &matched.lender, settled_asset, lender_payout)?;
        if let Some(fee_address) = &fee_address {
            if fee > 0 {
                balances::credit(ctx, fee_address, settled_asset, fee)?;
            }
        }

        remove(ctx, StorageKey::MatchedLoan(&matched.id));
        index_remove(ctx, &matched.lender, &matched.id)?;
        index_remove(ctx, &matched.borrower, &matched.id)?;

        info!(id = %matched.id, repaid, lender_payout, fee, "Loan closed");
        let closing = ClosingClaimed {
            id: matched.id,
            lender: matched.lender,
            borrower: matched.borrower,
            repaid,
            lender_payout,
            borrower_refund: if repaid { matched.collateral } else { 0 },
            fee,
            fee_address,
        };
        ctx.notify(ContractEvent::ClosingClaimed(closing.clone()));
        Ok(closing)
    }

    // ───────────────────────── Cancel ─────────────────────────

    /// Withdraw an unmatched loan. Only its poster may cancel it.
    pub fn cancel<S: StorageWrite>(
        &self,
        ctx: &mut StorageContext<'_, S>,
        witness: &impl Witness,
        kind: LoanKind,
        id: LoanId,
    ) -> Result<Loan, ContractError> {
        let loan = Self::get_loan(ctx, kind, &id).ok_or_else(|| ContractError::LoanNotFound {
            kind,
            loan_id: id.to_string(),
        })?;
        require_witness(witness, &loan.address)?;
        remove(ctx, StorageKey::Loan(kind, &id));

        debug!(%kind, %id, "Loan cancelled");
        let cancelled = LoanCancelled {
            id,
            address: loan.address,
        };
        ctx.notify(match kind {
            LoanKind::Offer => ContractEvent::CancelledOffer(cancelled),
            LoanKind::Demand => ContractEvent::CancelledDemand(cancelled),
        });
        Ok(loan)
    }
}

fn index_insert(
    store: &mut impl StorageWrite,
    address: &Address,
    id: LoanId,
) -> Result<(), StorageError> {
    let mut ids = LoanRegistry::matched_ids(store, address)?;
    ids.push(id);
    write_value(store, StorageKey::MatchIndex(address), &ids)
}

fn index_remove(
    store: &mut impl StorageWrite,
    address: &Address,
    id: &LoanId,
) -> Result<(), StorageError> {
    let mut ids = LoanRegistry::matched_ids(store, address)?;
    ids.retain(|other| other != id);
    if ids.is_empty() {
        remove(store, StorageKey::MatchIndex(address));
        return Ok(());
    }
    write_value(store, StorageKey::MatchIndex(address), &ids)
}
