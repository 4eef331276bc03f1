//! Lending lifecycle tests
//!
//! End-to-end scenarios through the dispatch surface:
//! - Bootstrap and admin configuration
//! - Offer and demand creation, including rejected inputs
//! - Filling, closing and cancelling loans
//! - Rollback of failed invocations

mod common;

use common::*;
use lending_contract::codec::LoanCodec;
use lending_contract::errors::{ContractError, ErrorKind};
use lending_contract::events::{ContractEvent, LoanCreated};
use lending_contract::host::{address_of, Ledger};
use lending_contract::registry::LoanRegistry;
use lending_contract::state::ContractState;
use lending_contract::{InvocationArg, Value};
use proptest::prelude::*;
use types::errors::ValidationError;
use types::ids::{LoanId, GAS_ASSET, NEO_ASSET};
use types::loan::{InterestRate, Loan, LoanKind};

fn loan_id(value: Value) -> LoanId {
    match value {
        Value::Bytes(bytes) => LoanId::from_slice(&bytes).unwrap(),
        other => panic!("expected loan id, got {other:?}"),
    }
}

fn create_offer(h: &mut Harness, seed: u8, amount: u64, interest: u64, duration: u64) -> LoanId {
    let lender = key(seed);
    let value = h
        .call(
            &lender,
            "createLoanOffer",
            &[
                address_of(&lender).into(),
                amount.into(),
                InterestRate::from_percent(interest).into(),
                duration.into(),
            ],
        )
        .unwrap();
    loan_id(value)
}

// ═══════════════════════════════════════════════════════════════════
// Bootstrap
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_initialize_then_create_offer_end_to_end() {
    let mut h = Harness::initialized(5);
    let lender = key(2);
    let a = address_of(&lender);
    let interest = InterestRate::from_percent(10);
    let maturity = h.ledger.current_height() + 100;

    let id = loan_id(
        h.call(
            &lender,
            "createLoanOffer",
            &[a.into(), 1000u64.into(), interest.clone().into(), maturity.into()],
        )
        .unwrap(),
    );

    let expected = Loan::new(LoanKind::Offer, a, 1000, interest.clone(), maturity);
    assert_eq!(id, expected.id());
    assert_eq!(
        LoanRegistry::get_loan(&h.store, LoanKind::Offer, &id),
        Some(expected.clone())
    );
    assert_eq!(
        h.call(&lender, "getLoan", &[i128::from(LoanKind::Offer.tag()).into(), id.into()]),
        Ok(Value::Bytes(LoanCodec::encode(&expected)))
    );
    assert_eq!(
        h.contract.events().last(),
        Some(&ContractEvent::CreatedOffer(LoanCreated {
            address: a,
            amount: 1000,
            interest,
            duration: maturity,
            id,
        }))
    );
}

#[test]
fn test_initialize_succeeds_exactly_once() {
    let mut h = Harness::new();
    assert_eq!(h.initialize(5), Ok(Value::Bool(true)));
    let second = h.initialize(5).unwrap_err();
    assert_eq!(second.kind(), ErrorKind::InvalidState);
    assert_eq!(
        h.call(&admin_key(), "getFeeAddress", &[]),
        Ok(Value::Bytes(fee_address().as_bytes().to_vec()))
    );
}

#[test]
fn test_lending_requires_active_state() {
    let mut h = Harness::new();
    let lender = key(2);
    let result = h.call(
        &lender,
        "createLoanOffer",
        &[
            address_of(&lender).into(),
            1000u64.into(),
            InterestRate::from_percent(10).into(),
            100u64.into(),
        ],
    );
    assert_eq!(
        result,
        Err(ContractError::InvalidState {
            actual: ContractState::Initial
        })
    );
}

#[test]
fn test_non_admin_cannot_configure() {
    let mut h = Harness::initialized(5);
    let stranger = key(9);
    let cases: [(&str, Vec<InvocationArg>); 3] = [
        ("setFee", vec![10u64.into()]),
        ("setFeeAddress", vec![address_of(&stranger).into()]),
        ("suspend", Vec::new()),
    ];
    for (operation, args) in cases {
        let err = h.call(&stranger, operation, &args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized, "{operation}");
    }
    assert_eq!(h.call(&stranger, "getFee", &[]), Ok(Value::Integer(5)));
}

// ═══════════════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_create_rejects_zero_amount_past_maturity_and_foreign_signer() {
    let mut h = Harness::initialized(5);
    let lender = key(2);
    let a = address_of(&lender);
    h.ledger.advance_to(50);
    let before = h.store.clone();

    let zero = h.call(
        &lender,
        "createLoanOffer",
        &[a.into(), 0u64.into(), InterestRate::from_percent(1).into(), 100u64.into()],
    );
    assert_eq!(zero, Err(ValidationError::NonPositiveAmount.into()));

    let past = h.call(
        &lender,
        "createLoanOffer",
        &[a.into(), 10u64.into(), InterestRate::from_percent(1).into(), 49u64.into()],
    );
    assert_eq!(
        past,
        Err(ValidationError::MaturityInPast {
            duration: 49,
            height: 50
        }
        .into())
    );

    let foreign = h.call(
        &key(3),
        "createLoanOffer",
        &[a.into(), 10u64.into(), InterestRate::from_percent(1).into(), 100u64.into()],
    );
    assert!(matches!(foreign, Err(ContractError::Unauthorized { .. })));

    assert_eq!(h.store, before);
}

#[test]
fn test_maturity_at_current_height_is_accepted() {
    let mut h = Harness::initialized(5);
    let height = h.ledger.current_height();
    create_offer(&mut h, 2, 10, 1, height);
}

#[test]
fn test_loan_ids_differ_by_amount_and_duration() {
    let mut h = Harness::initialized(5);
    let a = create_offer(&mut h, 2, 1000, 10, 100);
    let b = create_offer(&mut h, 2, 1001, 10, 100);
    let c = create_offer(&mut h, 2, 1000, 10, 101);
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_ne!(b, c);
}

#[test]
fn test_same_terms_as_offer_and_demand_coexist() {
    let mut h = Harness::initialized(5);
    let user = key(2);
    let args: [InvocationArg; 4] = [
        address_of(&user).into(),
        500u64.into(),
        InterestRate::from_percent(3).into(),
        100u64.into(),
    ];
    let offer = loan_id(h.call(&user, "createLoanOffer", &args).unwrap());
    let demand = loan_id(h.call(&user, "createLoanDemand", &args).unwrap());
    assert_eq!(offer, demand);
    assert!(matches!(
        h.call(&user, "createLoanOffer", &args),
        Err(ContractError::DuplicateLoan { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════
// Fill & Claim
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_offer_filled_repaid_and_claimed() {
    let mut h = Harness::initialized(5);
    let lender = key(2);
    let borrower = key(3);
    let (l, b) = (address_of(&lender), address_of(&borrower));
    h.deposit(&lender, GAS_ASSET, 1000);
    h.deposit(&borrower, NEO_ASSET, 1500);
    h.deposit(&borrower, GAS_ASSET, 100);

    let id = create_offer(&mut h, 2, 1000, 10, 100);
    assert_eq!(
        h.call(&borrower, "fillOfferLoan", &[b.into(), id.into()]),
        Ok(Value::Bool(true))
    );
    assert_eq!(h.balance(&b, &GAS_ASSET), 1100);
    assert_eq!(h.balance(&b, &NEO_ASSET), 0);
    assert_eq!(h.contract.events().last().unwrap().name(), "filledOffer");

    // not yet matured
    assert!(matches!(
        h.call(&lender, "claimClosingLoan", &[l.into()]),
        Err(ContractError::NoMatchedLoan { .. })
    ));

    h.ledger.advance_to(100);
    h.call(&lender, "claimClosingLoan", &[l.into()]).unwrap();
    assert_eq!(h.balance(&l, &GAS_ASSET), 1050);
    assert_eq!(h.balance(&fee_address(), &GAS_ASSET), 50);
    assert_eq!(h.balance(&b, &GAS_ASSET), 0);
    assert_eq!(h.balance(&b, &NEO_ASSET), 1500);
    match h.contract.events().last() {
        Some(ContractEvent::ClosingClaimed(closing)) => {
            assert!(closing.repaid);
            assert_eq!(closing.fee, 50);
            assert_eq!(closing.fee_address, Some(fee_address()));
        }
        other => panic!("expected closingClaimed, got {other:?}"),
    }
}

#[test]
fn test_demand_filled_then_defaulted() {
    let mut h = Harness::initialized(10);
    let lender = key(2);
    let borrower = key(3);
    let (l, b) = (address_of(&lender), address_of(&borrower));
    h.deposit(&lender, GAS_ASSET, 5000);
    h.deposit(&borrower, NEO_ASSET, 3000);

    let id = loan_id(
        h.call(
            &borrower,
            "createLoanDemand",
            &[b.into(), 3000u64.into(), InterestRate::from_percent(20).into(), 40u64.into()],
        )
        .unwrap(),
    );
    h.call(&lender, "fillDemandLoan", &[l.into(), id.into()]).unwrap();
    assert_eq!(h.balance(&l, &GAS_ASSET), 3000);
    assert_eq!(h.balance(&b, &GAS_ASSET), 2000);

    h.ledger.advance_to(40);
    h.call(&borrower, "claimClosingLoan", &[b.into()]).unwrap();
    assert_eq!(h.balance(&l, &NEO_ASSET), 2700);
    assert_eq!(h.balance(&fee_address(), &NEO_ASSET), 300);
    assert_eq!(h.balance(&b, &NEO_ASSET), 0);
    assert_eq!(h.balance(&b, &GAS_ASSET), 2000);
}

#[test]
fn test_fill_with_insufficient_collateral_writes_nothing() {
    let mut h = Harness::initialized(5);
    let borrower = key(3);
    h.deposit(&key(2), GAS_ASSET, 1000);
    h.deposit(&borrower, NEO_ASSET, 1499);
    let id = create_offer(&mut h, 2, 1000, 10, 100);
    let before = h.store.clone();
    let events_before = h.contract.events().len();

    let result = h.call(
        &borrower,
        "fillOfferLoan",
        &[address_of(&borrower).into(), id.into()],
    );
    assert_eq!(
        result,
        Err(ContractError::InsufficientBalance {
            asset: NEO_ASSET,
            required: 1500,
            available: 1499
        })
    );
    assert_eq!(h.store, before);
    assert_eq!(h.contract.events().len(), events_before);
}

#[test]
fn test_fill_unknown_loan() {
    let mut h = Harness::initialized(5);
    let borrower = key(3);
    let err = h
        .call(
            &borrower,
            "fillOfferLoan",
            &[address_of(&borrower).into(), LoanId::new([9; 32]).into()],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ═══════════════════════════════════════════════════════════════════
// Cancel
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_cancel_offer_by_poster_only() {
    let mut h = Harness::initialized(5);
    let id = create_offer(&mut h, 2, 1000, 10, 100);

    let err = h.call(&key(3), "cancelLoanOffer", &[id.into()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    h.call(&key(2), "cancelLoanOffer", &[id.into()]).unwrap();
    assert_eq!(h.contract.events().last().unwrap().name(), "cancelledOffer");
    assert_eq!(
        h.call(&key(2), "getLoan", &[i128::from(LoanKind::Offer.tag()).into(), id.into()]),
        Ok(Value::Bytes(Vec::new()))
    );
    assert!(matches!(
        h.call(&key(2), "cancelLoanOffer", &[id.into()]),
        Err(ContractError::LoanNotFound { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════
// Fee Bound (proptest)
// ═══════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariant: setFee succeeds exactly for rates in 0..=50.
    #[test]
    fn fuzz_set_fee_bound(rate in -100i128..150) {
        let mut h = Harness::initialized(5);
        let accepted = h.call(&admin_key(), "setFee", &[rate.into()]).is_ok();
        prop_assert_eq!(accepted, (0..=50).contains(&rate));
        let expected = if accepted { rate } else { 5 };
        prop_assert_eq!(h.call(&admin_key(), "getFee", &[]), Ok(Value::Integer(expected)));
    }
}
