//! Contract events
//!
//! Notifications for external observers. They are released only when the
//! invocation that raised them commits, and the contract never reads them
//! back.

use serde::{Deserialize, Serialize};
use types::ids::{Address, AssetId, LoanId};
use types::loan::InterestRate;
use types::numeric::{Amount, Height};

/// A loan offer or demand was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCreated {
    pub address: Address,
    pub amount: Amount,
    pub interest: InterestRate,
    pub duration: Height,
    pub id: LoanId,
}

/// An open loan was matched by a counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFilled {
    pub id: LoanId,
    pub lender: Address,
    pub borrower: Address,
    pub principal: Amount,
    pub collateral: Amount,
    pub maturity: Height,
}

/// An unmatched loan was withdrawn by its poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCancelled {
    pub id: LoanId,
    pub address: Address,
}

/// A matured loan was settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingClaimed {
    pub id: LoanId,
    pub lender: Address,
    pub borrower: Address,
    /// Whether the borrower covered principal plus interest
    pub repaid: bool,
    /// Paid to the lender, in the principal asset when repaid and in the
    /// collateral asset on default
    pub lender_payout: Amount,
    /// Collateral returned to the borrower
    pub borrower_refund: Amount,
    pub fee: Amount,
    /// `None` when no fee address is configured; no fee is taken then
    pub fee_address: Option<Address>,
}

/// Contract-bound outputs credited to a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub address: Address,
    pub asset: AssetId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequested {
    pub address: Address,
    pub window_start: Height,
}

/// A verified withdrawal was applied to the balances; its window is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalSettled {
    pub address: Address,
    pub window_start: Height,
    pub withdrawn: Vec<(AssetId, Amount)>,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    CreatedOffer(LoanCreated),
    CreatedDemand(LoanCreated),
    FilledOffer(LoanFilled),
    FilledDemand(LoanFilled),
    CancelledOffer(LoanCancelled),
    CancelledDemand(LoanCancelled),
    ClosingClaimed(ClosingClaimed),
    Deposited(Deposited),
    WithdrawalRequested(WithdrawalRequested),
    WithdrawalSettled(WithdrawalSettled),
}

impl ContractEvent {
    /// Name observers subscribe to.
    pub fn name(&self) -> &'static str {
        match self {
            ContractEvent::CreatedOffer(_) => "createdOffer",
            ContractEvent::CreatedDemand(_) => "createdDemand",
            ContractEvent::FilledOffer(_) => "filledOffer",
            ContractEvent::FilledDemand(_) => "filledDemand",
            ContractEvent::CancelledOffer(_) => "cancelledOffer",
            ContractEvent::CancelledDemand(_) => "cancelledDemand",
            ContractEvent::ClosingClaimed(_) => "closingClaimed",
            ContractEvent::Deposited(_) => "deposited",
            ContractEvent::WithdrawalRequested(_) => "withdrawalRequested",
            ContractEvent::WithdrawalSettled(_) => "withdrawalSettled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_offer_serialization() {
        let event = ContractEvent::CreatedOffer(LoanCreated {
            address: Address::new([0x41; 34]),
            amount: 1000,
            interest: InterestRate::from_percent(10),
            duration: 120,
            id: LoanId::new([7; 32]),
        });
        let json = serde_json::to_string(&event).unwrap();
        let deser: ContractEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deser);
        assert_eq!(event.name(), "createdOffer");
    }

    #[test]
    fn test_closing_claimed_serialization() {
        let event = ClosingClaimed {
            id: LoanId::new([1; 32]),
            lender: Address::new([0x41; 34]),
            borrower: Address::new([0x42; 34]),
            repaid: true,
            lender_payout: 1050,
            borrower_refund: 1500,
            fee: 50,
            fee_address: Some(Address::new([0x46; 34])),
        };
        let json = serde_json::to_string(&event).unwrap();
        let deser: ClosingClaimed = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deser);
    }

    #[test]
    fn test_event_names_distinguish_sides() {
        let cancelled = LoanCancelled {
            id: LoanId::new([0; 32]),
            address: Address::new([0x41; 34]),
        };
        assert_eq!(
            ContractEvent::CancelledOffer(cancelled.clone()).name(),
            "cancelledOffer"
        );
        assert_eq!(
            ContractEvent::CancelledDemand(cancelled).name(),
            "cancelledDemand"
        );
    }
}
