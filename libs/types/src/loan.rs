//! Loan records
//!
//! An open [`Loan`] is either an offer (a lender's principal waiting for a
//! borrower) or a demand (a borrower's collateral waiting for a lender).
//! Once a counterparty fills it, the open record is replaced by a
//! [`MatchedLoan`] that tracks both parties until the loan is closed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::errors::ValidationError;
use crate::ids::{Address, LoanId};
use crate::numeric::{percent_of, Amount, Height};

/// Which side of the market posted the loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanKind {
    /// Principal offered by a lender
    Offer,
    /// Collateral pledged by a borrower
    Demand,
}

impl LoanKind {
    /// Storage tag byte.
    pub const fn tag(self) -> u8 {
        match self {
            LoanKind::Offer => 0x99,
            LoanKind::Demand => 0x98,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ValidationError> {
        match tag {
            0x99 => Ok(LoanKind::Offer),
            0x98 => Ok(LoanKind::Demand),
            other => Err(ValidationError::UnknownLoanKind(other)),
        }
    }
}

impl fmt::Display for LoanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanKind::Offer => f.write_str("offer"),
            LoanKind::Demand => f.write_str("demand"),
        }
    }
}

/// Interest rate as posted: a little-endian unsigned percentage of any
/// length. Kept verbatim because it is part of the loan id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestRate(Vec<u8>);

impl InterestRate {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Minimal little-endian encoding of a whole percentage.
    pub fn from_percent(percent: u64) -> Self {
        let mut bytes = percent.to_le_bytes().to_vec();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decoded percentage. Fails when significant bytes spill past 8.
    pub fn percent(&self) -> Result<u64, ValidationError> {
        let (low, high) = self.0.split_at(self.0.len().min(8));
        if high.iter().any(|b| *b != 0) {
            return Err(ValidationError::InterestNotDecodable { len: self.0.len() });
        }
        let mut buf = [0u8; 8];
        buf[..low.len()].copy_from_slice(low);
        Ok(u64::from_le_bytes(buf))
    }
}

/// An open loan posted by one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub kind: LoanKind,
    /// Lender for an offer, pledger for a demand
    pub address: Address,
    /// Principal (offer) or collateral (demand)
    pub amount: Amount,
    pub interest: InterestRate,
    /// Maturity height
    pub duration: Height,
}

impl Loan {
    pub fn new(
        kind: LoanKind,
        address: Address,
        amount: Amount,
        interest: InterestRate,
        duration: Height,
    ) -> Self {
        Self {
            kind,
            address,
            amount,
            interest,
            duration,
        }
    }

    /// Deterministic identifier over `address ‖ amount ‖ duration ‖ interest`.
    ///
    /// Amount and duration enter as 8-byte little-endian words; the
    /// concatenation is hashed with SHA-256. The kind is not part of the id.
    pub fn id(&self) -> LoanId {
        let mut hasher = Sha256::new();
        hasher.update(self.address.as_bytes());
        hasher.update(self.amount.to_le_bytes());
        hasher.update(self.duration.to_le_bytes());
        hasher.update(self.interest.as_bytes());
        LoanId::new(hasher.finalize().into())
    }
}

/// A filled loan: principal paid out, collateral locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedLoan {
    /// Id of the open loan this match consumed
    pub id: LoanId,
    /// Which side had posted the open loan
    pub origin: LoanKind,
    pub lender: Address,
    pub borrower: Address,
    pub principal: Amount,
    pub collateral: Amount,
    /// Whole percent of the principal
    pub interest_percent: u64,
    pub maturity: Height,
    pub matched_at: Height,
}

impl MatchedLoan {
    /// Interest owed on the principal, `None` on overflow.
    pub fn interest_due(&self) -> Option<Amount> {
        percent_of(self.principal, self.interest_percent)
    }

    /// Principal plus interest, `None` on overflow.
    pub fn repayment_due(&self) -> Option<Amount> {
        self.principal.checked_add(self.interest_due()?)
    }

    pub fn is_party(&self, address: &Address) -> bool {
        self.lender == *address || self.borrower == *address
    }

    pub fn is_matured(&self, height: Height) -> bool {
        height >= self.maturity
    }
}
