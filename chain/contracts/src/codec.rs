//! Fixed-layout binary form of an open loan record
//!
//! ```text
//! address (34) ‖ amount (8, LE) ‖ duration (8, LE) ‖ interest (rest)
//! ```
//!
//! The kind is not stored; callers know which kind they are loading. A
//! missing or truncated record decodes to `None`.

use tracing::debug;
use types::ids::Address;
use types::loan::{InterestRate, Loan, LoanKind};

pub struct LoanCodec;

impl LoanCodec {
    const ADDRESS_LEN: usize = Address::LEN;
    const WORD_LEN: usize = 8;
    /// Bytes before the variable-length interest field.
    pub const HEADER_LEN: usize = Self::ADDRESS_LEN + 2 * Self::WORD_LEN;

    pub fn encode(loan: &Loan) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + loan.interest.as_bytes().len());
        out.extend_from_slice(loan.address.as_bytes());
        out.extend_from_slice(&loan.amount.to_le_bytes());
        out.extend_from_slice(&loan.duration.to_le_bytes());
        out.extend_from_slice(loan.interest.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8], kind: LoanKind) -> Option<Loan> {
        if bytes.len() < Self::HEADER_LEN {
            if !bytes.is_empty() {
                debug!(len = bytes.len(), %kind, "Truncated loan record");
            }
            return None;
        }
        let (address, rest) = bytes.split_at(Self::ADDRESS_LEN);
        let (amount, rest) = rest.split_at(Self::WORD_LEN);
        let (duration, interest) = rest.split_at(Self::WORD_LEN);

        Some(Loan {
            kind,
            address: Address::from_slice(address).ok()?,
            amount: u64::from_le_bytes(amount.try_into().ok()?),
            interest: InterestRate::from_bytes(interest),
            duration: u64::from_le_bytes(duration.try_into().ok()?),
        })
    }
}
