//! Protocol fee rate
//!
//! The fee is an integer percentage of a loan's principal, charged when the
//! loan is closed. It is capped at half the principal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ValidationError;
use crate::numeric::{percent_of, Amount};

/// Validated fee rate in whole percent, `0..=FeeRate::LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FeeRate(u8);

impl FeeRate {
    /// Largest accepted rate: 50% of the principal.
    pub const LIMIT: u8 = 50;

    pub const ZERO: FeeRate = FeeRate(0);

    /// Validate a raw rate as passed to `setFee`.
    pub fn try_new(rate: i128) -> Result<Self, ValidationError> {
        if rate < 0 || rate > i128::from(Self::LIMIT) {
            return Err(ValidationError::FeeOutOfRange {
                rate,
                max: Self::LIMIT,
            });
        }
        Ok(Self(rate as u8))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Fee charged on `principal`, truncated toward zero.
    pub fn fee_on(self, principal: Amount) -> Amount {
        // rate <= 50 so the result never exceeds the principal
        percent_of(principal, u64::from(self.0)).unwrap_or(principal)
    }
}

impl TryFrom<u8> for FeeRate {
    type Error = ValidationError;

    fn try_from(rate: u8) -> Result<Self, Self::Error> {
        Self::try_new(i128::from(rate))
    }
}

impl From<FeeRate> for u8 {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
