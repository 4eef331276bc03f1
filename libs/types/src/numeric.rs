//! Integer amounts and ledger heights
//!
//! Asset amounts are the ledger's smallest indivisible units. All
//! percentage math widens to `u128` and truncates toward zero.

/// Amount of an asset in base units.
pub type Amount = u64;

/// Ledger height (block index).
pub type Height = u64;

/// Denominator for every percentage in the lending model.
pub const PERCENT_BASE: u64 = 100;

/// `amount * percent / 100`, truncated. `None` if the result exceeds `u64`.
pub fn percent_of(amount: Amount, percent: u64) -> Option<Amount> {
    let scaled = u128::from(amount) * u128::from(percent) / u128::from(PERCENT_BASE);
    Amount::try_from(scaled).ok()
}
