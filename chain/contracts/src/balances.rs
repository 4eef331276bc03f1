//! Balance ledger: available balances and withdrawal windows
//!
//! Balances are keyed by `(holder, asset)`. The withdrawal verifier reads
//! them to bound what a holder may take out; lending operations move them
//! atomically with the loan state change that caused the movement.
//!
//! A withdrawal window records the height at which a holder's current
//! withdrawal eligibility began. No window means nothing is withdrawable.

use types::errors::ValidationError;
use types::ids::{Address, AssetId};
use types::numeric::{Amount, Height};

use crate::errors::{ContractError, StorageError};
use crate::storage::{read_value, remove, write_value, StorageKey, StorageRead, StorageWrite};

// ───────────────────────── Balances ─────────────────────────

pub fn balance_of(
    store: &impl StorageRead,
    holder: &Address,
    asset: &AssetId,
) -> Result<Amount, StorageError> {
    Ok(read_value(store, StorageKey::Balance(holder, asset))?.unwrap_or(0))
}

/// Fails with `InsufficientBalance` unless `holder` has `amount` available.
pub fn ensure_available(
    store: &impl StorageRead,
    holder: &Address,
    asset: &AssetId,
    amount: Amount,
) -> Result<(), ContractError> {
    let available = balance_of(store, holder, asset)?;
    if available < amount {
        return Err(ContractError::InsufficientBalance {
            asset: *asset,
            required: amount,
            available,
        });
    }
    Ok(())
}

/// Add to a balance with overflow protection. Returns the new balance.
pub fn credit(
    store: &mut impl StorageWrite,
    holder: &Address,
    asset: &AssetId,
    amount: Amount,
) -> Result<Amount, ContractError> {
    let current = balance_of(store, holder, asset)?;
    let updated = current.checked_add(amount).ok_or(ContractError::Overflow)?;
    store_balance(store, holder, asset, updated)?;
    Ok(updated)
}

/// Subtract from a balance with underflow protection. Returns the new
/// balance.
pub fn debit(
    store: &mut impl StorageWrite,
    holder: &Address,
    asset: &AssetId,
    amount: Amount,
) -> Result<Amount, ContractError> {
    let current = balance_of(store, holder, asset)?;
    let updated = current
        .checked_sub(amount)
        .ok_or(ContractError::InsufficientBalance {
            asset: *asset,
            required: amount,
            available: current,
        })?;
    store_balance(store, holder, asset, updated)?;
    Ok(updated)
}

pub fn transfer(
    store: &mut impl StorageWrite,
    from: &Address,
    to: &Address,
    asset: &AssetId,
    amount: Amount,
) -> Result<(), ContractError> {
    debit(store, from, asset, amount)?;
    credit(store, to, asset, amount)?;
    Ok(())
}

fn store_balance(
    store: &mut impl StorageWrite,
    holder: &Address,
    asset: &AssetId,
    amount: Amount,
) -> Result<(), StorageError> {
    let key = StorageKey::Balance(holder, asset);
    if amount == 0 {
        remove(store, key);
        return Ok(());
    }
    write_value(store, key, &amount)
}

// ───────────────────────── Withdrawal windows ─────────────────────────

/// Start height of the holder's open window, if any.
pub fn withdrawal_window(
    store: &impl StorageRead,
    holder: &Address,
) -> Result<Option<Height>, StorageError> {
    let start: Option<Height> = read_value(store, StorageKey::WithdrawalWindow(holder))?;
    Ok(start.filter(|h| *h != 0))
}

/// Open a window at `height`. At most one window per holder is open.
pub fn open_withdrawal_window(
    store: &mut impl StorageWrite,
    holder: &Address,
    height: Height,
) -> Result<(), ContractError> {
    if height == 0 {
        return Err(ValidationError::OutOfRange {
            value: 0,
            target: "withdrawal window start",
        }
        .into());
    }
    if let Some(since) = withdrawal_window(store, holder)? {
        return Err(ContractError::WithdrawalWindowOpen {
            address: holder.to_string(),
            since,
        });
    }
    write_value(store, StorageKey::WithdrawalWindow(holder), &height)?;
    Ok(())
}

pub fn close_withdrawal_window(store: &mut impl StorageWrite, holder: &Address) {
    remove(store, StorageKey::WithdrawalWindow(holder));
}
