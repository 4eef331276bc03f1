//! Fee policy storage
//!
//! Validate-then-store for the protocol fee rate and the address that
//! collects fees.

use types::fee::FeeRate;
use types::ids::Address;

use crate::errors::{ContractError, StorageError};
use crate::host::Witness;
use crate::security::AccessControl;
use crate::storage::{read_value, write_value, StorageKey, StorageRead, StorageWrite};

/// Current fee rate; zero before one is set.
pub fn fee_rate(store: &impl StorageRead) -> Result<FeeRate, StorageError> {
    Ok(read_value(store, StorageKey::Fee)?.unwrap_or(FeeRate::ZERO))
}

pub fn fee_address(store: &impl StorageRead) -> Result<Option<Address>, StorageError> {
    read_value(store, StorageKey::FeeAddress)
}

/// Persist `rate` if it lies within `0..=50`.
pub fn set_fee(store: &mut impl StorageWrite, rate: i128) -> Result<FeeRate, ContractError> {
    let rate = FeeRate::try_new(rate)?;
    write_value(store, StorageKey::Fee, &rate)?;
    Ok(rate)
}

/// Persist the fee destination. Requires the admin witness.
pub fn set_fee_address(
    store: &mut impl StorageWrite,
    access: &AccessControl,
    witness: &impl Witness,
    address: Address,
) -> Result<(), ContractError> {
    access.require_admin(witness)?;
    write_value(store, StorageKey::FeeAddress, &address)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use proptest::prelude::*;

    struct Signers(Vec<Address>);

    impl Witness for Signers {
        fn check_witness(&self, address: &Address) -> bool {
            self.0.contains(address)
        }
    }

    fn addr(b: u8) -> Address {
        Address::new([b; 34])
    }

    #[test]
    fn test_fee_defaults_to_zero() {
        let store = MemoryStore::new();
        assert_eq!(fee_rate(&store).unwrap(), FeeRate::ZERO);
        assert_eq!(fee_address(&store).unwrap(), None);
    }

    #[test]
    fn test_rejected_fee_leaves_previous_value() {
        let mut store = MemoryStore::new();
        set_fee(&mut store, 5).unwrap();
        assert!(set_fee(&mut store, 51).is_err());
        assert_eq!(fee_rate(&store).unwrap().percent(), 5);
    }

    #[test]
    fn test_set_fee_address_requires_admin() {
        let mut store = MemoryStore::new();
        let access = AccessControl::new(addr(1));

        let result = set_fee_address(&mut store, &access, &Signers(vec![addr(2)]), addr(9));
        assert!(matches!(result, Err(ContractError::Unauthorized { .. })));
        assert_eq!(fee_address(&store).unwrap(), None);

        set_fee_address(&mut store, &access, &Signers(vec![addr(1)]), addr(9)).unwrap();
        assert_eq!(fee_address(&store).unwrap(), Some(addr(9)));
    }

    proptest! {
        #[test]
        fn prop_set_fee_succeeds_iff_in_range(rate in -200i128..200) {
            let mut store = MemoryStore::new();
            prop_assert_eq!(set_fee(&mut store, rate).is_ok(), (0..=50).contains(&rate));
        }
    }
}
