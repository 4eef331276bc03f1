//! Shared guards for contract operations
//!
//! Witness checks against the admin or an operation's own signer, and the
//! lifecycle-state gate every lending operation passes first.

use tracing::{debug, warn};
use types::ids::Address;

use crate::errors::ContractError;
use crate::host::Witness;
use crate::state::ContractState;

/// Admin witness checks.
#[derive(Debug, Clone)]
pub struct AccessControl {
    admin: Address,
}

impl AccessControl {
    pub fn new(admin: Address) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    pub fn is_admin(&self, witness: &impl Witness) -> bool {
        witness.check_witness(&self.admin)
    }

    /// Fails unless the admin signed the invocation. Failures are logged.
    pub fn require_admin(&self, witness: &impl Witness) -> Result<(), ContractError> {
        if !self.is_admin(witness) {
            warn!(admin = %self.admin, "Owner verification failed");
            return Err(ContractError::Unauthorized {
                address: self.admin.to_string(),
            });
        }
        Ok(())
    }
}

/// Fails unless `address` signed the invocation.
pub fn require_witness(witness: &impl Witness, address: &Address) -> Result<(), ContractError> {
    if !witness.check_witness(address) {
        debug!(%address, "Signer verification failed");
        return Err(ContractError::Unauthorized {
            address: address.to_string(),
        });
    }
    Ok(())
}

/// Gate for lending operations.
pub fn require_active(state: ContractState) -> Result<(), ContractError> {
    if state != ContractState::Active {
        return Err(ContractError::InvalidState { actual: state });
    }
    Ok(())
}

/// Gate for admin operations after bootstrap.
pub fn require_initialized(state: ContractState) -> Result<(), ContractError> {
    if !state.is_initialized() {
        return Err(ContractError::InvalidState { actual: state });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Witness that vouches for a fixed set of addresses.
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
    fn test_require_admin() {
        let ac = AccessControl::new(addr(1));
        assert!(ac.require_admin(&Signers(vec![addr(1)])).is_ok());
        assert!(matches!(
            ac.require_admin(&Signers(vec![addr(2)])),
            Err(ContractError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_require_witness() {
        let signers = Signers(vec![addr(3)]);
        assert!(require_witness(&signers, &addr(3)).is_ok());
        assert!(require_witness(&signers, &addr(4)).is_err());
    }

    #[test]
    fn test_state_gates() {
        assert!(require_active(ContractState::Active).is_ok());
        assert_eq!(
            require_active(ContractState::Inactive),
            Err(ContractError::InvalidState {
                actual: ContractState::Inactive
            })
        );
        assert!(require_initialized(ContractState::Inactive).is_ok());
        assert!(require_initialized(ContractState::Initial).is_err());
    }
}
