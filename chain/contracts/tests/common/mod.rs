//! Shared harness for the contract integration tests.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use lending_contract::balances;
use lending_contract::config::ContractConfig;
use lending_contract::errors::ContractError;
use lending_contract::host::{address_of, MemoryLedger, Runtime, Transaction, TransactionType};
use lending_contract::storage::MemoryStore;
use lending_contract::{InvocationArg, LendingContract, Value};
use types::ids::{Address, AssetId, ScriptHash};
use types::numeric::Amount;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn admin_key() -> SigningKey {
    key(1)
}

pub fn contract_hash() -> ScriptHash {
    ScriptHash::new([0xcc; 20])
}

/// Recipient of withdrawn funds outside the contract.
pub fn external() -> ScriptHash {
    ScriptHash::new([0x11; 20])
}

pub fn fee_address() -> Address {
    Address::new([0x46; 34])
}

pub fn default_config() -> ContractConfig {
    ContractConfig::new(address_of(&admin_key()), contract_hash())
}

/// Contract, backing store and chain for one scenario.
pub struct Harness {
    pub contract: LendingContract,
    pub store: MemoryStore,
    pub ledger: MemoryLedger,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(default_config())
    }

    pub fn with_config(config: ContractConfig) -> Self {
        init_tracing();
        Self {
            contract: LendingContract::new(config).unwrap(),
            store: MemoryStore::new(),
            ledger: MemoryLedger::new(),
        }
    }

    /// Initialized with `fee` percent going to [`fee_address`].
    pub fn initialized(fee: u64) -> Self {
        let mut harness = Self::new();
        harness.initialize(fee).unwrap();
        harness
    }

    pub fn initialize(&mut self, fee: u64) -> Result<Value, ContractError> {
        self.call(&admin_key(), "initialize", &[fee.into(), fee_address().into()])
    }

    /// Invoke with `tx` as the script container.
    pub fn invoke(
        &mut self,
        tx: &Transaction,
        operation: &str,
        args: &[InvocationArg],
    ) -> Result<Value, ContractError> {
        let runtime = Runtime::new(&self.ledger, tx);
        self.contract.invoke(&mut self.store, &runtime, operation, args)
    }

    /// Invoke from a plain invocation signed by `signer`.
    pub fn call(
        &mut self,
        signer: &SigningKey,
        operation: &str,
        args: &[InvocationArg],
    ) -> Result<Value, ContractError> {
        let tx = Transaction::new(TransactionType::Invocation).signed_by(signer);
        self.invoke(&tx, operation, args)
    }

    /// Deposit `amount` of `asset` for the signer's address.
    pub fn deposit(&mut self, signer: &SigningKey, asset: AssetId, amount: Amount) {
        let tx = Transaction::new(TransactionType::Invocation)
            .with_output(asset, amount, contract_hash())
            .signed_by(signer);
        self.invoke(&tx, "deposit", &[address_of(signer).into()])
            .unwrap();
    }

    pub fn balance(&self, address: &Address, asset: &AssetId) -> Amount {
        balances::balance_of(&self.store, address, asset).unwrap()
    }

    pub fn verify(&self, tx: &Transaction) -> bool {
        self.contract.verify(&self.store, &self.ledger, tx)
    }
}
