//! Key-value storage and the per-invocation storage context
//!
//! The host exposes one flat byte-keyed store. Every application
//! invocation works through a [`StorageContext`]: reads fall through to the
//! backing store, writes and emitted events are buffered, and nothing
//! reaches the store unless the invocation commits. Dropping the context
//! discards the whole invocation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use types::ids::{Address, AssetId, LoanId};
use types::loan::LoanKind;

use crate::errors::StorageError;
use crate::events::ContractEvent;
use crate::state::ContractState;

/// Read access to contract storage.
pub trait StorageRead {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// Write access to contract storage.
pub trait StorageWrite: StorageRead {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
}

/// In-memory backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageRead for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }
}

impl StorageWrite for MemoryStore {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }
}

/// Scoped write buffer for a single invocation.
pub struct StorageContext<'s, S: StorageWrite> {
    store: &'s mut S,
    /// `None` marks a pending delete
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    events: Vec<ContractEvent>,
}

impl<'s, S: StorageWrite> StorageContext<'s, S> {
    pub fn begin(store: &'s mut S) -> Self {
        Self {
            store,
            pending: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Queue an event; it is released only on commit.
    pub fn notify(&mut self, event: ContractEvent) {
        self.events.push(event);
    }

    pub fn pending_events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Apply buffered writes to the store and hand back the emitted events.
    pub fn commit(self) -> Vec<ContractEvent> {
        for (key, value) in self.pending {
            match value {
                Some(value) => self.store.put(key, value),
                None => self.store.delete(&key),
            }
        }
        self.events
    }
}

impl<S: StorageWrite> StorageRead for StorageContext<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(value) => value.clone(),
            None => self.store.get(key),
        }
    }
}

impl<S: StorageWrite> StorageWrite for StorageContext<'_, S> {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }
}

/// Every persisted key the contract uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey<'a> {
    State,
    Fee,
    FeeAddress,
    /// Open loan record, namespaced by kind
    Loan(LoanKind, &'a LoanId),
    /// Available balance of an asset
    Balance(&'a Address, &'a AssetId),
    /// Start height of an open withdrawal window
    WithdrawalWindow(&'a Address),
    MatchedLoan(&'a LoanId),
    /// Ids of matched loans an address is party to
    MatchIndex(&'a Address),
}

const WITHDRAWING: u8 = 0x50;
const MATCHED: u8 = 0x4d;
const MATCH_INDEX: u8 = 0x49;

impl StorageKey<'_> {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            StorageKey::State => b"state".to_vec(),
            StorageKey::Fee => b"fee".to_vec(),
            StorageKey::FeeAddress => b"feeAddress".to_vec(),
            StorageKey::Loan(kind, id) => prefixed(kind.tag(), id.as_bytes()),
            StorageKey::Balance(address, asset) => {
                [address.as_bytes().as_slice(), asset.as_bytes().as_slice()].concat()
            }
            StorageKey::WithdrawalWindow(address) => {
                let mut key = address.as_bytes().to_vec();
                key.push(WITHDRAWING);
                key
            }
            StorageKey::MatchedLoan(id) => prefixed(MATCHED, id.as_bytes()),
            StorageKey::MatchIndex(address) => prefixed(MATCH_INDEX, address.as_bytes()),
        }
    }
}

fn prefixed(prefix: u8, body: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(body.len() + 1);
    key.push(prefix);
    key.extend_from_slice(body);
    key
}

impl fmt::Display for StorageKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::State => f.write_str("state"),
            StorageKey::Fee => f.write_str("fee"),
            StorageKey::FeeAddress => f.write_str("feeAddress"),
            StorageKey::Loan(kind, id) => write!(f, "loan/{kind}/{id}"),
            StorageKey::Balance(address, asset) => write!(f, "balance/{address}/{asset}"),
            StorageKey::WithdrawalWindow(address) => write!(f, "window/{address}"),
            StorageKey::MatchedLoan(id) => write!(f, "matched/{id}"),
            StorageKey::MatchIndex(address) => write!(f, "matches/{address}"),
        }
    }
}

/// Read a bincode-encoded value.
pub fn read_value<T: DeserializeOwned>(
    store: &impl StorageRead,
    key: StorageKey<'_>,
) -> Result<Option<T>, StorageError> {
    match store.get(&key.to_bytes()) {
        None => Ok(None),
        Some(bytes) => bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Decode {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Write a bincode-encoded value.
pub fn write_value<T: Serialize>(
    store: &mut impl StorageWrite,
    key: StorageKey<'_>,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = bincode::serialize(value).map_err(|e| StorageError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.put(key.to_bytes(), bytes);
    Ok(())
}

pub fn remove(store: &mut impl StorageWrite, key: StorageKey<'_>) {
    store.delete(&key.to_bytes());
}

pub fn read_state(store: &impl StorageRead) -> Result<ContractState, StorageError> {
    match store.get(&StorageKey::State.to_bytes()) {
        None => Ok(ContractState::Initial),
        Some(bytes) => ContractState::from_bytes(&bytes),
    }
}

pub fn write_state(store: &mut impl StorageWrite, state: ContractState) {
    store.put(StorageKey::State.to_bytes(), state.to_bytes());
}
