//! Host ledger interfaces
//!
//! The contract does not produce blocks or verify consensus. It reads the
//! current height and historical blocks through [`Ledger`], asks whether an
//! address signed the current transaction through [`Witness`], and inspects
//! the transaction being verified or executed.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::ids::{Address, AssetId, ScriptHash};
use types::numeric::{Amount, Height};

/// Transaction type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Plain asset transfer
    Contract,
    /// Contract invocation
    Invocation,
    Other(u8),
}

impl TransactionType {
    pub fn code(self) -> u8 {
        match self {
            TransactionType::Contract => 0x80,
            TransactionType::Invocation => 0xd1,
            TransactionType::Other(code) => code,
        }
    }
}

/// Transaction attribute usage byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeUsage {
    /// Verification script of the transaction; carries the destination
    Script,
    /// Hash slot; a withdrawal names the contract here
    Hash1,
    Other(u8),
}

impl AttributeUsage {
    pub fn code(self) -> u8 {
        match self {
            AttributeUsage::Script => 0x20,
            AttributeUsage::Hash1 => 0xa1,
            AttributeUsage::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAttribute {
    pub usage: AttributeUsage,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub asset_id: AssetId,
    pub value: Amount,
    /// Recipient
    pub script_hash: ScriptHash,
}

/// Ed25519 signature by one signer of the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxWitness {
    pub public_key: [u8; 32],
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TransactionType,
    pub attributes: Vec<TxAttribute>,
    pub outputs: Vec<TxOutput>,
    /// Outputs of earlier transactions spent by this one
    pub references: Vec<TxOutput>,
    pub witnesses: Vec<TxWitness>,
}

impl Transaction {
    pub fn new(tx_type: TransactionType) -> Self {
        Self {
            tx_type,
            attributes: Vec::new(),
            outputs: Vec::new(),
            references: Vec::new(),
            witnesses: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, usage: AttributeUsage, data: impl Into<Vec<u8>>) -> Self {
        self.attributes.push(TxAttribute {
            usage,
            data: data.into(),
        });
        self
    }

    pub fn with_output(mut self, asset_id: AssetId, value: Amount, script_hash: ScriptHash) -> Self {
        self.outputs.push(TxOutput {
            asset_id,
            value,
            script_hash,
        });
        self
    }

    pub fn with_reference(mut self, asset_id: AssetId, value: Amount, script_hash: ScriptHash) -> Self {
        self.references.push(TxOutput {
            asset_id,
            value,
            script_hash,
        });
        self
    }

    /// Data of the first attribute with the given usage.
    pub fn attribute(&self, usage: AttributeUsage) -> Option<&[u8]> {
        self.attributes
            .iter()
            .find(|a| a.usage == usage)
            .map(|a| a.data.as_slice())
    }

    /// Invocation transaction tagged as a withdrawal from `contract`.
    pub fn is_withdrawal_from(&self, contract: &ScriptHash) -> bool {
        self.tx_type == TransactionType::Invocation
            && self
                .attributes
                .iter()
                .any(|a| a.usage == AttributeUsage::Hash1 && a.data == contract.as_bytes())
    }

    /// Withdrawal destination named by the `Script` attribute.
    pub fn destination(&self) -> Option<Address> {
        self.attribute(AttributeUsage::Script)
            .and_then(|data| Address::from_slice(data).ok())
    }

    /// SHA-256 over everything except the witnesses.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([self.tx_type.code()]);
        for attribute in &self.attributes {
            hasher.update([attribute.usage.code()]);
            hasher.update((attribute.data.len() as u32).to_le_bytes());
            hasher.update(&attribute.data);
        }
        for outputs in [&self.outputs, &self.references] {
            hasher.update((outputs.len() as u32).to_le_bytes());
            for output in outputs {
                hasher.update(output.asset_id.as_bytes());
                hasher.update(output.value.to_le_bytes());
                hasher.update(output.script_hash.as_bytes());
            }
        }
        hasher.finalize().into()
    }

    /// Append a witness signed by `key`. Sign after the body is final.
    pub fn sign(&mut self, key: &SigningKey) {
        let signature = key.sign(&self.signing_hash());
        self.witnesses.push(TxWitness {
            public_key: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        });
    }

    pub fn signed_by(mut self, key: &SigningKey) -> Self {
        self.sign(key);
        self
    }
}

/// Was the current script container authorized by `address`?
pub trait Witness {
    fn check_witness(&self, address: &Address) -> bool;
}

impl Witness for Transaction {
    fn check_witness(&self, address: &Address) -> bool {
        let hash = self.signing_hash();
        self.witnesses.iter().any(|witness| {
            if Address::from_public_key(&witness.public_key) != *address {
                return false;
            }
            let Ok(key) = VerifyingKey::from_bytes(&witness.public_key) else {
                return false;
            };
            let Ok(signature) = Signature::from_slice(&witness.signature) else {
                return false;
            };
            key.verify(&hash, &signature).is_ok()
        })
    }
}

/// Address controlled by a signing key.
pub fn address_of(key: &SigningKey) -> Address {
    Address::from_public_key(&key.verifying_key().to_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: Height,
    pub transactions: Vec<Transaction>,
}

/// Read access to the chain.
pub trait Ledger {
    /// Height of the block currently being built; every block below it is
    /// available through [`Ledger::block`].
    fn current_height(&self) -> Height;

    fn block(&self, height: Height) -> Option<&Block>;
}

/// Chain held in memory, starting from an empty genesis block.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    blocks: Vec<Block>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block {
                index: 0,
                transactions: Vec::new(),
            }],
        }
    }

    /// Append a block and return its height.
    pub fn push_block(&mut self, transactions: Vec<Transaction>) -> Height {
        let index = self.blocks.len() as Height;
        self.blocks.push(Block {
            index,
            transactions,
        });
        index
    }

    /// Append empty blocks until `current_height() == height`.
    pub fn advance_to(&mut self, height: Height) {
        while self.current_height() < height {
            self.push_block(Vec::new());
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    fn current_height(&self) -> Height {
        self.blocks.len() as Height
    }

    fn block(&self, height: Height) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|i| self.blocks.get(i))
    }
}

/// Host services available to an application-context invocation.
pub struct Runtime<'a> {
    pub ledger: &'a dyn Ledger,
    /// Transaction carrying the invocation
    pub container: &'a Transaction,
}

impl<'a> Runtime<'a> {
    pub fn new(ledger: &'a dyn Ledger, container: &'a Transaction) -> Self {
        Self { ledger, container }
    }

    pub fn height(&self) -> Height {
        self.ledger.current_height()
    }
}

impl Witness for Runtime<'_> {
    fn check_witness(&self, address: &Address) -> bool {
        self.container.check_witness(address)
    }
}
