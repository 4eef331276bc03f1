//! Fixed-width identifier types for lending participants and assets
//!
//! Every identifier is a byte array of a fixed width. The text form is
//! lowercase hex, except for [`Address`], which is shown as its printable
//! 34-character form when it has one.

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

macro_rules! fixed_bytes_id {
    ($(#[$meta:meta])* $name:ident, $len:expr, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Build from a slice, failing unless it is exactly `LEN` bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
                let array: [u8; $len] =
                    bytes
                        .try_into()
                        .map_err(|_| ValidationError::InvalidLength {
                            what: $what,
                            expected: $len,
                            actual: bytes.len(),
                        })?;
                Ok(Self(array))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            fn parse_hex(s: &str) -> Result<Self, ValidationError> {
                let bytes =
                    hex::decode(s).map_err(|e| ValidationError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(de::Error::custom)
            }
        }
    };
}

fixed_bytes_id!(
    /// Identity of a lending participant (34 bytes).
    ///
    /// Owner of the asset side of a loan: lender for an offer, pledger for a
    /// demand. Balances and withdrawal windows are keyed by this value.
    Address,
    34,
    "address"
);

fixed_bytes_id!(
    /// Identifier of a native ledger asset (32 bytes).
    AssetId,
    32,
    "asset id"
);

fixed_bytes_id!(
    /// Hash of a verification script (20 bytes); identifies the contract
    /// itself and the recipients of transaction outputs.
    ScriptHash,
    20,
    "script hash"
);

fixed_bytes_id!(
    /// Deterministic loan identifier, see [`crate::loan::Loan::id`].
    LoanId,
    32,
    "loan id"
);

impl Address {
    /// Derive the address controlled by an Ed25519 public key.
    ///
    /// The address is `'A'` followed by the first 33 hex digits of
    /// `SHA-256(public_key)`, so it is always printable.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = hex::encode(Sha256::digest(public_key));
        let mut bytes = [0u8; 34];
        bytes[0] = b'A';
        bytes[1..].copy_from_slice(&digest.as_bytes()[..33]);
        Self(bytes)
    }

    fn is_printable(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_alphanumeric())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            // Checked above: every byte is ASCII.
            f.write_str(std::str::from_utf8(&self.0).map_err(|_| fmt::Error)?)
        } else {
            f.write_str(&self.to_hex())
        }
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    /// Accepts the 34-character printable form or 68 hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == Self::LEN * 2 {
            return Self::parse_hex(s);
        }
        Self::from_slice(s.as_bytes())
    }
}

macro_rules! hex_text {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.to_hex())
                }
            }

            impl FromStr for $name {
                type Err = ValidationError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::parse_hex(s)
                }
            }
        )*
    };
}

hex_text!(AssetId, ScriptHash, LoanId);

/// NEO governing token, pledged as collateral.
pub const NEO_ASSET: AssetId = AssetId::new([
    0xc5, 0x6f, 0x33, 0xfc, 0x6e, 0xcf, 0xcd, 0x0c, 0x22, 0x5c, 0x4a, 0xb3, 0x56, 0xfe, 0xe5, 0x93,
    0x90, 0xaf, 0x85, 0x60, 0xbe, 0x0e, 0x93, 0x0f, 0xae, 0xbe, 0x74, 0xa6, 0xda, 0xff, 0x7c, 0x9b,
]);

/// GAS utility token, lent as principal.
pub const GAS_ASSET: AssetId = AssetId::new([
    0x60, 0x2c, 0x79, 0x71, 0x8b, 0x16, 0xe4, 0x42, 0xde, 0x58, 0x77, 0x8e, 0x14, 0x8d, 0x0b, 0x10,
    0x84, 0xe3, 0xb2, 0xdf, 0xfd, 0x5d, 0xe6, 0xb7, 0xb1, 0x6c, 0xee, 0x79, 0x69, 0x28, 0x2d, 0xe7,
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_printable_display() {
        let addr: Address = "AK2nJJpJr6o664CWJKi1QRXjqeic2zRp8y".parse().unwrap();
        assert_eq!(addr.to_string(), "AK2nJJpJr6o664CWJKi1QRXjqeic2zRp8y");
    }

    #[test]
    fn test_address_binary_display_is_hex() {
        let addr = Address::new([0u8; 34]);
        assert_eq!(addr.to_string(), "00".repeat(34));
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_address_wrong_length() {
        let err = "short".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidLength {
                what: "address",
                expected: 34,
                actual: 5
            }
        );
    }

    #[test]
    fn test_address_from_public_key_is_stable() {
        let a = Address::from_public_key(&[7u8; 32]);
        let b = Address::from_public_key(&[7u8; 32]);
        let c = Address::from_public_key(&[8u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_bytes()[0], b'A');
        assert!(a.to_string().starts_with('A'));
    }

    #[test]
    fn test_asset_id_hex() {
        assert_eq!(
            NEO_ASSET.to_string(),
            "c56f33fc6ecfcd0c225c4ab356fee59390af8560be0e930faebe74a6daff7c9b"
        );
        let parsed: AssetId = GAS_ASSET.to_string().parse().unwrap();
        assert_eq!(parsed, GAS_ASSET);
    }

    #[test]
    fn test_script_hash_rejects_bad_hex() {
        assert!(matches!(
            "zz".parse::<ScriptHash>(),
            Err(ValidationError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_address_serialization() {
        let addr: Address = "AK2nJJpJr6o664CWJKi1QRXjqeic2zRp8y".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"AK2nJJpJr6o664CWJKi1QRXjqeic2zRp8y\"");
        let deserialized: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, deserialized);
    }
}
