//! Core type definitions for the registry library
//!
//! Fixed-width identifiers shared by the gateways and flows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use alloy_primitives::{Address, B256};

/// Type alias for 32-byte arrays used across hashing operations
pub type Bytes32 = [u8; 32];

/// Parses `0x`-prefixed (or bare) hex into exactly 32 bytes.
fn parse_bytes32(s: &str) -> Result<Bytes32, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| format!("invalid hex {s:?}: {e}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))
}

/// EVM chain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Parses the hex quantity form providers return from `eth_chainId`.
    pub fn from_hex_quantity(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
        u64::from_str_radix(digits, 16).ok().map(ChainId)
    }

    pub fn to_hex_quantity(self) -> String { format!("0x{:x}", self.0) }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub B256);

        impl $name {
            pub fn as_bytes(&self) -> &Bytes32 { &self.0 .0 }

            pub fn to_b256(self) -> B256 { self.0 }
        }

        impl From<B256> for $name {
            fn from(value: B256) -> Self { $name(value) }
        }

        impl From<Bytes32> for $name {
            fn from(value: Bytes32) -> Self { $name(B256::from(value)) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_bytes32(s).map(Self::from)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_newtype! {
    /// Keccak-256 content digest of a serialized proof; the on-chain key.
    ProofHash
}

hash_newtype! {
    /// Hash of a mined transaction.
    TxHash
}
