//! Strongly-typed identifiers for registry entities
//!
//! Byte identifiers are wrapped in newtypes and serialize as lowercase hex
//! strings without a `0x` prefix, which is also how they are displayed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid hex in {kind}: {reason}")]
    InvalidHex { kind: &'static str, reason: String },

    #[error("{kind} must be {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = IdError;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| IdError::InvalidLength {
                    kind: stringify!($name),
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(trimmed).map_err(|e| IdError::InvalidHex {
                    kind: stringify!($name),
                    reason: e.to_string(),
                })?;
                Self::try_from(bytes.as_slice())
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_hex()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

hex_id!(
    /// Account address that owns a workflow
    Owner,
    20
);

hex_id!(
    /// Content-derived workflow identifier.
    ///
    /// A new id is produced every time a workflow's binary, config or
    /// secrets reference changes, so the id doubles as a staleness marker.
    WorkflowId,
    32
);

hex_id!(
    /// Registry key for a workflow: `sha256(owner || name)`
    WorkflowKey,
    32
);

impl WorkflowId {
    /// Derive the id the registry expects for the given artifacts.
    pub fn derive(
        owner: &Owner,
        name: &str,
        binary: &[u8],
        config: &[u8],
        secrets_url: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update(name.as_bytes());
        hasher.update(binary);
        hasher.update(config);
        hasher.update(secrets_url.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl WorkflowKey {
    pub fn derive(owner: &Owner, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update(name.as_bytes());
        Self(hasher.finalize().into())
    }
}

/// Identifier of a Decentralized Oracle Network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DonId(u32);

impl DonId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DonId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for DonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "don:{}", self.0)
    }
}

/// The DON this node belongs to, as reported by membership discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Don {
    /// DON identifier
    pub id: DonId,

    /// Member node identities
    #[serde(default)]
    pub members: Vec<String>,

    /// Fault tolerance parameter
    #[serde(default)]
    pub f: u8,
}

impl Don {
    pub fn new(id: impl Into<DonId>) -> Self {
        Self {
            id: id.into(),
            members: Vec::new(),
            f: 0,
        }
    }
}

/// Store-assigned identifier of a cached secrets row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretsId(u64);

impl SecretsId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SecretsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secrets:{}", self.0)
    }
}
