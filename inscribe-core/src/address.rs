//! Account addresses and inscription targets

use crate::error::{InscribeError, Result};
use crate::MAX_TAG_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 32-byte remote account address, displayed and serialized as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to base58 string
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parse from base58 string
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| InscribeError::InvalidAddress(format!("{}: {}", s, e)))?;

        if bytes.len() != 32 {
            return Err(InscribeError::InvalidAddress(format!(
                "Invalid length: expected 32, got {}",
                bytes.len()
            )));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = InscribeError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_base58(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_base58()
    }
}

impl FromStr for Address {
    type Err = InscribeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_base58())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

/// The account an inscription is written into, together with the metadata
/// account that authorizes writes and an optional associated tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTarget")]
pub struct InscriptionTarget {
    /// Account whose data holds the inscribed bytes
    pub account: Address,

    /// Inscription metadata account (authority list, rank)
    pub metadata_account: Address,

    /// Sub-stream tag, e.g. "image"; `None` for the primary inscription
    associated_tag: Option<String>,
}

/// Unchecked wire form of [`InscriptionTarget`]
#[derive(Deserialize)]
struct RawTarget {
    account: Address,
    metadata_account: Address,
    associated_tag: Option<String>,
}

impl TryFrom<RawTarget> for InscriptionTarget {
    type Error = InscribeError;

    fn try_from(raw: RawTarget) -> Result<Self> {
        match raw.associated_tag {
            Some(tag) => Self::associated(raw.account, raw.metadata_account, tag),
            None => Ok(Self::new(raw.account, raw.metadata_account)),
        }
    }
}

impl InscriptionTarget {
    /// Target the primary inscription of a metadata account
    pub fn new(account: Address, metadata_account: Address) -> Self {
        Self {
            account,
            metadata_account,
            associated_tag: None,
        }
    }

    /// Target an associated inscription
    pub fn associated(
        account: Address,
        metadata_account: Address,
        tag: impl Into<String>,
    ) -> Result<Self> {
        let tag = tag.into();
        validate_tag(&tag)?;
        Ok(Self {
            account,
            metadata_account,
            associated_tag: Some(tag),
        })
    }

    /// Tag as a string slice
    pub fn tag(&self) -> Option<&str> {
        self.associated_tag.as_deref()
    }
}

impl fmt::Display for InscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.associated_tag {
            Some(tag) => write!(f, "{} ({})", self.account, tag),
            None => write!(f, "{}", self.account),
        }
    }
}

/// Check an associated tag against the remote program's rules.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(InscribeError::InvalidTag("tag cannot be blank".to_string()));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(InscribeError::InvalidTag(format!(
            "tag is {} bytes (max: {})",
            tag.len(),
            MAX_TAG_LEN
        )));
    }
    Ok(())
}
