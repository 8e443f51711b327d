use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content fingerprint of a registered file.
///
/// A `Fingerprint` is the SHA-256 digest of a file's bytes. It is the unique
/// identity key of an asset: one ledger entry per distinct fingerprint.
///
/// The textual form is 64 lowercase hex characters. Parsing accepts an
/// optional `0x` prefix, surrounding whitespace and uppercase digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Length of the textual form in hex characters.
    pub const HEX_LEN: usize = 64;

    /// Create a `Fingerprint` from a pre-computed digest.
    pub const fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Lowercase hex with a `0x` prefix.
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Normalize user input into bare lowercase hex without validating length.
    ///
    /// Trims whitespace and strips a leading `0x` / `0X`. Fails only if the
    /// remainder contains non-hex characters.
    pub fn normalize(input: &str) -> Result<String, TypeError> {
        let trimmed = input.trim();
        let bare = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if let Some(bad) = bare.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHex(format!(
                "unexpected character {bad:?} in {input:?}"
            )));
        }
        Ok(bare.to_ascii_lowercase())
    }

    /// Parse from a hex string (64 hex characters, optional `0x` prefix).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let normalized = Self::normalize(s)?;
        if normalized.len() != Self::HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: normalized.len() / 2,
            });
        }
        let bytes = hex::decode(&normalized).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_hex()
    }
}

impl From<[u8; 32]> for Fingerprint {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
