use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::decode_prefixed;
use crate::error::TypeError;
use crate::reference::WriteReference;

/// Identifier of the ledger network the signing provider is attached to.
///
/// Kept as the decimal string the provider reports (`"1"`, `"11155111"`,
/// `"5777"`), which is also the key used by deployment descriptors.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub const MAINNET: &'static str = "1";
    pub const GOERLI: &'static str = "5";
    pub const SEPOLIA: &'static str = "11155111";
    pub const LOCAL: &'static str = "5777";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// The local development network.
    pub fn local() -> Self {
        Self::new(Self::LOCAL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable network name.
    pub fn display_name(&self) -> String {
        match self.0.as_str() {
            Self::MAINNET => "Ethereum Mainnet".into(),
            Self::GOERLI => "Goerli Testnet".into(),
            Self::SEPOLIA => "Sepolia Testnet".into(),
            Self::LOCAL => "Local Ganache".into(),
            other => format!("Network {other}"),
        }
    }

    /// Block explorer link for a confirmed write, if the network has a
    /// public explorer.
    pub fn explorer_tx_url(&self, reference: &WriteReference) -> Option<String> {
        let base = match self.0.as_str() {
            Self::MAINNET => "https://etherscan.io",
            Self::GOERLI => "https://goerli.etherscan.io",
            Self::SEPOLIA => "https://sepolia.etherscan.io",
            _ => return None,
        };
        Some(format!("{base}/tx/{reference}"))
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({})", self.0)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Address at which the registry is deployed on a network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryLocation([u8; 20]);

impl RegistryLocation {
    pub const fn from_raw(address: [u8; 20]) -> Self {
        Self(address)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_prefixed::<20>(s).map(Self)
    }
}

impl fmt::Debug for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistryLocation({})", self.to_hex())
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RegistryLocation {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for RegistryLocation {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<RegistryLocation> for String {
    fn from(location: RegistryLocation) -> Self {
        location.to_hex()
    }
}
