use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ipshield_ledger::{DuplicatePolicy, InMemoryLedgerConfig};
use ipshield_types::NetworkId;
use serde::{Deserialize, Serialize};

/// Client configuration, read from `ipshield.toml`.
///
/// Every field is optional in the file. `IPSHIELD_NETWORK` overrides
/// `network`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network the signing identity is attached to.
    pub network: String,
    /// Deployment descriptor (contract artifact JSON). When absent, a local
    /// registry is deployed for `network`.
    pub deployments: Option<PathBuf>,
    /// Where the local ledger is persisted between runs.
    pub ledger_state: PathBuf,
    /// Hex Ed25519 seed. When absent, a key is generated once and kept next
    /// to the ledger state.
    pub key_seed: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
    pub confirmation_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::LOCAL.into(),
            deployments: None,
            ledger_state: PathBuf::from(".ipshield/ledger.json"),
            key_seed: None,
            duplicate_policy: DuplicatePolicy::Reject,
            confirmation_delay_ms: 0,
        }
    }
}

impl ClientConfig {
    pub const DEFAULT_PATH: &'static str = "ipshield.toml";
    pub const NETWORK_ENV: &'static str = "IPSHIELD_NETWORK";

    /// Load from `path`, or from `ipshield.toml` if it exists. An explicitly
    /// named file must exist; the default one may not.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(Self::DEFAULT_PATH).exists() => {
                Self::from_file(Path::new(Self::DEFAULT_PATH))?
            }
            None => Self::default(),
        };
        config.override_network(std::env::var(Self::NETWORK_ENV).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn override_network(&mut self, network: Option<String>) {
        if let Some(network) = network.filter(|n| !n.trim().is_empty()) {
            tracing::debug!(network = %network, "network overridden from environment");
            self.network = network;
        }
    }

    pub fn network_id(&self) -> NetworkId {
        NetworkId::new(self.network.as_str())
    }

    pub fn ledger_config(&self) -> InMemoryLedgerConfig {
        InMemoryLedgerConfig {
            duplicate_policy: self.duplicate_policy,
            confirmation_delay: Duration::from_millis(self.confirmation_delay_ms),
        }
    }

    /// Generated signing key location.
    pub fn key_path(&self) -> PathBuf {
        self.ledger_state.with_file_name("signer.key")
    }
}
