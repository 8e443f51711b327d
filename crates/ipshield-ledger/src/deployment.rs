use std::collections::BTreeMap;
use std::path::Path;

use ipshield_types::{NetworkId, RegistryLocation};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Registry deployment on one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub address: RegistryLocation,
}

/// Mapping from network identifier to registry location.
///
/// Uses the layout of a compiled contract artifact:
///
/// ```json
/// { "networks": { "5777": { "address": "0x5FbD…0aa3" } } }
/// ```
///
/// Any other artifact fields (ABI, bytecode, …) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    #[serde(default)]
    networks: BTreeMap<NetworkId, Deployment>,
}

impl DeploymentDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style single entry.
    pub fn with_deployment(mut self, network: NetworkId, address: RegistryLocation) -> Self {
        self.insert(network, address);
        self
    }

    pub fn insert(&mut self, network: NetworkId, address: RegistryLocation) {
        self.networks.insert(network, Deployment { address });
    }

    pub fn from_json(text: &str) -> LedgerResult<Self> {
        serde_json::from_str(text).map_err(|e| LedgerError::Deployment(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Deployment(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> LedgerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Deployment(e.to_string()))
    }

    /// Registry location for a network. A missing entry is a configuration
    /// error: nothing can be read or written until the network changes.
    pub fn resolve(&self, network: &NetworkId) -> LedgerResult<RegistryLocation> {
        self.networks
            .get(network)
            .map(|d| d.address)
            .ok_or_else(|| LedgerError::UnregisteredNetwork {
                network: network.to_string(),
            })
    }

    pub fn networks(&self) -> impl Iterator<Item = (&NetworkId, &RegistryLocation)> {
        self.networks.iter().map(|(id, d)| (id, &d.address))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
