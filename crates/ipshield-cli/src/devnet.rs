use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use ipshield_crypto::SigningKey;
use ipshield_ledger::{DeploymentDescriptor, InMemoryLedger, LedgerSession, LocalKeyring};

use crate::config::ClientConfig;

/// Local ledger persisted between CLI runs, plus the signing key.
pub struct Devnet {
    config: ClientConfig,
    ledger: Arc<InMemoryLedger>,
    keyring: Arc<LocalKeyring>,
    deployments: DeploymentDescriptor,
}

impl Devnet {
    pub fn open(config: ClientConfig) -> anyhow::Result<Self> {
        let ledger = if config.ledger_state.exists() {
            let text = std::fs::read_to_string(&config.ledger_state)
                .with_context(|| format!("reading {}", config.ledger_state.display()))?;
            InMemoryLedger::from_json(config.ledger_config(), &text)
                .with_context(|| format!("restoring {}", config.ledger_state.display()))?
        } else {
            InMemoryLedger::new(config.ledger_config())
        };

        let network = config.network_id();
        let mut deployments = match &config.deployments {
            Some(path) => DeploymentDescriptor::from_file(path)?,
            None => DeploymentDescriptor::new(),
        };
        if config.deployments.is_none() {
            let location = ledger.deploy_for_network(&network)?;
            deployments.insert(network.clone(), location);
        }
        // Every configured registry must exist on the local ledger.
        for (_, location) in deployments.networks() {
            ledger.deploy(*location)?;
        }

        let key = load_or_create_key(&config)?;
        let keyring = LocalKeyring::new(network).with_key(key);
        tracing::debug!(
            state = %config.ledger_state.display(),
            networks = deployments.networks().count(),
            "devnet opened"
        );

        Ok(Self {
            config,
            ledger: Arc::new(ledger),
            keyring: Arc::new(keyring),
            deployments,
        })
    }

    /// A fresh session over the devnet ledger.
    pub fn session(&self) -> LedgerSession {
        LedgerSession::new(
            self.keyring.clone(),
            self.ledger.clone(),
            self.deployments.clone(),
        )
    }

    pub fn deployments(&self) -> &DeploymentDescriptor {
        &self.deployments
    }

    /// Persist the ledger state.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = &self.config.ledger_state;
        ensure_parent(path)?;
        std::fs::write(path, self.ledger.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(state = %path.display(), "devnet saved");
        Ok(())
    }
}

fn load_or_create_key(config: &ClientConfig) -> anyhow::Result<SigningKey> {
    if let Some(seed) = &config.key_seed {
        return SigningKey::from_hex(seed).context("invalid key_seed");
    }
    let path = config.key_path();
    if path.exists() {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        return SigningKey::from_hex(text.trim())
            .with_context(|| format!("invalid signing key in {}", path.display()));
    }
    let key = SigningKey::generate();
    ensure_parent(&path)?;
    std::fs::write(&path, key.to_hex()).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(identity = %key.identity(), "generated signing key");
    Ok(key)
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display())),
        _ => Ok(()),
    }
}
