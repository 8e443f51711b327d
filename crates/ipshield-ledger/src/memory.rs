use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipshield_crypto::DomainHasher;
use ipshield_types::{Fingerprint, NetworkId, RegistryLocation, WriteReference};
use serde::{Deserialize, Serialize};

use crate::backend::{HashStoredEvent, LedgerEntry, RegistryBackend, SignedWrite, WriteReceipt};
use crate::error::{LedgerError, LedgerResult};

/// How the registry treats a write for an already-registered fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Revert the write with [`LedgerError::AlreadyRegistered`].
    #[default]
    Reject,
    /// Accept the write without changing state (`applied = false`).
    Ignore,
}

/// Configuration for [`InMemoryLedger`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InMemoryLedgerConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Simulated time between submission and confirmation.
    pub confirmation_delay: Duration,
}

impl Default for InMemoryLedgerConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            confirmation_delay: Duration::ZERO,
        }
    }
}

/// In-memory registry ledger for tests, local demos, and embedding.
///
/// Hosts one registry per deployed location. Every write must carry a valid
/// signature from the identity it claims to come from. State can be exported
/// to JSON and restored, so the CLI can keep a local devnet between runs.
pub struct InMemoryLedger {
    config: InMemoryLedgerConfig,
    inner: RwLock<LedgerState>,
    faults: Mutex<Faults>,
}

#[derive(Default, Serialize, Deserialize)]
struct LedgerState {
    registries: BTreeMap<RegistryLocation, RegistryState>,
    block_number: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

#[derive(Default, Serialize, Deserialize)]
struct RegistryState {
    entries: BTreeMap<Fingerprint, LedgerEntry>,
    /// Enumeration order of `get_all_hashes`.
    order: Vec<Fingerprint>,
    events: Vec<HashStoredEvent>,
}

#[derive(Default)]
struct Faults {
    next_write: Option<String>,
    reads: Option<String>,
}

impl InMemoryLedger {
    pub fn new(config: InMemoryLedgerConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(LedgerState::default()),
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn config(&self) -> &InMemoryLedgerConfig {
        &self.config
    }

    /// Deploy an empty registry at `location`. Redeploying is a no-op.
    pub fn deploy(&self, location: RegistryLocation) -> LedgerResult<()> {
        let mut state = self.write_state()?;
        state.registries.entry(location).or_default();
        tracing::debug!(location = %location, "registry deployed");
        Ok(())
    }

    /// Deploy at the deterministic address this ledger assigns to `network`.
    pub fn deploy_for_network(&self, network: &NetworkId) -> LedgerResult<RegistryLocation> {
        let location = Self::location_for_network(network);
        self.deploy(location)?;
        Ok(location)
    }

    /// Deterministic registry address for a network.
    pub fn location_for_network(network: &NetworkId) -> RegistryLocation {
        let digest = DomainHasher::DEPLOYMENT.hash(network.as_str().as_bytes());
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..]);
        RegistryLocation::from_raw(address)
    }

    pub fn is_deployed(&self, location: &RegistryLocation) -> bool {
        self.inner
            .read()
            .map(|s| s.registries.contains_key(location))
            .unwrap_or(false)
    }

    /// Number of registered fingerprints at `location`.
    pub fn entry_count(&self, location: &RegistryLocation) -> usize {
        self.inner
            .read()
            .ok()
            .and_then(|s| s.registries.get(location).map(|r| r.order.len()))
            .unwrap_or(0)
    }

    /// Make the next write fail with a ledger-level error.
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        self.faults.lock().expect("lock poisoned").next_write = Some(reason.into());
    }

    /// Make every read fail until cleared with `None`.
    pub fn fail_reads(&self, reason: Option<String>) {
        self.faults.lock().expect("lock poisoned").reads = reason;
    }

    /// Export the complete ledger state.
    pub fn to_json(&self) -> LedgerResult<String> {
        let state = self.read_state()?;
        serde_json::to_string_pretty(&*state).map_err(|e| LedgerError::ReadFailed(e.to_string()))
    }

    /// Rebuild a ledger from exported state.
    pub fn from_json(config: InMemoryLedgerConfig, text: &str) -> LedgerResult<Self> {
        let state: LedgerState =
            serde_json::from_str(text).map_err(|e| LedgerError::ReadFailed(e.to_string()))?;
        Ok(Self {
            config,
            inner: RwLock::new(state),
            faults: Mutex::new(Faults::default()),
        })
    }

    fn read_state(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::ReadFailed("ledger read lock poisoned".into()))
    }

    fn write_state(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::WriteFailed("ledger write lock poisoned".into()))
    }

    fn check_reads(&self) -> LedgerResult<()> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| LedgerError::ReadFailed("fault lock poisoned".into()))?;
        match &faults.reads {
            Some(reason) => Err(LedgerError::ReadFailed(reason.clone())),
            None => Ok(()),
        }
    }

    fn take_write_fault(&self) -> LedgerResult<Option<String>> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| LedgerError::WriteFailed("fault lock poisoned".into()))?;
        Ok(faults.next_write.take())
    }

    fn with_registry<T>(
        &self,
        location: &RegistryLocation,
        f: impl FnOnce(&RegistryState) -> T,
    ) -> LedgerResult<T> {
        self.check_reads()?;
        let state = self.read_state()?;
        let registry = state.registries.get(location).ok_or_else(|| {
            LedgerError::ReadFailed(format!("no registry deployed at {location}"))
        })?;
        Ok(f(registry))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(InMemoryLedgerConfig::default())
    }
}

#[async_trait]
impl RegistryBackend for InMemoryLedger {
    async fn store_hash(
        &self,
        location: &RegistryLocation,
        write: SignedWrite,
    ) -> LedgerResult<WriteReceipt> {
        let request = &write.request;
        if write.public_key.identity() != request.from {
            return Err(LedgerError::WriteFailed(
                "signer does not match sender".into(),
            ));
        }
        let payload = request.signing_payload(location);
        write
            .public_key
            .verify(&payload, &write.signature)
            .map_err(|e| LedgerError::WriteFailed(e.to_string()))?;

        if !self.config.confirmation_delay.is_zero() {
            tokio::time::sleep(self.config.confirmation_delay).await;
        }

        if let Some(reason) = self.take_write_fault()? {
            tracing::debug!(fingerprint = %request.fingerprint, %reason, "injected write failure");
            return Err(LedgerError::WriteFailed(reason));
        }

        let mut state = self.write_state()?;
        let LedgerState {
            registries,
            block_number,
            last_timestamp,
        } = &mut *state;
        let registry = registries.get_mut(location).ok_or_else(|| {
            LedgerError::WriteFailed(format!("no registry deployed at {location}"))
        })?;

        if let Some(existing) = registry.entries.get(&request.fingerprint) {
            return match self.config.duplicate_policy {
                DuplicatePolicy::Reject => Err(LedgerError::AlreadyRegistered(
                    request.fingerprint.to_hex(),
                )),
                DuplicatePolicy::Ignore => {
                    *block_number += 1;
                    Ok(WriteReceipt {
                        reference: derive_reference(location, &payload, *block_number),
                        registered_at: existing.registered_at,
                        applied: false,
                    })
                }
            };
        }

        *block_number += 1;
        let registered_at = next_timestamp(*last_timestamp);
        *last_timestamp = Some(registered_at);
        let reference = derive_reference(location, &payload, *block_number);

        registry.entries.insert(
            request.fingerprint,
            LedgerEntry {
                fingerprint: request.fingerprint,
                metadata: request.metadata.clone(),
                registered_at,
                registrant: request.from,
            },
        );
        registry.order.push(request.fingerprint);
        registry.events.push(HashStoredEvent {
            fingerprint: request.fingerprint,
            reference,
            registrant: request.from,
            block_number: *block_number,
        });

        tracing::debug!(
            fingerprint = %request.fingerprint,
            block = *block_number,
            "hash stored"
        );

        Ok(WriteReceipt {
            reference,
            registered_at,
            applied: true,
        })
    }

    async fn hash_exists(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<bool> {
        self.with_registry(location, |r| r.entries.contains_key(fingerprint))
    }

    async fn get_hash_data(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<Option<LedgerEntry>> {
        self.with_registry(location, |r| r.entries.get(fingerprint).cloned())
    }

    async fn get_all_hashes(&self, location: &RegistryLocation) -> LedgerResult<Vec<Fingerprint>> {
        self.with_registry(location, |r| r.order.clone())
    }

    async fn hash_stored_events(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<Vec<HashStoredEvent>> {
        self.with_registry(location, |r| {
            r.events
                .iter()
                .filter(|e| e.fingerprint == *fingerprint)
                .cloned()
                .collect()
        })
    }
}

fn derive_reference(location: &RegistryLocation, payload: &[u8; 32], block: u64) -> WriteReference {
    WriteReference::from_bytes(DomainHasher::WRITE_REFERENCE.hash_parts(&[
        location.as_bytes(),
        payload,
        &block.to_le_bytes(),
    ]))
}

/// Block timestamps have whole-second resolution and never go backwards.
fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let now = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
    match last {
        Some(previous) if previous > now => previous,
        _ => now,
    }
}
