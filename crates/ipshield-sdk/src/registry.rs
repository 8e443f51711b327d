use std::path::Path;
use std::sync::Arc;

use ipshield_crypto::ContentHasher;
use ipshield_ledger::{LedgerError, LedgerGateway};
use ipshield_store::{AssetRecordStore, AssetSummary, Settlement};
use ipshield_types::{AssetMetadata, AssetRecord, Fingerprint, Identity};
use tokio::sync::mpsc;

use crate::error::{RegistryError, RegistryResult};
use crate::stream::RegistrationStream;
use crate::verification::Verification;

/// Registers, verifies, and lists protected content.
///
/// Cloning is cheap; clones share the ledger session and the record store.
#[derive(Clone)]
pub struct AssetRegistry {
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<AssetRecordStore>,
    hasher: ContentHasher,
}

impl AssetRegistry {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self::with_store(gateway, Arc::new(AssetRecordStore::new()))
    }

    pub fn with_store(gateway: Arc<dyn LedgerGateway>, store: Arc<AssetRecordStore>) -> Self {
        Self {
            gateway,
            store,
            hasher: ContentHasher::new(),
        }
    }

    pub fn with_hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn LedgerGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &AssetRecordStore {
        &self.store
    }

    // ---- Session ----

    /// Connect the signing identity and load the confirmed set.
    pub async fn connect(&self) -> RegistryResult<Identity> {
        let identity = self.gateway.connect().await?;
        self.list_all().await?;
        Ok(identity)
    }

    // ---- Content operations ----

    pub fn fingerprint(&self, bytes: &[u8]) -> Fingerprint {
        self.hasher.hash(bytes)
    }

    /// Fingerprint a file without loading it into memory.
    pub async fn fingerprint_file(&self, path: impl AsRef<Path>) -> RegistryResult<Fingerprint> {
        Ok(self.hasher.hash_file(path).await?)
    }

    // ---- Registration ----

    /// Register a fingerprint and wait for the ledger to settle the write.
    ///
    /// A `Pending` record is visible in the store for the duration of the
    /// write. Per-attempt failures (declined signature, failed or rejected
    /// write) come back as a `Failed` record, not as `Err`. `Err` means the
    /// session itself is unusable.
    pub async fn register(
        &self,
        fingerprint: Fingerprint,
        metadata: AssetMetadata,
    ) -> RegistryResult<AssetRecord> {
        let pending = self.begin(fingerprint, metadata).await?;
        self.complete(pending).await
    }

    /// Register a fingerprint in the background. The stream yields the
    /// `Pending` record, then the terminal one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, fingerprint: Fingerprint, metadata: AssetMetadata) -> RegistrationStream {
        let (tx, rx) = mpsc::channel(2);
        let registry = self.clone();
        tokio::spawn(async move {
            let pending = match registry.begin(fingerprint, metadata).await {
                Ok(pending) => pending,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            // Send failures only mean the caller stopped listening.
            let _ = tx.send(Ok(pending.clone())).await;
            let _ = tx.send(registry.complete(pending).await).await;
        });
        RegistrationStream::new(fingerprint, rx)
    }

    /// Fingerprint `bytes` and register them under the given metadata.
    pub fn register_file(
        &self,
        bytes: impl AsRef<[u8]>,
        display_name: impl Into<String>,
        media_type: impl Into<String>,
        size_label: impl Into<String>,
    ) -> RegistrationStream {
        let fingerprint = self.hasher.hash(bytes.as_ref());
        self.submit(
            fingerprint,
            AssetMetadata::new(display_name, media_type, size_label),
        )
    }

    /// Register several fingerprints concurrently. Results are returned in
    /// input order.
    pub async fn register_many(
        &self,
        items: impl IntoIterator<Item = (Fingerprint, AssetMetadata)>,
    ) -> Vec<RegistryResult<AssetRecord>> {
        let handles: Vec<_> = items
            .into_iter()
            .map(|(fingerprint, metadata)| {
                let registry = self.clone();
                tokio::spawn(async move { registry.register(fingerprint, metadata).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(RegistryError::Internal(format!("registration task failed: {e}")))
            }));
        }
        results
    }

    async fn begin(
        &self,
        fingerprint: Fingerprint,
        metadata: AssetMetadata,
    ) -> RegistryResult<AssetRecord> {
        self.gateway.connect().await?;
        let pending = AssetRecord::pending(fingerprint, metadata);
        self.store.upsert_pending(pending.clone());
        tracing::debug!(fingerprint = %fingerprint, "registration pending");
        Ok(pending)
    }

    async fn complete(&self, pending: AssetRecord) -> RegistryResult<AssetRecord> {
        let fingerprint = pending.fingerprint;
        let result = self
            .gateway
            .submit_write(&fingerprint, &pending.metadata)
            .await;
        let outcome = match result {
            Ok(receipt) if receipt.applied => Settlement::Confirmed {
                write_reference: receipt.reference,
                registered_at: receipt.registered_at,
            },
            Ok(receipt) => {
                // The ledger kept its earlier entry. Point the record at the
                // write that actually registered it.
                tracing::info!(
                    fingerprint = %fingerprint,
                    "fingerprint already registered; write was redundant"
                );
                let write_reference = match self.gateway.find_write_reference(&fingerprint).await {
                    Ok(Some(reference)) => reference,
                    Ok(None) => receipt.reference,
                    Err(e) => {
                        tracing::warn!(fingerprint = %fingerprint, error = %e, "original write lookup failed");
                        receipt.reference
                    }
                };
                Settlement::Confirmed {
                    write_reference,
                    registered_at: receipt.registered_at,
                }
            }
            Err(e) if e.is_fatal() => {
                self.settle(pending, Settlement::failed(e.to_string()));
                return Err(e.into());
            }
            Err(e) => Settlement::failed(e.to_string()),
        };

        let record = self.settle(pending, outcome);
        match record.failure_reason() {
            Some(reason) => {
                tracing::warn!(fingerprint = %fingerprint, reason, "registration failed");
            }
            None => {
                if let Err(e) = self.list_all().await {
                    tracing::warn!(error = %e, "refresh after write failed");
                }
            }
        }
        Ok(record)
    }

    /// Settle the attempt in the store. When a refresh has already
    /// superseded it, the outcome is still reported to the caller.
    fn settle(&self, pending: AssetRecord, outcome: Settlement) -> AssetRecord {
        match self.store.settle(&pending.fingerprint, outcome.clone()) {
            Some(record) => record,
            None => AssetRecord {
                status: outcome.into_status(),
                ..pending
            },
        }
    }

    // ---- Verification ----

    /// Look a fingerprint up on the ledger. Never mutates the ledger; a
    /// record already tracked locally is overwritten with the ledger's copy.
    pub async fn verify(&self, fingerprint: &Fingerprint) -> RegistryResult<Verification> {
        if !self.gateway.read_existence(fingerprint).await? {
            tracing::debug!(fingerprint = %fingerprint, "not registered");
            return Ok(Verification::NotFound);
        }
        let (record, registrant) = self.read_confirmed(fingerprint).await?.ok_or_else(|| {
            LedgerError::ReadFailed(format!("{fingerprint} exists but has no record"))
        })?;
        self.store.reconcile(record.clone());
        Ok(Verification::Found { record, registrant })
    }

    /// Verify user-supplied text. Whitespace, a `0x` prefix, and uppercase
    /// digits are accepted. Well-formed hex of the wrong length cannot match
    /// any registration and yields `NotFound`.
    pub async fn verify_fingerprint(&self, input: &str) -> RegistryResult<Verification> {
        let invalid = |e: ipshield_types::TypeError| RegistryError::InvalidFingerprint {
            input: input.to_string(),
            reason: e.to_string(),
        };
        let normalized = Fingerprint::normalize(input).map_err(invalid)?;
        if normalized.len() != Fingerprint::HEX_LEN {
            tracing::debug!(input, "fingerprint has the wrong length");
            return Ok(Verification::NotFound);
        }
        let fingerprint = Fingerprint::from_hex(&normalized).map_err(invalid)?;
        self.verify(&fingerprint).await
    }

    /// Fingerprint `bytes`, then verify.
    pub async fn verify_file(&self, bytes: impl AsRef<[u8]>) -> RegistryResult<Verification> {
        let fingerprint = self.hasher.hash(bytes.as_ref());
        self.verify(&fingerprint).await
    }

    // ---- Listing ----

    /// Every registration on the ledger, in ledger enumeration order.
    ///
    /// Replaces the store's confirmed set. Walks the whole registry, so it
    /// runs once per confirmed write and on connect, not per query.
    pub async fn list_all(&self) -> RegistryResult<Vec<AssetRecord>> {
        let fingerprints = self.gateway.read_all().await?;
        let mut records = Vec::with_capacity(fingerprints.len());
        for fingerprint in &fingerprints {
            let (record, _) = self.read_confirmed(fingerprint).await?.ok_or_else(|| {
                LedgerError::ReadFailed(format!("registry lists {fingerprint} without a record"))
            })?;
            records.push(record);
        }
        self.store.replace_confirmed_set(records.clone());
        tracing::debug!(count = records.len(), "confirmed set replaced");
        Ok(records)
    }

    /// Confirmed records as of the last refresh. No ledger access.
    pub fn list_confirmed(&self) -> Vec<AssetRecord> {
        self.store.confirmed()
    }

    pub fn summary(&self) -> AssetSummary {
        self.store.summary()
    }

    async fn read_confirmed(
        &self,
        fingerprint: &Fingerprint,
    ) -> RegistryResult<Option<(AssetRecord, Identity)>> {
        let Some(entry) = self.gateway.read_record(fingerprint).await? else {
            return Ok(None);
        };
        let reference = self
            .gateway
            .find_write_reference(fingerprint)
            .await?
            .ok_or_else(|| LedgerError::ReadFailed(format!("no write recorded for {fingerprint}")))?;
        let record = AssetRecord::confirmed(
            entry.fingerprint,
            entry.metadata,
            reference,
            entry.registered_at,
        );
        Ok(Some((record, entry.registrant)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use ipshield_ledger::{
        DeploymentDescriptor, DuplicatePolicy, InMemoryLedger, InMemoryLedgerConfig,
        LedgerSession, LocalKeyring,
    };
    use ipshield_types::{AssetKind, NetworkId};

    struct Harness {
        registry: AssetRegistry,
        keyring: Arc<LocalKeyring>,
        ledger: Arc<InMemoryLedger>,
    }

    fn harness_with(policy: DuplicatePolicy, keyring: LocalKeyring) -> Harness {
        let ledger = Arc::new(InMemoryLedger::new(InMemoryLedgerConfig {
            duplicate_policy: policy,
            ..Default::default()
        }));
        let mut deployments = DeploymentDescriptor::new();
        for network in [NetworkId::local(), NetworkId::new(NetworkId::SEPOLIA)] {
            let location = ledger.deploy_for_network(&network).unwrap();
            deployments.insert(network, location);
        }
        let keyring = Arc::new(keyring);
        let session = LedgerSession::new(keyring.clone(), ledger.clone(), deployments);
        Harness {
            registry: AssetRegistry::new(Arc::new(session)),
            keyring,
            ledger,
        }
    }

    fn harness() -> Harness {
        harness_with(
            DuplicatePolicy::Reject,
            LocalKeyring::generate(NetworkId::local()),
        )
    }

    fn fp(n: u8) -> Fingerprint {
        Fingerprint::from_digest([n; 32])
    }

    fn metadata(name: &str) -> AssetMetadata {
        AssetMetadata::new(name, "image/png", "0.50 MB")
    }

    fn demo_metadata() -> AssetMetadata {
        AssetMetadata::new("demo.mp3", "audio/mp3", "4.2 MB")
    }

    #[tokio::test]
    async fn audio_upload_goes_pending_then_confirmed() {
        let h = harness();
        let fingerprint = Fingerprint::from_hex(&format!("aa11{}", "0".repeat(60))).unwrap();
        let mut stream = h.registry.submit(fingerprint, demo_metadata());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.fingerprint, fingerprint);
        assert!(first.is_pending());
        assert_eq!(first.metadata, demo_metadata());

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.is_confirmed());
        let reference = second.write_reference().unwrap();
        assert_ne!(reference.as_bytes(), &[0u8; 32]);
        let registered_at = second.registered_at().unwrap();
        assert_eq!(registered_at.nanosecond(), 0);

        assert!(stream.next().await.is_none());
        assert_eq!(h.registry.list_confirmed(), vec![second]);
    }

    #[tokio::test]
    async fn register_then_verify_round_trips_metadata() {
        let h = harness();
        let record = h.registry.register(fp(1), demo_metadata()).await.unwrap();
        assert!(record.is_confirmed());

        match h.registry.verify(&fp(1)).await.unwrap() {
            Verification::Found {
                record: found,
                registrant,
            } => {
                assert_eq!(found.metadata, demo_metadata());
                assert_eq!(found.write_reference(), record.write_reference());
                assert_eq!(found.registered_at(), record.registered_at());
                assert_eq!(Some(registrant), h.keyring.primary());
            }
            Verification::NotFound => panic!("registered fingerprint not found"),
        }
    }

    #[tokio::test]
    async fn unregistered_fingerprint_is_not_found() {
        let h = harness();
        assert_eq!(h.registry.verify(&fp(9)).await.unwrap(), Verification::NotFound);
        assert!(h.registry.store().is_empty());
    }

    #[tokio::test]
    async fn short_hex_is_not_found() {
        let h = harness();
        let verification = h.registry.verify_fingerprint("deadbeef").await.unwrap();
        assert_eq!(verification, Verification::NotFound);
    }

    #[tokio::test]
    async fn non_hex_input_is_invalid() {
        let h = harness();
        let err = h.registry.verify_fingerprint("0xnothex").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFingerprint { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn verification_normalizes_input() {
        let h = harness();
        h.registry.register(fp(0xab), metadata("a.png")).await.unwrap();
        let input = format!("  0X{}  ", fp(0xab).to_hex().to_uppercase());
        assert!(h.registry.verify_fingerprint(&input).await.unwrap().is_found());
    }

    #[tokio::test]
    async fn verify_file_hashes_content() {
        let h = harness();
        let bytes = b"master recording".to_vec();
        h.registry
            .register_file(&bytes, "take1.wav", "audio/wav", "0.01 MB")
            .finish()
            .await
            .unwrap();

        let verification = h.registry.verify_file(&bytes).await.unwrap();
        assert_eq!(
            verification.record().map(|r| r.fingerprint),
            Some(h.registry.fingerprint(&bytes))
        );
        assert!(!h.registry.verify_file(b"other take").await.unwrap().is_found());
    }

    #[tokio::test]
    async fn rejected_duplicate_converges_to_one_confirmed() {
        let h = harness();
        let first = h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        let second = h.registry.register(fp(1), metadata("b.png")).await.unwrap();

        assert!(first.is_confirmed());
        assert!(second.is_failed());
        assert!(second.failure_reason().unwrap().contains("already registered"));

        let all = h.registry.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].metadata, metadata("a.png"));
    }

    #[tokio::test]
    async fn ignored_duplicate_is_redundant_not_failed() {
        let h = harness_with(
            DuplicatePolicy::Ignore,
            LocalKeyring::generate(NetworkId::local()),
        );
        let first = h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        let second = h.registry.register(fp(1), metadata("a.png")).await.unwrap();

        assert!(second.is_confirmed());
        assert_eq!(second.write_reference(), first.write_reference());
        assert_eq!(second.registered_at(), first.registered_at());
        assert_eq!(h.registry.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicates_converge() {
        for policy in [DuplicatePolicy::Reject, DuplicatePolicy::Ignore] {
            let h = harness_with(policy, LocalKeyring::generate(NetworkId::local()));
            let results = h
                .registry
                .register_many(vec![(fp(5), metadata("a.png")), (fp(5), metadata("a.png"))])
                .await;
            let confirmed = results
                .iter()
                .filter(|r| r.as_ref().unwrap().is_confirmed())
                .count();
            assert!(confirmed >= 1);

            let all = h.registry.list_all().await.unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(h.registry.list_confirmed().len(), 1);
        }
    }

    #[tokio::test]
    async fn declined_signature_settles_failed() {
        let h = harness();
        h.keyring.set_declining(true);
        let record = h.registry.register(fp(2), metadata("a.png")).await.unwrap();

        assert!(record.is_failed());
        assert!(record.failure_reason().unwrap().contains("declined"));
        assert!(h.registry.list_confirmed().is_empty());
        assert!(h.registry.store().get(&fp(2)).unwrap().is_failed());
    }

    #[tokio::test]
    async fn failed_write_leaves_other_records_alone() {
        let h = harness();
        h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        h.ledger.fail_next_write("nonce too low");
        let record = h.registry.register(fp(2), metadata("b.png")).await.unwrap();

        assert!(record.failure_reason().unwrap().contains("nonce too low"));
        let confirmed = h.registry.list_confirmed();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].fingerprint, fp(1));
    }

    #[tokio::test]
    async fn retry_after_failure_starts_fresh() {
        let h = harness();
        h.ledger.fail_next_write("timeout");
        let failed = h.registry.register(fp(3), metadata("a.png")).await.unwrap();
        assert!(failed.is_failed());

        let mut stream = h.registry.submit(fp(3), metadata("a.png"));
        assert!(stream.next().await.unwrap().unwrap().is_pending());
        assert!(stream.finish().await.unwrap().is_confirmed());
        assert!(h.registry.store().in_flight().is_empty());
    }

    #[tokio::test]
    async fn list_all_after_two_registrations() {
        let h = harness();
        h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        h.registry.register(fp(2), metadata("b.png")).await.unwrap();

        let all = h.registry.list_all().await.unwrap();
        let fingerprints: Vec<_> = all.iter().map(|r| r.fingerprint).collect();
        assert_eq!(fingerprints, vec![fp(1), fp(2)]);
        assert!(all.iter().all(AssetRecord::is_confirmed));
    }

    #[tokio::test]
    async fn refresh_replaces_rather_than_merges() {
        let h = harness();
        h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        assert_eq!(h.registry.list_confirmed().len(), 1);

        // The Sepolia registry knows nothing about the local registration.
        h.keyring.switch_network(NetworkId::new(NetworkId::SEPOLIA));
        assert!(h.registry.list_all().await.unwrap().is_empty());
        assert!(h.registry.list_confirmed().is_empty());
    }

    #[tokio::test]
    async fn unregistered_network_is_fatal() {
        let h = harness_with(
            DuplicatePolicy::Reject,
            LocalKeyring::generate(NetworkId::new(NetworkId::MAINNET)),
        );
        let err = h.registry.register(fp(1), metadata("a.png")).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(h.registry.store().is_empty());
        assert!(h.registry.verify(&fp(1)).await.unwrap_err().is_fatal());
        assert!(h.registry.list_all().await.unwrap_err().is_fatal());

        h.keyring.switch_network(NetworkId::local());
        assert!(h.registry.register(fp(1), metadata("a.png")).await.unwrap().is_confirmed());
    }

    #[tokio::test]
    async fn missing_identity_is_fatal() {
        let h = harness_with(DuplicatePolicy::Reject, LocalKeyring::new(NetworkId::local()));
        let err = h.registry.connect().await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Ledger(LedgerError::IdentityUnavailable)
        ));

        let mut stream = h.registry.submit(fp(1), metadata("a.png"));
        assert!(stream.next().await.unwrap().unwrap_err().is_fatal());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn read_failure_is_an_error_not_not_found() {
        let h = harness();
        h.ledger.fail_reads(Some("node unreachable".into()));
        let err = h.registry.verify(&fp(1)).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Ledger(LedgerError::ReadFailed(_))
        ));
    }

    #[tokio::test]
    async fn refresh_failure_does_not_fail_the_write() {
        let h = harness();
        h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        h.ledger.fail_reads(Some("node unreachable".into()));

        let record = h.registry.register(fp(2), metadata("b.png")).await.unwrap();
        assert!(record.is_confirmed());
        // Settlement alone put the record in the confirmed set.
        assert_eq!(h.registry.list_confirmed().len(), 2);
    }

    #[tokio::test]
    async fn connect_loads_confirmed_set() {
        let h = harness();
        h.registry.register(fp(1), metadata("a.png")).await.unwrap();

        let store = Arc::new(AssetRecordStore::new());
        let fresh = AssetRegistry::with_store(h.registry.gateway().clone(), store.clone());
        let identity = fresh.connect().await.unwrap();
        assert_eq!(Some(identity), h.keyring.primary());
        assert_eq!(store.confirmed().len(), 1);
    }

    #[tokio::test]
    async fn verify_reconciles_tracked_records() {
        let h = harness();
        h.registry.register(fp(1), metadata("a.png")).await.unwrap();
        // A rejected duplicate leaves a failed attempt with different metadata.
        h.registry.register(fp(1), metadata("b.png")).await.unwrap();

        h.registry.verify(&fp(1)).await.unwrap();
        let record = h.registry.store().get(&fp(1)).unwrap();
        assert!(record.is_confirmed());
        assert_eq!(record.metadata, metadata("a.png"));
        assert!(h.registry.store().in_flight().is_empty());
    }

    #[tokio::test]
    async fn register_many_runs_independently() {
        let h = harness();
        let items: Vec<_> = (1..=4).map(|n| (fp(n), metadata(&format!("{n}.png")))).collect();
        let results = h.registry.register_many(items).await;

        assert_eq!(results.len(), 4);
        for (n, result) in (1..=4).zip(&results) {
            let record = result.as_ref().unwrap();
            assert_eq!(record.fingerprint, fp(n));
            assert!(record.is_confirmed());
        }
        let summary = h.registry.summary();
        assert_eq!(summary.confirmed, 4);
        assert_eq!(summary.count(AssetKind::Image), 4);
    }

    #[tokio::test]
    async fn fingerprint_file_streams_from_disk() {
        let h = harness();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        assert_eq!(
            h.registry.fingerprint_file(&path).await.unwrap(),
            h.registry.fingerprint(b"%PDF-1.7")
        );
        let err = h.registry.fingerprint_file(dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Hash(_)));
    }

    #[tokio::test]
    async fn verification_serializes_with_result_tag() {
        let h = harness();
        h.registry.register(fp(1), demo_metadata()).await.unwrap();
        let found = serde_json::to_value(h.registry.verify(&fp(1)).await.unwrap()).unwrap();
        assert_eq!(found["result"], "found");
        assert_eq!(found["record"]["status"], "confirmed");
        assert_eq!(found["record"]["metadata"]["display_name"], "demo.mp3");

        let missing = serde_json::to_value(Verification::NotFound).unwrap();
        assert_eq!(missing["result"], "not_found");
    }
}
