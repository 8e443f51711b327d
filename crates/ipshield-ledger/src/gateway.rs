use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ipshield_types::{AssetMetadata, Fingerprint, Identity, NetworkId, RegistryLocation, WriteReference};
use tokio::sync::{watch, Mutex};

use crate::backend::{LedgerEntry, RegistryBackend, SignedWrite, WriteReceipt, WriteRequest};
use crate::deployment::DeploymentDescriptor;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::IdentityProvider;

/// Typed access to the registry, as consumed by the asset registry.
///
/// Writes block until the ledger confirms or rejects. Reads are side-effect
/// free. `read_all` is proportional to everything ever registered, so callers
/// should use it sparingly.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Establish the caller's signing identity.
    async fn connect(&self) -> LedgerResult<Identity>;

    /// Registry location for a network.
    async fn resolve_registry_location(&self, network: &NetworkId)
        -> LedgerResult<RegistryLocation>;

    /// The network the session is currently attached to.
    async fn network(&self) -> LedgerResult<NetworkId>;

    async fn submit_write(
        &self,
        fingerprint: &Fingerprint,
        metadata: &AssetMetadata,
    ) -> LedgerResult<WriteReceipt>;

    async fn read_existence(&self, fingerprint: &Fingerprint) -> LedgerResult<bool>;

    async fn read_record(&self, fingerprint: &Fingerprint) -> LedgerResult<Option<LedgerEntry>>;

    async fn read_all(&self) -> LedgerResult<Vec<Fingerprint>>;

    /// Reference of the write that first registered `fingerprint`.
    async fn find_write_reference(
        &self,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<Option<WriteReference>>;
}

/// An explicitly constructed ledger session.
///
/// Combines a signing provider, a registry backend and the deployment
/// descriptor. The session caches the connected identity and the resolved
/// registry location; both are dropped whenever the provider reports a
/// network switch, and re-established lazily on the next operation.
pub struct LedgerSession {
    provider: Arc<dyn IdentityProvider>,
    backend: Arc<dyn RegistryBackend>,
    deployments: DeploymentDescriptor,
    state: Mutex<SessionState>,
    nonce: AtomicU64,
}

struct SessionState {
    network_rx: watch::Receiver<NetworkId>,
    network: NetworkId,
    location: Option<RegistryLocation>,
    identity: Option<Identity>,
}

impl LedgerSession {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn RegistryBackend>,
        deployments: DeploymentDescriptor,
    ) -> Self {
        let mut network_rx = provider.network_changes();
        let network = network_rx.borrow_and_update().clone();
        Self {
            provider,
            backend,
            deployments,
            state: Mutex::new(SessionState {
                network_rx,
                network,
                location: None,
                identity: None,
            }),
            nonce: AtomicU64::new(0),
        }
    }

    pub fn deployments(&self) -> &DeploymentDescriptor {
        &self.deployments
    }

    /// Human-readable name of the current network.
    pub async fn network_name(&self) -> String {
        let mut state = self.state.lock().await;
        Self::observe_network(&mut state);
        state.network.display_name()
    }

    /// The registry location for the current network, resolving it if the
    /// cache is cold.
    pub async fn registry_location(&self) -> LedgerResult<RegistryLocation> {
        let mut state = self.state.lock().await;
        Self::observe_network(&mut state);
        self.location_locked(&mut state)
    }

    /// Drop cached identity and location if the provider switched networks.
    fn observe_network(state: &mut SessionState) {
        // A closed channel means the provider is gone; keep the last network.
        if !state.network_rx.has_changed().unwrap_or(false) {
            return;
        }
        let network = state.network_rx.borrow_and_update().clone();
        if network != state.network {
            tracing::info!(
                from = %state.network,
                to = %network,
                "network changed; invalidating registry location"
            );
            state.network = network;
            state.location = None;
            state.identity = None;
        }
    }

    fn location_locked(&self, state: &mut SessionState) -> LedgerResult<RegistryLocation> {
        if let Some(location) = state.location {
            return Ok(location);
        }
        let location = self.deployments.resolve(&state.network)?;
        tracing::debug!(network = %state.network, location = %location, "registry location resolved");
        state.location = Some(location);
        Ok(location)
    }

    /// Identity and registry location taken from one view of the network.
    async fn write_target(&self) -> LedgerResult<(Identity, RegistryLocation)> {
        loop {
            self.connect().await?;
            let mut state = self.state.lock().await;
            Self::observe_network(&mut state);
            if let Some(identity) = state.identity {
                let location = self.location_locked(&mut state)?;
                return Ok((identity, location));
            }
            // The network switched after connecting; connect on the new one.
        }
    }
}

#[async_trait]
impl LedgerGateway for LedgerSession {
    async fn connect(&self) -> LedgerResult<Identity> {
        // The identity prompt can take a while; the lock is not held across it.
        let network = {
            let mut state = self.state.lock().await;
            Self::observe_network(&mut state);
            self.location_locked(&mut state)?;
            if let Some(identity) = state.identity {
                return Ok(identity);
            }
            state.network.clone()
        };

        let identity = self
            .provider
            .request_identities()
            .await?
            .into_iter()
            .next()
            .ok_or(LedgerError::IdentityUnavailable)?;

        let mut state = self.state.lock().await;
        Self::observe_network(&mut state);
        if state.network == network {
            tracing::info!(identity = %identity, network = %network, "connected");
            state.identity = Some(identity);
        } else {
            tracing::debug!(
                identity = %identity,
                requested_on = %network,
                network = %state.network,
                "network switched during identity request; not caching"
            );
        }
        Ok(identity)
    }

    async fn resolve_registry_location(
        &self,
        network: &NetworkId,
    ) -> LedgerResult<RegistryLocation> {
        self.deployments.resolve(network)
    }

    async fn network(&self) -> LedgerResult<NetworkId> {
        let mut state = self.state.lock().await;
        Self::observe_network(&mut state);
        Ok(state.network.clone())
    }

    async fn submit_write(
        &self,
        fingerprint: &Fingerprint,
        metadata: &AssetMetadata,
    ) -> LedgerResult<WriteReceipt> {
        let (from, location) = self.write_target().await?;
        let request = WriteRequest {
            fingerprint: *fingerprint,
            metadata: metadata.clone(),
            from,
            nonce: self.nonce.fetch_add(1, Ordering::SeqCst),
        };
        let payload = request.signing_payload(&location);
        let (public_key, signature) = self.provider.sign_write(&from, &payload).await?;

        tracing::debug!(fingerprint = %fingerprint, location = %location, "submitting write");
        let receipt = self
            .backend
            .store_hash(
                &location,
                SignedWrite {
                    request,
                    public_key,
                    signature,
                },
            )
            .await?;
        tracing::info!(
            fingerprint = %fingerprint,
            reference = %receipt.reference,
            applied = receipt.applied,
            "write confirmed"
        );
        Ok(receipt)
    }

    async fn read_existence(&self, fingerprint: &Fingerprint) -> LedgerResult<bool> {
        let location = self.registry_location().await?;
        self.backend.hash_exists(&location, fingerprint).await
    }

    async fn read_record(&self, fingerprint: &Fingerprint) -> LedgerResult<Option<LedgerEntry>> {
        let location = self.registry_location().await?;
        self.backend.get_hash_data(&location, fingerprint).await
    }

    async fn read_all(&self) -> LedgerResult<Vec<Fingerprint>> {
        let location = self.registry_location().await?;
        let all = self.backend.get_all_hashes(&location).await?;
        tracing::debug!(count = all.len(), "registry enumerated");
        Ok(all)
    }

    async fn find_write_reference(
        &self,
        fingerprint: &Fingerprint,
    ) -> LedgerResult<Option<WriteReference>> {
        let location = self.registry_location().await?;
        let events = self.backend.hash_stored_events(&location, fingerprint).await?;
        Ok(events.first().map(|e| e.reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalKeyring;
    use crate::memory::InMemoryLedger;
    use ipshield_crypto::{Signature, VerifyingKey};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Fixture {
        keyring: Arc<LocalKeyring>,
        ledger: Arc<InMemoryLedger>,
        session: LedgerSession,
    }

    fn fixture(keyring: LocalKeyring) -> Fixture {
        let keyring = Arc::new(keyring);
        let ledger = Arc::new(InMemoryLedger::default());
        let local = ledger.deploy_for_network(&NetworkId::local()).unwrap();
        let sepolia = ledger
            .deploy_for_network(&NetworkId::new("11155111"))
            .unwrap();
        let deployments = DeploymentDescriptor::new()
            .with_deployment(NetworkId::local(), local)
            .with_deployment(NetworkId::new("11155111"), sepolia);
        let session = LedgerSession::new(keyring.clone(), ledger.clone(), deployments);
        Fixture {
            keyring,
            ledger,
            session,
        }
    }

    /// Keyring whose identity prompt stays open until released.
    struct SlowWallet {
        keyring: LocalKeyring,
        prompts: AtomicUsize,
        opened: Notify,
        answer: Notify,
    }

    impl SlowWallet {
        fn new() -> Self {
            Self {
                keyring: LocalKeyring::generate(NetworkId::local()),
                prompts: AtomicUsize::new(0),
                opened: Notify::new(),
                answer: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for SlowWallet {
        async fn request_identities(&self) -> LedgerResult<Vec<Identity>> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.opened.notify_one();
            self.answer.notified().await;
            self.keyring.request_identities().await
        }

        fn network_changes(&self) -> watch::Receiver<NetworkId> {
            self.keyring.network_changes()
        }

        async fn sign_write(
            &self,
            identity: &Identity,
            payload: &[u8],
        ) -> LedgerResult<(VerifyingKey, Signature)> {
            self.keyring.sign_write(identity, payload).await
        }
    }

    fn slow_session(wallet: Arc<SlowWallet>) -> (Arc<InMemoryLedger>, Arc<LedgerSession>) {
        let ledger = Arc::new(InMemoryLedger::default());
        let local = ledger.deploy_for_network(&NetworkId::local()).unwrap();
        let sepolia = ledger
            .deploy_for_network(&NetworkId::new("11155111"))
            .unwrap();
        let deployments = DeploymentDescriptor::new()
            .with_deployment(NetworkId::local(), local)
            .with_deployment(NetworkId::new("11155111"), sepolia);
        let session = LedgerSession::new(wallet, ledger.clone(), deployments);
        (ledger, Arc::new(session))
    }

    fn metadata() -> AssetMetadata {
        AssetMetadata::new("manuscript.pdf", "application/pdf", "1.8 MB")
    }

    #[tokio::test]
    async fn connect_returns_primary_identity() {
        let f = fixture(LocalKeyring::generate(NetworkId::local()));
        let identity = f.session.connect().await.unwrap();
        assert_eq!(Some(identity), f.keyring.primary());
    }

    #[tokio::test]
    async fn connect_without_keys_is_identity_unavailable() {
        let f = fixture(LocalKeyring::new(NetworkId::local()));
        let err = f.session.connect().await.unwrap_err();
        assert_eq!(err, LedgerError::IdentityUnavailable);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn unregistered_network_blocks_every_operation() {
        let f = fixture(LocalKeyring::generate(NetworkId::new("1")));
        let fp = Fingerprint::from_digest([1; 32]);
        let expected = LedgerError::UnregisteredNetwork {
            network: "1".into(),
        };
        assert_eq!(f.session.connect().await.unwrap_err(), expected);
        assert_eq!(f.session.read_all().await.unwrap_err(), expected);
        assert_eq!(f.session.read_existence(&fp).await.unwrap_err(), expected);
        assert_eq!(
            f.session.submit_write(&fp, &metadata()).await.unwrap_err(),
            expected
        );
    }

    #[tokio::test]
    async fn write_then_read_through_session() {
        let f = fixture(LocalKeyring::generate(NetworkId::local()));
        let fp = Fingerprint::from_digest([7; 32]);

        let receipt = f.session.submit_write(&fp, &metadata()).await.unwrap();
        assert!(receipt.applied);
        assert!(f.session.read_existence(&fp).await.unwrap());
        let entry = f.session.read_record(&fp).await.unwrap().unwrap();
        assert_eq!(entry.metadata, metadata());
        assert_eq!(f.session.read_all().await.unwrap(), vec![fp]);
        assert_eq!(
            f.session.find_write_reference(&fp).await.unwrap(),
            Some(receipt.reference)
        );
    }

    #[tokio::test]
    async fn declined_signature_is_write_rejected() {
        let f = fixture(LocalKeyring::generate(NetworkId::local()));
        f.keyring.set_declining(true);
        let fp = Fingerprint::from_digest([7; 32]);
        let err = f.session.submit_write(&fp, &metadata()).await.unwrap_err();
        assert!(matches!(err, LedgerError::WriteRejected(_)));
        assert!(!f.session.read_existence(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn network_switch_reresolves_location() {
        let f = fixture(LocalKeyring::generate(NetworkId::local()));
        let fp = Fingerprint::from_digest([3; 32]);
        f.session.submit_write(&fp, &metadata()).await.unwrap();
        let local = f.session.registry_location().await.unwrap();

        f.keyring.switch_network(NetworkId::new("11155111"));
        let sepolia = f.session.registry_location().await.unwrap();
        assert_ne!(local, sepolia);
        assert_eq!(f.session.network_name().await, "Sepolia Testnet");
        // The Sepolia registry is separate and empty.
        assert!(!f.session.read_existence(&fp).await.unwrap());
        assert_eq!(f.ledger.entry_count(&local), 1);
    }

    #[tokio::test]
    async fn switching_to_unknown_network_is_fatal_until_switched_back() {
        let f = fixture(LocalKeyring::generate(NetworkId::local()));
        f.session.connect().await.unwrap();

        f.keyring.switch_network(NetworkId::new("42"));
        let err = f.session.read_all().await.unwrap_err();
        assert!(err.is_fatal());

        f.keyring.switch_network(NetworkId::local());
        assert!(f.session.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_uses_descriptor_directly() {
        let f = fixture(LocalKeyring::generate(NetworkId::local()));
        let loc = f
            .session
            .resolve_registry_location(&NetworkId::new("11155111"))
            .await
            .unwrap();
        assert_eq!(
            loc,
            InMemoryLedger::location_for_network(&NetworkId::new("11155111"))
        );
        assert_eq!(f.session.network().await.unwrap(), NetworkId::local());
    }

    #[tokio::test]
    async fn reads_proceed_while_identity_prompt_is_open() {
        let wallet = Arc::new(SlowWallet::new());
        let (_ledger, session) = slow_session(wallet.clone());
        let fp = Fingerprint::from_digest([5; 32]);

        let connecting = tokio::spawn({
            let session = session.clone();
            async move { session.connect().await }
        });
        wallet.opened.notified().await;

        let read = tokio::time::timeout(Duration::from_secs(1), async {
            let exists = session.read_existence(&fp).await?;
            let all = session.read_all().await?;
            let network = session.network().await?;
            LedgerResult::Ok((exists, all, network))
        })
        .await
        .expect("reads waited on the identity prompt")
        .unwrap();
        assert_eq!(read, (false, vec![], NetworkId::local()));
        session.registry_location().await.unwrap();

        wallet.answer.notify_one();
        let identity = connecting.await.unwrap().unwrap();
        assert_eq!(Some(identity), wallet.keyring.primary());
        // Cached: a second connect does not prompt again.
        session.connect().await.unwrap();
        assert_eq!(wallet.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn identity_answered_after_network_switch_is_not_cached() {
        let wallet = Arc::new(SlowWallet::new());
        let (_ledger, session) = slow_session(wallet.clone());

        let connecting = tokio::spawn({
            let session = session.clone();
            async move { session.connect().await }
        });
        wallet.opened.notified().await;
        wallet.keyring.switch_network(NetworkId::new("11155111"));
        wallet.answer.notify_one();
        connecting.await.unwrap().unwrap();

        let again = tokio::spawn({
            let session = session.clone();
            async move { session.connect().await }
        });
        wallet.opened.notified().await;
        wallet.answer.notify_one();
        again.await.unwrap().unwrap();
        assert_eq!(wallet.prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn write_lands_on_registry_of_the_connected_network() {
        let wallet = Arc::new(SlowWallet::new());
        let (ledger, session) = slow_session(wallet.clone());
        let fp = Fingerprint::from_digest([6; 32]);

        let writing = tokio::spawn({
            let session = session.clone();
            async move { session.submit_write(&fp, &metadata()).await }
        });
        // Switch while the first prompt is open, then answer both prompts.
        wallet.opened.notified().await;
        wallet.keyring.switch_network(NetworkId::new("11155111"));
        wallet.answer.notify_one();
        wallet.opened.notified().await;
        wallet.answer.notify_one();
        writing.await.unwrap().unwrap();

        let sepolia = InMemoryLedger::location_for_network(&NetworkId::new("11155111"));
        let local = InMemoryLedger::location_for_network(&NetworkId::local());
        assert_eq!(ledger.entry_count(&sepolia), 1);
        assert_eq!(ledger.entry_count(&local), 0);
        assert_eq!(wallet.prompts.load(Ordering::SeqCst), 2);
    }
}
