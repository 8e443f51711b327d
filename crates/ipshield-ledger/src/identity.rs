use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use ipshield_crypto::{Signature, SigningKey, VerifyingKey};
use ipshield_types::{Identity, NetworkId};
use tokio::sync::watch;

use crate::error::{LedgerError, LedgerResult};

/// External signing capability (a wallet, in ledger terms).
///
/// The provider owns the caller's keys and the network it is attached to.
/// Network switches are published on the [`network_changes`](Self::network_changes)
/// channel; sessions watch it to invalidate cached deployment state.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identities the caller has authorized, primary first. An empty list
    /// means no signing capability.
    async fn request_identities(&self) -> LedgerResult<Vec<Identity>>;

    /// The active network, updated whenever the provider switches.
    fn network_changes(&self) -> watch::Receiver<NetworkId>;

    fn current_network(&self) -> NetworkId {
        self.network_changes().borrow().clone()
    }

    /// Ask the holder of `identity` to sign a write payload.
    ///
    /// Declining yields [`LedgerError::WriteRejected`].
    async fn sign_write(
        &self,
        identity: &Identity,
        payload: &[u8],
    ) -> LedgerResult<(VerifyingKey, Signature)>;
}

/// In-process keyring implementing [`IdentityProvider`].
///
/// Holds Ed25519 keys, the active network, and a switch that makes it
/// decline every signing prompt (the equivalent of a user pressing
/// "reject" in a wallet).
pub struct LocalKeyring {
    keys: RwLock<Vec<SigningKey>>,
    network: watch::Sender<NetworkId>,
    declining: AtomicBool,
}

impl LocalKeyring {
    /// An empty keyring attached to `network`. It has no signing capability
    /// until a key is added.
    pub fn new(network: NetworkId) -> Self {
        let (network, _) = watch::channel(network);
        Self {
            keys: RwLock::new(Vec::new()),
            network,
            declining: AtomicBool::new(false),
        }
    }

    /// A keyring holding one freshly generated key.
    pub fn generate(network: NetworkId) -> Self {
        Self::new(network).with_key(SigningKey::generate())
    }

    pub fn with_key(self, key: SigningKey) -> Self {
        self.add_key(key);
        self
    }

    pub fn add_key(&self, key: SigningKey) {
        self.keys.write().expect("lock poisoned").push(key);
    }

    /// Primary identity, if any key is held.
    pub fn primary(&self) -> Option<Identity> {
        self.keys
            .read()
            .expect("lock poisoned")
            .first()
            .map(SigningKey::identity)
    }

    /// Switch the active network and notify watchers.
    pub fn switch_network(&self, network: NetworkId) {
        tracing::info!(network = %network, "signing provider switched network");
        self.network.send_replace(network);
    }

    /// When set, every signing prompt is declined.
    pub fn set_declining(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for LocalKeyring {
    async fn request_identities(&self) -> LedgerResult<Vec<Identity>> {
        let keys = self
            .keys
            .read()
            .map_err(|_| LedgerError::IdentityUnavailable)?;
        Ok(keys.iter().map(SigningKey::identity).collect())
    }

    fn network_changes(&self) -> watch::Receiver<NetworkId> {
        self.network.subscribe()
    }

    async fn sign_write(
        &self,
        identity: &Identity,
        payload: &[u8],
    ) -> LedgerResult<(VerifyingKey, Signature)> {
        if self.declining.load(Ordering::SeqCst) {
            return Err(LedgerError::WriteRejected(
                "user declined the signing request".into(),
            ));
        }
        let keys = self
            .keys
            .read()
            .map_err(|_| LedgerError::IdentityUnavailable)?;
        let key = keys
            .iter()
            .find(|k| k.identity() == *identity)
            .ok_or(LedgerError::IdentityUnavailable)?;
        Ok((key.verifying_key(), key.sign(payload)))
    }
}
