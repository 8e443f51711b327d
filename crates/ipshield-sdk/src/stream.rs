use ipshield_types::{AssetRecord, Fingerprint};
use tokio::sync::mpsc;

use crate::error::{RegistryError, RegistryResult};

/// Progress of one file registration: the `Pending` record, then the
/// terminal one.
///
/// Dropping the stream does not cancel the write. It still settles, and the
/// store still reflects the outcome.
pub struct RegistrationStream {
    fingerprint: Fingerprint,
    rx: mpsc::Receiver<RegistryResult<AssetRecord>>,
}

impl RegistrationStream {
    pub(crate) fn new(
        fingerprint: Fingerprint,
        rx: mpsc::Receiver<RegistryResult<AssetRecord>>,
    ) -> Self {
        Self { fingerprint, rx }
    }

    /// Fingerprint of the file being registered.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Next update, or `None` once the registration has finished.
    pub async fn next(&mut self) -> Option<RegistryResult<AssetRecord>> {
        self.rx.recv().await
    }

    /// Wait for the terminal record, skipping intermediate updates.
    pub async fn finish(mut self) -> RegistryResult<AssetRecord> {
        let mut last = None;
        while let Some(update) = self.rx.recv().await {
            last = Some(update?);
        }
        last.filter(|record| record.status.is_terminal())
            .ok_or_else(|| RegistryError::Internal("registration ended without a terminal record".into()))
    }
}
