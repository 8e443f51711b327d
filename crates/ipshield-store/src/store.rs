use std::sync::RwLock;

use chrono::{DateTime, Utc};
use ipshield_types::{AssetRecord, AssetStatus, Fingerprint, WriteReference};

use crate::summary::AssetSummary;

/// Terminal outcome of one registration attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    Confirmed {
        write_reference: WriteReference,
        registered_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

impl Settlement {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn into_status(self) -> AssetStatus {
        match self {
            Self::Confirmed {
                write_reference,
                registered_at,
            } => AssetStatus::Confirmed {
                write_reference,
                registered_at,
            },
            Self::Failed { reason } => AssetStatus::Failed { reason },
        }
    }
}

#[derive(Default)]
struct StoreState {
    /// Ledger enumeration order.
    confirmed: Vec<AssetRecord>,
    /// Local attempts, oldest first. At most one per fingerprint.
    in_flight: Vec<AssetRecord>,
}

impl StoreState {
    fn in_flight_index(&self, fingerprint: &Fingerprint) -> Option<usize> {
        self.in_flight
            .iter()
            .position(|r| r.fingerprint == *fingerprint)
    }

    fn confirmed_index(&self, fingerprint: &Fingerprint) -> Option<usize> {
        self.confirmed
            .iter()
            .position(|r| r.fingerprint == *fingerprint)
    }

    /// Insert or replace a confirmed record, keeping its position if present.
    fn put_confirmed(&mut self, record: AssetRecord) {
        match self.confirmed_index(&record.fingerprint) {
            Some(i) => self.confirmed[i] = record,
            None => self.confirmed.push(record),
        }
    }
}

/// Sole owner of the asset records visible to the caller.
///
/// Safe to share between concurrent registrations: every transition takes
/// the store's lock for the duration of a single update.
pub struct AssetRecordStore {
    state: RwLock<StoreState>,
}

impl AssetRecordStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Track a new `Pending` attempt, replacing any earlier attempt (pending
    /// or failed) for the same fingerprint. Non-pending records are ignored.
    pub fn upsert_pending(&self, record: AssetRecord) {
        if !record.is_pending() {
            tracing::warn!(
                fingerprint = %record.fingerprint,
                status = %record.status,
                "ignoring non-pending record"
            );
            return;
        }
        let mut state = self.state.write().expect("lock poisoned");
        match state.in_flight_index(&record.fingerprint) {
            Some(i) => state.in_flight[i] = record,
            None => state.in_flight.push(record),
        }
    }

    /// Apply the terminal outcome of an attempt.
    ///
    /// A `Pending` attempt moves to the confirmed set or becomes `Failed`.
    /// A confirmation for a fingerprint that is already confirmed replaces
    /// the entry (last confirmation wins). Anything else, including a
    /// fingerprint a refresh has already superseded, is a no-op.
    ///
    /// Returns the settled record, or `None` when nothing changed.
    pub fn settle(&self, fingerprint: &Fingerprint, outcome: Settlement) -> Option<AssetRecord> {
        let mut state = self.state.write().expect("lock poisoned");

        if let Some(i) = state.in_flight_index(fingerprint) {
            if !state.in_flight[i].is_pending() {
                return None;
            }
            return Some(match outcome {
                Settlement::Confirmed { .. } => {
                    let mut record = state.in_flight.remove(i);
                    record.status = outcome.into_status();
                    state.put_confirmed(record.clone());
                    record
                }
                Settlement::Failed { .. } => {
                    let record = &mut state.in_flight[i];
                    record.status = outcome.into_status();
                    record.clone()
                }
            });
        }

        match (state.confirmed_index(fingerprint), outcome) {
            (Some(i), outcome @ Settlement::Confirmed { .. }) => {
                let record = &mut state.confirmed[i];
                record.status = outcome.into_status();
                Some(record.clone())
            }
            _ => {
                tracing::debug!(fingerprint = %fingerprint, "settle for untracked fingerprint ignored");
                None
            }
        }
    }

    /// Replace the confirmed set with the ledger's current content.
    ///
    /// In-flight attempts whose fingerprint the ledger now lists are dropped;
    /// the ledger's record supersedes them. Non-confirmed input is skipped.
    pub fn replace_confirmed_set(&self, records: impl IntoIterator<Item = AssetRecord>) {
        let confirmed: Vec<AssetRecord> = records.into_iter().filter(AssetRecord::is_confirmed).collect();
        let mut state = self.state.write().expect("lock poisoned");
        state
            .in_flight
            .retain(|r| !confirmed.iter().any(|c| c.fingerprint == r.fingerprint));
        state.confirmed = confirmed;
    }

    /// Overwrite a tracked fingerprint with a record read back from the
    /// ledger. Any local attempt for it is dropped. Untracked fingerprints
    /// are left alone; only a full refresh adds records.
    ///
    /// Returns `true` if the store changed.
    pub fn reconcile(&self, record: AssetRecord) -> bool {
        if !record.is_confirmed() {
            return false;
        }
        let mut state = self.state.write().expect("lock poisoned");
        let attempt = state.in_flight_index(&record.fingerprint);
        if attempt.is_none() && state.confirmed_index(&record.fingerprint).is_none() {
            return false;
        }
        if let Some(i) = attempt {
            state.in_flight.remove(i);
        }
        state.put_confirmed(record);
        true
    }

    /// The caller-visible record for a fingerprint. A confirmed record takes
    /// precedence over a local attempt.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<AssetRecord> {
        let state = self.state.read().expect("lock poisoned");
        state
            .confirmed_index(fingerprint)
            .map(|i| state.confirmed[i].clone())
            .or_else(|| {
                state
                    .in_flight_index(fingerprint)
                    .map(|i| state.in_flight[i].clone())
            })
    }

    /// Confirmed records in ledger order, then in-flight attempts.
    pub fn records(&self) -> Vec<AssetRecord> {
        let state = self.state.read().expect("lock poisoned");
        state
            .confirmed
            .iter()
            .chain(state.in_flight.iter())
            .cloned()
            .collect()
    }

    pub fn confirmed(&self) -> Vec<AssetRecord> {
        self.state.read().expect("lock poisoned").confirmed.clone()
    }

    pub fn in_flight(&self) -> Vec<AssetRecord> {
        self.state.read().expect("lock poisoned").in_flight.clone()
    }

    pub fn len(&self) -> usize {
        let state = self.state.read().expect("lock poisoned");
        state.confirmed.len() + state.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        *self.state.write().expect("lock poisoned") = StoreState::default();
    }

    pub fn summary(&self) -> AssetSummary {
        let state = self.state.read().expect("lock poisoned");
        AssetSummary::from_records(state.confirmed.iter().chain(state.in_flight.iter()))
    }
}

impl Default for AssetRecordStore {
    fn default() -> Self {
        Self::new()
    }
}
