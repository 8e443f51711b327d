use std::collections::BTreeMap;
use std::fmt;

use ipshield_types::{AssetKind, AssetRecord, AssetStatus};
use serde::Serialize;

/// Dashboard counts over the records in a store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AssetSummary {
    pub total: usize,
    pub confirmed: usize,
    pub pending: usize,
    pub failed: usize,
    pub by_kind: BTreeMap<AssetKind, usize>,
}

impl AssetSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AssetRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            match record.status {
                AssetStatus::Pending { .. } => summary.pending += 1,
                AssetStatus::Confirmed { .. } => summary.confirmed += 1,
                AssetStatus::Failed { .. } => summary.failed += 1,
            }
            *summary.by_kind.entry(record.kind()).or_default() += 1;
        }
        summary
    }

    pub fn count(&self, kind: AssetKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for AssetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} confirmed, {} pending, {} failed",
            self.total, self.confirmed, self.pending, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipshield_types::{AssetMetadata, Fingerprint};

    fn record(n: u8, media_type: &str) -> AssetRecord {
        AssetRecord::pending(
            Fingerprint::from_digest([n; 32]),
            AssetMetadata::new("file", media_type, "1.00 MB"),
        )
    }

    #[test]
    fn counts_kinds() {
        let records = vec![
            record(1, "image/png"),
            record(2, "image/jpeg"),
            record(3, "audio/mp3"),
            record(4, "application/pdf"),
            record(5, "application/zip"),
        ];
        let summary = AssetSummary::from_records(&records);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.pending, 5);
        assert_eq!(summary.count(AssetKind::Image), 2);
        assert_eq!(summary.count(AssetKind::Audio), 1);
        assert_eq!(summary.count(AssetKind::Document), 1);
        assert_eq!(summary.count(AssetKind::Other), 1);
        assert_eq!(summary.count(AssetKind::Video), 0);
    }

    #[test]
    fn empty_summary() {
        let summary = AssetSummary::from_records(std::iter::empty());
        assert_eq!(summary, AssetSummary::default());
        assert_eq!(summary.to_string(), "0 total, 0 confirmed, 0 pending, 0 failed");
    }

    #[test]
    fn serializes_kind_keys() {
        let summary = AssetSummary::from_records(&[record(1, "video/mp4")]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_kind"]["video"], 1);
    }
}
