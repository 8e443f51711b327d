use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::reference::WriteReference;

/// Caller-supplied descriptive metadata. Opaque to the registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub display_name: String,
    pub media_type: String,
    pub size_label: String,
}

impl AssetMetadata {
    pub fn new(
        display_name: impl Into<String>,
        media_type: impl Into<String>,
        size_label: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            media_type: media_type.into(),
            size_label: size_label.into(),
        }
    }

    pub fn kind(&self) -> AssetKind {
        AssetKind::from_media_type(&self.media_type)
    }
}

/// Lifecycle state of one registration attempt.
///
/// `Pending` carries a provisional client-side timestamp. Once the ledger
/// settles the write, that timestamp is dropped: `Confirmed` carries only the
/// ledger-assigned time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetStatus {
    Pending {
        requested_at: DateTime<Utc>,
    },
    Confirmed {
        write_reference: WriteReference,
        registered_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

impl AssetStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Confirmed { .. } => "confirmed",
            Self::Failed { .. } => "failed",
        }
    }

    /// `Confirmed` and `Failed` end an attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One piece of protected content, keyed by its fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub fingerprint: Fingerprint,
    pub metadata: AssetMetadata,
    #[serde(flatten)]
    pub status: AssetStatus,
}

impl AssetRecord {
    /// A fresh registration attempt, stamped with the local clock.
    pub fn pending(fingerprint: Fingerprint, metadata: AssetMetadata) -> Self {
        Self {
            fingerprint,
            metadata,
            status: AssetStatus::Pending {
                requested_at: Utc::now(),
            },
        }
    }

    /// A record reconstructed from (or confirmed by) the ledger.
    pub fn confirmed(
        fingerprint: Fingerprint,
        metadata: AssetMetadata,
        write_reference: WriteReference,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            metadata,
            status: AssetStatus::Confirmed {
                write_reference,
                registered_at,
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, AssetStatus::Pending { .. })
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, AssetStatus::Confirmed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, AssetStatus::Failed { .. })
    }

    /// Present only once the record is confirmed.
    pub fn write_reference(&self) -> Option<&WriteReference> {
        match &self.status {
            AssetStatus::Confirmed {
                write_reference, ..
            } => Some(write_reference),
            _ => None,
        }
    }

    /// Ledger-assigned registration time.
    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        match &self.status {
            AssetStatus::Confirmed { registered_at, .. } => Some(*registered_at),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            AssetStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.metadata.kind()
    }
}

/// Coarse content category derived from a media type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Audio,
    Video,
    Document,
    Other,
}

impl AssetKind {
    pub fn from_media_type(media_type: &str) -> Self {
        let media_type = media_type.to_ascii_lowercase();
        if media_type.contains("image") {
            Self::Image
        } else if media_type.contains("audio") {
            Self::Audio
        } else if media_type.contains("video") {
            Self::Video
        } else if media_type.contains("pdf") || media_type.contains("document") {
            Self::Document
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render a byte count as the size label shown next to an asset (`"4.20 MB"`).
pub fn size_label(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
