//! Buffered submission types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a buffered link package
pub type PackageId = Uuid;

/// A link submission waiting to be delivered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferedPackage {
    /// Stable identifier for the lifetime of the entry
    pub id: PackageId,
    /// Optional package label
    pub name: Option<String>,
    /// Links in submission order
    pub links: Vec<String>,
    /// Optional extraction password
    pub passwords: Option<String>,
    /// Where the submission came from (CNL source page, dashboard)
    pub source: Option<String>,
    /// When the package was first buffered
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed delivery attempts
    pub attempt_count: u32,
    /// Error reported by the last failed attempt
    pub last_error: Option<String>,
}

/// A container file waiting to be delivered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferedContainer {
    /// Original filename, unique within the buffer
    pub filename: String,
    /// Raw container bytes
    #[serde(skip)]
    pub payload: Vec<u8>,
    /// Payload length in bytes
    pub size: u64,
    /// When the container was buffered
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed delivery attempts
    pub attempt_count: u32,
    /// Error reported by the last failed attempt
    pub last_error: Option<String>,
    /// Insertion sequence; a replacement upload gets a new one
    #[serde(skip)]
    pub seq: i64,
}

/// A new link package as accepted by intake, before it gets an identity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LinkSubmission {
    pub links: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "passwords")]
    pub password: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Connectivity and buffer summary shown on the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemStatus {
    /// Cached downloader connectivity
    pub jd_online: bool,
    /// Buffered packages plus buffered containers
    pub buffer_count: u64,
    /// Time of the most recent connectivity probe
    pub last_probe_at: Option<DateTime<Utc>>,
}

/// Full buffer listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferDetails {
    pub packages: Vec<BufferedPackage>,
    pub dlc_files: Vec<BufferedContainer>,
}

/// Number of entries removed by a clear
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearedCounts {
    pub deleted_packages: u64,
    pub deleted_dlcs: u64,
}

impl BufferedPackage {
    /// Create a freshly buffered package
    pub fn new(submission: LinkSubmission) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: submission.name,
            links: submission.links,
            passwords: submission.password,
            source: submission.source,
            enqueued_at: Utc::now(),
            attempt_count: 0,
            last_error: None,
        }
    }

    /// Label used in logs
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed package")
    }
}

impl BufferedContainer {
    /// Create a freshly buffered container; `seq` is assigned by the store
    pub fn new(filename: String, payload: Vec<u8>) -> Self {
        Self {
            size: payload.len() as u64,
            filename,
            payload,
            enqueued_at: Utc::now(),
            attempt_count: 0,
            last_error: None,
            seq: 0,
        }
    }
}

impl ClearedCounts {
    pub fn total(&self) -> u64 {
        self.deleted_packages + self.deleted_dlcs
    }
}
