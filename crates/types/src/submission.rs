//! Outcomes reported by intake and replay

use serde::{Deserialize, Serialize};

/// Why an accepted submission ended up in the buffer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BufferReason {
    /// Cached state said offline, no delivery was attempted
    Offline,
    /// Delivery was attempted and the downloader could not be reached
    DeliveryFailed,
}

/// Result of a well-formed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// Downloader acknowledged the submission
    Delivered,
    /// Submission was stored for replay; `key` is the package id or container filename
    Buffered { reason: BufferReason, key: String },
}

impl Accepted {
    pub fn is_buffered(&self) -> bool {
        matches!(self, Accepted::Buffered { .. })
    }

    /// Short status text used by the HTTP layer
    pub fn status_text(&self) -> &'static str {
        match self {
            Accepted::Delivered => "delivered",
            Accepted::Buffered { .. } => "buffered",
        }
    }
}

/// Per-pass delivery counts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayReport {
    pub delivered_packages: u64,
    pub delivered_containers: u64,
    pub failed_packages: u64,
    pub failed_containers: u64,
    /// Buffer size after the pass, including entries added while it ran
    pub remaining: u64,
}

impl ReplayReport {
    pub fn delivered(&self) -> u64 {
        self.delivered_packages + self.delivered_containers
    }

    pub fn failed(&self) -> u64 {
        self.failed_packages + self.failed_containers
    }
}

/// Outcome of a replay trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// A full pass ran
    Completed(ReplayReport),
    /// Buffer was empty, nothing was sent
    NothingToReplay,
    /// Fresh probe said offline, nothing was sent
    Offline,
    /// Another pass is running; this trigger was coalesced
    AlreadyRunning,
}

impl ReplayOutcome {
    pub fn status_text(&self) -> &'static str {
        match self {
            ReplayOutcome::Completed(_) => "replayed",
            ReplayOutcome::NothingToReplay => "empty",
            ReplayOutcome::Offline => "offline",
            ReplayOutcome::AlreadyRunning => "in_progress",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReplayOutcome::Completed(report) => format!(
                "Delivered {} buffered entries, {} failed, {} remaining",
                report.delivered(),
                report.failed(),
                report.remaining
            ),
            ReplayOutcome::NothingToReplay => "Buffer is empty".to_string(),
            ReplayOutcome::Offline => "JDownloader is offline".to_string(),
            ReplayOutcome::AlreadyRunning => "Replay already in progress".to_string(),
        }
    }
}
