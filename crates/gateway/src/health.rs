//! Downloader connectivity monitoring

use crate::traits::DeliveryGateway;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Change in cached connectivity caused by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline,
    Unchanged,
}

/// Cached connectivity state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
    pub online: bool,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Keeps a cached online/offline view of the downloader so request paths
/// never wait on a probe. Starts offline until the first probe succeeds.
pub struct ConnectivityMonitor {
    gateway: Arc<dyn DeliveryGateway>,
    probe_timeout: Duration,
    state: RwLock<ConnectivitySnapshot>,
}

impl ConnectivityMonitor {
    /// Create a new monitor for `gateway`
    pub fn new(gateway: Arc<dyn DeliveryGateway>, probe_timeout: Duration) -> Self {
        Self {
            gateway,
            probe_timeout,
            state: RwLock::new(ConnectivitySnapshot {
                online: false,
                last_probe_at: None,
                last_change_at: None,
                consecutive_failures: 0,
            }),
        }
    }

    /// Probe the downloader and update the cache
    pub async fn probe(&self) -> Transition {
        let online = self.probe_uncached().await;
        self.record(online).await
    }

    /// Probe the downloader under the deadline without touching the cache
    pub async fn probe_uncached(&self) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.gateway.probe_online()).await {
            Ok(online) => online,
            Err(_) => {
                tracing::debug!(gateway = %self.gateway.name(), "Connectivity probe timed out");
                false
            }
        }
    }

    /// Feed a probe result into the cache
    pub async fn record(&self, online: bool) -> Transition {
        let now = Utc::now();
        let mut state = self.state.write().await;

        state.last_probe_at = Some(now);
        if online {
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        }

        let transition = match (state.online, online) {
            (false, true) => Transition::CameOnline,
            (true, false) => Transition::WentOffline,
            _ => Transition::Unchanged,
        };

        if transition != Transition::Unchanged {
            state.online = online;
            state.last_change_at = Some(now);
        }

        match transition {
            Transition::CameOnline => {
                tracing::info!(gateway = %self.gateway.name(), "JDownloader came online")
            }
            Transition::WentOffline => {
                tracing::warn!(gateway = %self.gateway.name(), "JDownloader went offline")
            }
            Transition::Unchanged => {}
        }

        transition
    }

    /// Cached connectivity, no network I/O
    pub async fn is_online(&self) -> bool {
        self.state.read().await.online
    }

    pub async fn snapshot(&self) -> ConnectivitySnapshot {
        self.state.read().await.clone()
    }

    /// Gateway this monitor probes
    pub fn gateway(&self) -> &Arc<dyn DeliveryGateway> {
        &self.gateway
    }
}
