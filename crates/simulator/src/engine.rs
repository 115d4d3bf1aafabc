//! Simulated gateway implementation

use async_trait::async_trait;
use gateway::DeliveryGateway;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use types::{GatewayError, GatewayResult};

const GATEWAY_NAME: &str = "simulated";

/// A delivery the simulated downloader accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Links {
        links: Vec<String>,
        name: Option<String>,
        password: Option<String>,
    },
    Container {
        filename: String,
        size: usize,
    },
}

#[derive(Debug, Default)]
struct Rules {
    rejected_link_fragments: Vec<String>,
    rejected_containers: Vec<String>,
    latency: Option<Duration>,
}

/// Deterministic in-memory downloader
#[derive(Debug)]
pub struct SimulatedGateway {
    online: AtomicBool,
    probes: AtomicU64,
    rules: Mutex<Rules>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl SimulatedGateway {
    /// Create a new simulated gateway
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            probes: AtomicU64::new(0),
            rules: Mutex::new(Rules::default()),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        tracing::debug!(online, "Simulated downloader connectivity changed");
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Reject any link package containing a link with `fragment` in it
    pub async fn reject_links_containing(&self, fragment: impl Into<String>) {
        self.rules.lock().await.rejected_link_fragments.push(fragment.into());
    }

    /// Reject the container with this exact filename
    pub async fn reject_container(&self, filename: impl Into<String>) {
        self.rules.lock().await.rejected_containers.push(filename.into());
    }

    /// Drop all rejection rules
    pub async fn clear_rules(&self) {
        let mut rules = self.rules.lock().await;
        rules.rejected_link_fragments.clear();
        rules.rejected_containers.clear();
    }

    /// Delay every call by `latency`
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.rules.lock().await.latency = latency;
    }

    /// Accepted deliveries in acceptance order
    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    /// Every accepted link, flattened in acceptance order
    pub async fn delivered_links(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Links { links, .. } => Some(links.clone()),
                Delivery::Container { .. } => None,
            })
            .flatten()
            .collect()
    }

    pub async fn delivered_containers(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Container { filename, .. } => Some(filename.clone()),
                Delivery::Links { .. } => None,
            })
            .collect()
    }

    /// Number of probes received so far
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.rules.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn ensure_online(&self) -> GatewayResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(GatewayError::ConnectionFailed {
                target: GATEWAY_NAME.to_string(),
                message: "simulated downloader is offline".to_string(),
            })
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl DeliveryGateway for SimulatedGateway {
    async fn probe_online(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.is_online()
    }

    async fn deliver_links(
        &self,
        links: &[String],
        name: Option<&str>,
        password: Option<&str>,
    ) -> GatewayResult<()> {
        self.simulate_latency().await;
        self.ensure_online()?;

        let rejected = {
            let rules = self.rules.lock().await;
            rules
                .rejected_link_fragments
                .iter()
                .find(|fragment| links.iter().any(|link| link.contains(fragment.as_str())))
                .cloned()
        };
        if let Some(fragment) = rejected {
            return Err(GatewayError::Rejected {
                target: GATEWAY_NAME.to_string(),
                reason: format!("link matches rejection rule '{}'", fragment),
            });
        }

        self.deliveries.lock().await.push(Delivery::Links {
            links: links.to_vec(),
            name: name.map(str::to_string),
            password: password.map(str::to_string),
        });
        Ok(())
    }

    async fn deliver_container(&self, filename: &str, payload: &[u8]) -> GatewayResult<()> {
        self.simulate_latency().await;
        self.ensure_online()?;

        let rejected = self
            .rules
            .lock()
            .await
            .rejected_containers
            .iter()
            .any(|f| f == filename);
        if rejected {
            return Err(GatewayError::Rejected {
                target: GATEWAY_NAME.to_string(),
                reason: format!("container '{}' rejected", filename),
            });
        }

        self.deliveries.lock().await.push(Delivery::Container {
            filename: filename.to_string(),
            size: payload.len(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        GATEWAY_NAME
    }
}
