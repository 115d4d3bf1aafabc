//! Delivery gateway traits and interfaces

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use types::{GatewayError, GatewayResult};

/// Anything that can hand submissions to a downloader
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Cheap reachability check; never errors, failures read as offline
    async fn probe_online(&self) -> bool;

    /// Deliver one link package
    async fn deliver_links(
        &self,
        links: &[String],
        name: Option<&str>,
        password: Option<&str>,
    ) -> GatewayResult<()>;

    /// Deliver one container file
    async fn deliver_container(&self, filename: &str, payload: &[u8]) -> GatewayResult<()>;

    /// Gateway name used in logs and errors
    fn name(&self) -> &str;
}

/// Bound a gateway call by `deadline`. An elapsed deadline is reported as
/// `ConnectionTimeout`, which classifies the same as a connection failure.
pub async fn with_deadline<T, F>(target: &str, deadline: Duration, call: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::ConnectionTimeout {
            target: target.to_string(),
        }),
    }
}
