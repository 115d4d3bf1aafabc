//! Submission intake: deliver now or buffer for later

use crate::storage::BufferStore;
use gateway::{with_deadline, ConnectivityMonitor};
use std::sync::Arc;
use std::time::Duration;
use types::{
    utils::{normalize_links, sanitize_filename},
    Accepted, BridgeError, BufferReason, BufferedContainer, BufferedPackage, GatewayError,
    LinkSubmission, Result,
};

/// Accepts link packages and container files from every entry point
pub struct Intake {
    store: Arc<dyn BufferStore>,
    monitor: Arc<ConnectivityMonitor>,
    delivery_timeout: Duration,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Intake {
    pub fn new(
        store: Arc<dyn BufferStore>,
        monitor: Arc<ConnectivityMonitor>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            store,
            monitor,
            delivery_timeout,
        }
    }

    /// Submit a link package
    pub async fn submit_links(&self, submission: LinkSubmission) -> Result<Accepted> {
        let links = normalize_links(&submission.links);
        if links.is_empty() {
            return Err(BridgeError::InvalidSubmission("No links provided".to_string()));
        }

        let submission = LinkSubmission {
            links,
            name: non_blank(submission.name),
            password: non_blank(submission.password),
            source: non_blank(submission.source),
        };

        if !self.monitor.is_online().await {
            return self.buffer_package(submission, BufferReason::Offline).await;
        }

        let gateway = self.monitor.gateway();
        let result = with_deadline(
            gateway.name(),
            self.delivery_timeout,
            gateway.deliver_links(
                &submission.links,
                submission.name.as_deref(),
                submission.password.as_deref(),
            ),
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    package = submission.name.as_deref().unwrap_or("-"),
                    links = submission.links.len(),
                    "Links delivered"
                );
                Ok(Accepted::Delivered)
            }
            Err(e) if e.is_unreachable() => {
                self.note_unreachable(&e).await;
                self.buffer_package(submission, BufferReason::DeliveryFailed).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Downloader rejected link package");
                Err(e.into())
            }
        }
    }

    /// Submit a container file
    pub async fn submit_container(&self, filename: &str, payload: Vec<u8>) -> Result<Accepted> {
        let filename = sanitize_filename(filename).ok_or_else(|| {
            BridgeError::InvalidSubmission("Container filename is empty".to_string())
        })?;
        if payload.is_empty() {
            return Err(BridgeError::InvalidSubmission(format!(
                "Container {} is empty",
                filename
            )));
        }

        if !self.monitor.is_online().await {
            return self.buffer_container(filename, payload, BufferReason::Offline).await;
        }

        let gateway = self.monitor.gateway();
        let result = with_deadline(
            gateway.name(),
            self.delivery_timeout,
            gateway.deliver_container(&filename, &payload),
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(filename = %filename, size = payload.len(), "Container delivered");
                Ok(Accepted::Delivered)
            }
            Err(e) if e.is_unreachable() => {
                self.note_unreachable(&e).await;
                self.buffer_container(filename, payload, BufferReason::DeliveryFailed)
                    .await
            }
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Downloader rejected container");
                Err(e.into())
            }
        }
    }

    /// A failed delivery is as good as a failed probe; later submissions
    /// buffer straight away until the next successful probe.
    async fn note_unreachable(&self, error: &GatewayError) {
        tracing::warn!(error = %error, "Delivery failed, buffering submission");
        self.monitor.record(false).await;
    }

    async fn buffer_package(&self, submission: LinkSubmission, reason: BufferReason) -> Result<Accepted> {
        let package = BufferedPackage::new(submission);
        self.store.enqueue_package(&package).await?;

        tracing::info!(
            package_id = %package.id,
            package = package.label(),
            links = package.links.len(),
            reason = ?reason,
            "Link package buffered"
        );
        Ok(Accepted::Buffered {
            reason,
            key: package.id.to_string(),
        })
    }

    async fn buffer_container(
        &self,
        filename: String,
        payload: Vec<u8>,
        reason: BufferReason,
    ) -> Result<Accepted> {
        let container = BufferedContainer::new(filename, payload);
        self.store.enqueue_container(&container).await?;

        tracing::info!(
            filename = %container.filename,
            size = container.size,
            reason = ?reason,
            "Container buffered"
        );
        Ok(Accepted::Buffered {
            reason,
            key: container.filename,
        })
    }
}
