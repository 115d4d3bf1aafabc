//! Buffer replay

use crate::storage::BufferStore;
use gateway::{with_deadline, ConnectivityMonitor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{ReplayOutcome, ReplayReport, Result};

/// Drains the buffer into the downloader, one pass at a time
pub struct Dispatcher {
    store: Arc<dyn BufferStore>,
    monitor: Arc<ConnectivityMonitor>,
    delivery_timeout: Duration,
    running: AtomicBool,
}

/// Clears the running flag when a pass ends, however it ends
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn BufferStore>,
        monitor: Arc<ConnectivityMonitor>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            store,
            monitor,
            delivery_timeout,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one replay pass unless one is already in flight
    pub async fn replay(&self) -> Result<ReplayOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Replay already running, trigger coalesced");
            return Ok(ReplayOutcome::AlreadyRunning);
        }
        let _guard = PassGuard(&self.running);

        if self.store.count().await? == 0 {
            return Ok(ReplayOutcome::NothingToReplay);
        }

        // the cache may be up to one poll interval stale
        let online = self.monitor.probe_uncached().await;
        self.monitor.record(online).await;
        if !online {
            tracing::info!("Replay skipped, JDownloader is offline");
            return Ok(ReplayOutcome::Offline);
        }

        let report = self.run_pass().await?;

        tracing::info!(
            delivered_packages = report.delivered_packages,
            delivered_containers = report.delivered_containers,
            failed_packages = report.failed_packages,
            failed_containers = report.failed_containers,
            remaining = report.remaining,
            "Replay pass finished"
        );
        Ok(ReplayOutcome::Completed(report))
    }

    async fn run_pass(&self) -> Result<ReplayReport> {
        let packages = self.store.list_packages().await?;
        let containers = self.store.list_containers().await?;
        let gateway = self.monitor.gateway();
        let mut report = ReplayReport::default();

        tracing::info!(
            packages = packages.len(),
            containers = containers.len(),
            "Starting replay pass"
        );

        // the listing fixes the pass membership; an entry removed since is skipped
        for listed in &packages {
            let Some(package) = self.store.get_package(listed.id).await? else {
                tracing::debug!(package_id = %listed.id, "Buffered package removed during pass, skipped");
                continue;
            };
            let result = with_deadline(
                gateway.name(),
                self.delivery_timeout,
                gateway.deliver_links(
                    &package.links,
                    package.name.as_deref(),
                    package.passwords.as_deref(),
                ),
            )
            .await;

            match result {
                Ok(()) => {
                    self.store.remove_package(package.id).await?;
                    report.delivered_packages += 1;
                    tracing::debug!(package_id = %package.id, package = package.label(), "Buffered package delivered");
                }
                Err(e) => {
                    self.store
                        .record_package_failure(package.id, &e.to_string())
                        .await?;
                    report.failed_packages += 1;
                    tracing::warn!(
                        package_id = %package.id,
                        attempts = package.attempt_count + 1,
                        error = %e,
                        "Buffered package delivery failed"
                    );
                }
            }
        }

        for listed in &containers {
            let Some(container) = self.store.get_container(&listed.filename, listed.seq).await? else {
                tracing::debug!(filename = %listed.filename, "Buffered container removed or replaced during pass, skipped");
                continue;
            };
            let result = with_deadline(
                gateway.name(),
                self.delivery_timeout,
                gateway.deliver_container(&container.filename, &container.payload),
            )
            .await;

            match result {
                Ok(()) => {
                    self.store
                        .remove_delivered_container(&container.filename, container.seq)
                        .await?;
                    report.delivered_containers += 1;
                    tracing::debug!(filename = %container.filename, "Buffered container delivered");
                }
                Err(e) => {
                    self.store
                        .record_container_failure(&container.filename, container.seq, &e.to_string())
                        .await?;
                    report.failed_containers += 1;
                    tracing::warn!(
                        filename = %container.filename,
                        attempts = container.attempt_count + 1,
                        error = %e,
                        "Buffered container delivery failed"
                    );
                }
            }
        }

        report.remaining = self.store.count().await?;
        Ok(report)
    }
}
