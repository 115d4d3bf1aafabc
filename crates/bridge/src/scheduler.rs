//! Background task scheduler

use crate::app::AppState;
use anyhow::Result;
use gateway::Transition;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use types::ReplayOutcome;

/// Drives connectivity probes and replay passes
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<AppState>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a new scheduler
    pub async fn new(state: Arc<AppState>) -> Result<Self> {
        Ok(Self {
            state,
            shutdown: CancellationToken::new(),
        })
    }

    /// Run the scheduler until shutdown
    pub async fn run(&mut self) -> Result<()> {
        let replay_config = &self.state.config.replay;
        let mut probe_interval = interval(self.state.config.jdownloader.poll_interval());
        probe_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut replay_interval = interval(replay_config.interval());
        replay_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; startup is covered by the first probe
        replay_interval.reset();

        let replay_enabled = replay_config.enabled;
        tracing::info!(
            poll_interval_ms = self.state.config.jdownloader.poll_interval_ms,
            replay_interval_seconds = replay_config.interval_seconds,
            replay_enabled,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Scheduler stopped");
                    return Ok(());
                }
                _ = probe_interval.tick() => {
                    if self.state.monitor.probe().await == Transition::CameOnline {
                        self.spawn_replay("reconnect");
                    }
                }
                _ = replay_interval.tick(), if replay_enabled => {
                    if self.state.monitor.is_online().await {
                        self.spawn_replay("timer");
                    }
                }
            }
        }
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Scheduler shutdown initiated");
        self.shutdown.cancel();
        Ok(())
    }

    /// Replay runs off the probe loop so a long pass never delays probing
    fn spawn_replay(&self, trigger: &'static str) {
        let state = self.state.clone();
        tokio::spawn(async move {
            match state.dispatcher.replay().await {
                Ok(ReplayOutcome::Completed(report)) => {
                    tracing::info!(trigger, delivered = report.delivered(), failed = report.failed(), "Scheduled replay completed");
                }
                Ok(outcome) => {
                    tracing::debug!(trigger, outcome = outcome.status_text(), "Scheduled replay skipped");
                }
                Err(e) => {
                    tracing::error!(trigger, error = %e, "Scheduled replay failed");
                }
            }
        });
    }
}
