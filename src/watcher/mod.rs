//! The discovery watch cycle driver.
//!
//! One instance owns the serialized execution of watch cycles: the clock
//! pushes hourly ticks to the front of a single-worker queue, and each tick
//! runs discovery for every configured project, reconciles diffs against the
//! appropriate baseline, dispatches notifications, persists results, and
//! updates cycle metrics. One project's failure never aborts the cycle; the
//! next hourly tick is the retry mechanism.

pub mod metrics;
pub mod reconcile;
pub mod time_window;

pub use metrics::{InMemoryMetrics, MetricsSink};
pub use time_window::DigestWindow;

use crate::clock::{Clock, ClockHandle};
use crate::config::{ConfigSource, ProjectConfig};
use crate::discovery::engine::DiscoveryEngine;
use crate::discovery::messages::{daily_digest_message, diff_to_messages};
use crate::discovery::snapshot::WatcherRecord;
use crate::error::DiscoveryError;
use crate::notify::{Channel, NotificationClient};
use crate::storage::RecordStore;
use crate::task_queue::TaskQueue;
use crate::utils::error::compact_error_message;
use crate::watcher::metrics::{
    CHANGES_DETECTED_GAUGE, ERRORS_GAUGE, LAST_SYNCED_GAUGE, SYNC_DURATION_HISTOGRAM,
};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Resolves the chain head a cycle pins its reads to.
#[async_trait]
pub trait ChainHead: Send + Sync {
    async fn block_number(&self) -> anyhow::Result<u64>;
}

pub struct DiscoveryWatcher {
    chain: Arc<dyn ChainHead>,
    engine: Arc<dyn DiscoveryEngine>,
    notifier: Option<Arc<dyn NotificationClient>>,
    config_source: Arc<dyn ConfigSource>,
    store: Arc<dyn RecordStore>,
    metrics: Arc<dyn MetricsSink>,
    queue: TaskQueue<u64>,
    digest_window: DigestWindow,
}

impl DiscoveryWatcher {
    pub fn new(
        chain: Arc<dyn ChainHead>,
        engine: Arc<dyn DiscoveryEngine>,
        notifier: Option<Arc<dyn NotificationClient>>,
        config_source: Arc<dyn ConfigSource>,
        store: Arc<dyn RecordStore>,
        metrics: Arc<dyn MetricsSink>,
        digest_window: DigestWindow,
    ) -> Self {
        Self {
            chain,
            engine,
            notifier,
            config_source,
            store,
            metrics,
            queue: TaskQueue::new(),
            digest_window,
        }
    }

    /// Subscribe to the clock and spawn the queue worker.
    ///
    /// A fresh tick is pushed to the *front* of the queue: when cycles fall
    /// behind, the newest data runs first and older ticks drain afterwards.
    pub fn start(self: &Arc<Self>) -> WatcherHandle {
        let me = Arc::clone(self);
        let worker = self.queue.spawn_worker(move |timestamp| {
            let me = Arc::clone(&me);
            async move { me.update(timestamp).await }
        });

        let queue = self.queue.clone();
        let clock = Clock::on_new_hour(move |timestamp| queue.push_front(timestamp));

        tracing::info!("[WATCH] started");
        WatcherHandle {
            clock,
            worker,
            queue: self.queue.clone(),
        }
    }

    /// Run one full watch cycle for the given trigger timestamp.
    ///
    /// Failures to resolve the chain head or to enumerate project configs
    /// propagate out; everything per-project is isolated below.
    pub async fn update(&self, timestamp: u64) -> anyhow::Result<()> {
        let block_number = self
            .chain
            .block_number()
            .await
            .context("failed to resolve chain head")?;
        let started = self.begin_cycle(block_number, timestamp);

        let configs = self
            .config_source
            .read_all_configs()
            .await
            .context("failed to list project configs")?;

        let is_digest_cycle = self.digest_window.is_digest_hour(timestamp);
        let mut not_updated: Vec<String> = Vec::new();

        for (index, config) in configs.iter().enumerate() {
            if let Err(err) = self
                .update_project(
                    config,
                    index + 1,
                    block_number,
                    is_digest_cycle,
                    &mut not_updated,
                    timestamp,
                )
                .await
            {
                tracing::error!(
                    project = config.name(),
                    "[WATCH] project update failed: {}",
                    compact_error_message(&format!("{err:#}"), 320)
                );
                self.metrics.inc_gauge(ERRORS_GAUGE);
            }
        }

        if is_digest_cycle {
            self.send_daily_digest(&not_updated, timestamp).await;
        }

        self.finish_cycle(started, block_number, timestamp);
        Ok(())
    }

    async fn update_project(
        &self,
        config: &ProjectConfig,
        ordinal: usize,
        block_number: u64,
        is_digest_cycle: bool,
        not_updated: &mut Vec<String>,
        timestamp: u64,
    ) -> anyhow::Result<()> {
        tracing::info!(project = config.name(), ordinal, "[WATCH] discovery started");

        let snapshot = self.engine.run(config, block_number).await?;

        let failed = snapshot.contract_errors();
        if failed > 0 {
            not_updated.push(config.name().to_string());
            return Err(DiscoveryError::ContractErrors {
                project: config.name().to_string(),
                failed,
            }
            .into());
        }

        let diff = reconcile::find_changes(
            self.config_source.as_ref(),
            self.store.as_ref(),
            config,
            &snapshot,
            is_digest_cycle,
        )
        .await?;

        if !diff.changes.is_empty() {
            let messages = diff_to_messages(config.name(), &diff.changes);
            self.notify(&messages, Channel::Internal).await;
            self.notify(&messages, Channel::Public).await;
            tracing::info!(
                project = config.name(),
                changes = diff.changes.len(),
                "[NOTIFY] change notifications dispatched"
            );
            self.metrics.inc_gauge(CHANGES_DETECTED_GAUGE);
        }

        if diff.include_in_digest {
            not_updated.push(config.name().to_string());
        }

        self.store
            .upsert(&WatcherRecord {
                project_name: config.name().to_string(),
                timestamp,
                block_number,
                snapshot,
                config_hash: config.hash(),
            })
            .await
            .with_context(|| format!("failed to persist record for `{}`", config.name()))?;

        tracing::info!(project = config.name(), ordinal, "[WATCH] discovery finished");
        Ok(())
    }

    /// Deliver messages to one channel, best-effort and independently: a
    /// failed send is logged and the remaining messages are still attempted.
    pub async fn notify(&self, messages: &[String], channel: Channel) {
        let Some(notifier) = &self.notifier else {
            tracing::warn!(
                "[NOTIFY] notification transport not configured; {} message(s) not sent",
                messages.len()
            );
            return;
        };

        for message in messages {
            match notifier.send(message, channel).await {
                Ok(()) => {
                    tracing::info!(channel = channel.as_str(), "[NOTIFY] notification sent")
                }
                Err(err) => tracing::error!(
                    channel = channel.as_str(),
                    "[NOTIFY] send failed: {}",
                    compact_error_message(&err.to_string(), 320)
                ),
            }
        }
    }

    async fn send_daily_digest(&self, not_updated: &[String], timestamp: u64) {
        tracing::info!(
            not_updated = not_updated.len(),
            "[WATCH] sending daily digest"
        );
        let message = daily_digest_message(not_updated, timestamp);
        self.notify(&[message], Channel::Internal).await;
    }

    fn begin_cycle(&self, block_number: u64, timestamp: u64) -> Instant {
        tracing::info!(block_number, timestamp, "[WATCH] update started");
        self.metrics.set_gauge(CHANGES_DETECTED_GAUGE, 0.0);
        self.metrics.set_gauge(ERRORS_GAUGE, 0.0);
        if let Some(notifier) = &self.notifier {
            notifier.reset_calls_count();
        }
        Instant::now()
    }

    fn finish_cycle(&self, started: Instant, block_number: u64, timestamp: u64) {
        self.metrics
            .observe_histogram(SYNC_DURATION_HISTOGRAM, started.elapsed().as_secs_f64());
        self.metrics.set_gauge(LAST_SYNCED_GAUGE, block_number as f64);
        tracing::info!(block_number, timestamp, "[WATCH] update finished");
    }
}

/// Keeps the clock subscription and queue worker alive; shutting down
/// unsubscribes from the clock and drains whatever is already queued.
pub struct WatcherHandle {
    clock: ClockHandle,
    worker: JoinHandle<()>,
    queue: TaskQueue<u64>,
}

impl WatcherHandle {
    pub async fn shutdown(self) {
        self.clock.stop();
        self.queue.close();
        let _ = self.worker.await;
    }
}
