//! Sync scheduler and submission executor.
//!
//! One logical sync worker per process: a pass claims the whole queue
//! (`take_all`), submits each item in enqueue order, and writes failures
//! back. A trigger arriving while a pass is in flight is dropped, which is
//! what keeps overlapping passes from submitting the same item twice.

use crate::api::SubmitService;
use crate::connectivity::ConnectivityMonitor;
use crate::db::{self, Pool};
use crate::model::{QueueItem, RecordKind, RunOutcome, SyncError, SyncReport, SyncStatus};
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub struct SyncEngine {
    pool: Pool,
    service: Arc<dyn SubmitService>,
    monitor: Arc<ConnectivityMonitor>,
    submit_timeout: Duration,
    busy: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        pool: Pool,
        service: Arc<dyn SubmitService>,
        monitor: Arc<ConnectivityMonitor>,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            service,
            monitor,
            submit_timeout,
            busy: AtomicBool::new(false),
        }
    }

    /// UI front door: persist a record for later submission. Returns the
    /// client-generated id once the write is durable; an error means the
    /// record was not saved at all.
    #[instrument(skip_all, fields(kind = kind.as_str()))]
    pub async fn save_offline(&self, kind: RecordKind, payload: Value) -> Result<String, SyncError> {
        let id = db::enqueue_item(&self.pool, kind, &payload)
            .await
            .map_err(|err| SyncError::StorageUnavailable(err.to_string()))?;
        info!(id = %id, "record queued for sync");
        Ok(id)
    }

    /// Read-only status for the UI: queue depth, last completed pass,
    /// current reachability.
    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let depth = db::queue_depth(&self.pool)
            .await
            .map_err(|err| SyncError::StorageUnavailable(err.to_string()))?;
        let last_sync_at = db::last_sync_at(&self.pool)
            .await
            .map_err(|err| SyncError::StorageUnavailable(err.to_string()))?;
        Ok(SyncStatus {
            depth,
            last_sync_at,
            is_online: self.monitor.is_online(),
        })
    }

    /// Pending items for the sync-status screen, in enqueue order.
    pub async fn pending(&self) -> Result<Vec<QueueItem>, SyncError> {
        db::read_all(&self.pool)
            .await
            .map_err(|err| SyncError::StorageUnavailable(err.to_string()))
    }

    /// Run one sync pass. At most one pass runs at a time; a call while a
    /// pass is in flight returns [`RunOutcome::Busy`] without side effects.
    #[instrument(skip_all)]
    pub async fn run_sync(&self) -> Result<RunOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync pass already in flight; dropping trigger");
            return Ok(RunOutcome::Busy);
        }
        let result = self.run_pass().await;
        self.busy.store(false, Ordering::Release);
        result.map(RunOutcome::Completed)
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        let snapshot = db::take_all(&self.pool).await?;
        let total = snapshot.len();
        let mut report = SyncReport::default();
        let mut requeue = Vec::new();

        for mut item in snapshot {
            match self.submit_one(&item).await {
                Ok(remote_id) => {
                    info!(id = %item.id, kind = item.kind.as_str(), remote_id = %remote_id, "item synced");
                    report.submitted += 1;
                }
                Err(err) => {
                    warn!(%err, id = %item.id, attempts = item.attempts, "requeueing item");
                    item.attempts += 1;
                    report.failed += 1;
                    requeue.push(item);
                }
            }
        }

        db::push_back(&self.pool, &requeue).await?;
        db::record_sync_completed(&self.pool, Utc::now()).await?;
        info!(
            total,
            submitted = report.submitted,
            failed = report.failed,
            "sync pass complete"
        );
        Ok(report)
    }

    /// Submission executor for a single item. Timeouts, transport errors and
    /// non-2xx responses all collapse into `SubmissionFailed`; there is no
    /// partial-success state.
    async fn submit_one(&self, item: &QueueItem) -> Result<String, SyncError> {
        match tokio::time::timeout(self.submit_timeout, self.service.submit(item)).await {
            Ok(Ok(remote_id)) => Ok(remote_id),
            Ok(Err(err)) => Err(SyncError::SubmissionFailed(format!("{err:#}"))),
            Err(_) => Err(SyncError::SubmissionFailed(format!(
                "timed out after {}s",
                self.submit_timeout.as_secs()
            ))),
        }
    }
}

/// Handle bound to the "Sync Now" UI action. Cheap to clone; never blocks.
#[derive(Clone, Debug)]
pub struct SyncTrigger {
    tx: mpsc::Sender<()>,
}

impl SyncTrigger {
    /// Request a sync pass. A full inbox means a pass is already pending,
    /// in which case the request is dropped.
    pub fn request_sync(&self) {
        if self.tx.try_send(()).is_err() {
            debug!("sync already requested; dropping trigger");
        }
    }
}

/// Spawn the single scheduler task. It fires a pass on offline-to-online
/// transitions of `online_rx` and on manual triggers, and exits once either
/// source is closed.
pub fn spawn_scheduler(
    engine: Arc<SyncEngine>,
    mut online_rx: watch::Receiver<bool>,
) -> (SyncTrigger, JoinHandle<()>) {
    let (tx, mut trigger_rx) = mpsc::channel::<()>(1);
    // Capture the state as of subscription, before the task is scheduled,
    // so a transition racing the spawn still registers as a transition.
    let mut was_online = *online_rx.borrow_and_update();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    let reconnected = online && !was_online;
                    was_online = online;
                    if reconnected {
                        info!("back online; starting sync pass");
                        if let Err(err) = engine.run_sync().await {
                            warn!(?err, "sync pass failed");
                        }
                    }
                }
                msg = trigger_rx.recv() => {
                    if msg.is_none() {
                        break;
                    }
                    if let Err(err) = engine.run_sync().await {
                        warn!(?err, "sync pass failed");
                    }
                }
            }
        }
    });
    (SyncTrigger { tx }, handle)
}
