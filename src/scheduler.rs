// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync scheduler.
//!
//! Decides when the engine runs a pass. Three triggers share one gate:
//! the periodic interval, a connectivity-regained transition, and manual
//! [`sync_now`](SyncScheduler::sync_now) calls. At most one pass runs at a
//! time; a trigger that fires mid-pass is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{PassSummary, SyncEngine};
use crate::remote::SyncError;

/// Pass lifecycle notifications for UI observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Synced,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syncing => f.write_str("syncing"),
            Self::Synced => f.write_str("synced"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Drives the [`SyncEngine`] from a background task.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    syncing: AtomicBool,
    status_tx: broadcast::Sender<SyncStatus>,
    shutdown_tx: watch::Sender<bool>,
}

impl SyncScheduler {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let (status_tx, _) = broadcast::channel(16);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            engine,
            syncing: AtomicBool::new(false),
            status_tx,
            shutdown_tx,
        }
    }

    /// Whether a pass is currently running.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Subscribe to pass lifecycle notifications.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Request an immediate sync pass.
    ///
    /// Returns `Ok(None)` when the gate declines the request (offline, or a
    /// pass is already running); `Err` only when a pass started and its
    /// orchestration failed.
    pub async fn sync_now(&self) -> Result<Option<PassSummary>, SyncError> {
        match self.run_gated_pass().await {
            None => Ok(None),
            Some(Ok(summary)) => Ok(Some(summary)),
            Some(Err(e)) => Err(e),
        }
    }

    /// Spawn the background loop. The task runs until [`shutdown`] is
    /// called or the scheduler is dropped.
    ///
    /// [`shutdown`]: Self::shutdown
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        // Subscribe before spawning so a transition racing the spawn is
        // not lost.
        let mut connectivity = self.engine.connectivity.subscribe();
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let period = Duration::from_secs(scheduler.engine.config.sync_interval_secs);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval() fires immediately; the first pass waits a full period
            ticker.tick().await;

            info!(period_secs = period.as_secs(), "Sync scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.background_sync("interval").await;
                    }
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *connectivity.borrow_and_update() {
                            info!("Connectivity regained; attempting sync");
                            scheduler.background_sync("reconnect").await;
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Sync scheduler stopped");
        })
    }

    /// Stop the background loop. Idempotent; a pass already in flight runs
    /// to completion.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn background_sync(&self, trigger: &str) {
        if let Some(Err(e)) = self.run_gated_pass().await {
            warn!(error = %e, trigger, "Background sync pass failed");
        }
    }

    /// Run one pass if the gate allows it. `None` means the trigger was
    /// dropped without starting a pass.
    async fn run_gated_pass(&self) -> Option<Result<PassSummary, SyncError>> {
        if !self.engine.is_online() {
            debug!("Sync requested while offline; skipping");
            return None;
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync already in progress; skipping");
            return None;
        }

        let _ = self.status_tx.send(SyncStatus::Syncing);
        let result = self.engine.sync_pass().await;
        self.syncing.store(false, Ordering::SeqCst);

        let status = if result.is_ok() {
            SyncStatus::Synced
        } else {
            SyncStatus::Error
        };
        let _ = self.status_tx.send(status);

        Some(result)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
