//! Connectivity monitor.
//!
//! Tracks the host's online/offline state over a [`tokio::sync::watch`]
//! channel. Purely event-driven: host adapters (platform network callbacks,
//! a heartbeat probe owned by the embedder, etc.) call [`set_online`] /
//! [`set_offline`] on transition, and the scheduler wakes on the channel to
//! attempt an immediate sync when connectivity is regained.
//!
//! [`set_online`]: ConnectivityMonitor::set_online
//! [`set_offline`]: ConnectivityMonitor::set_offline

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared online/offline flag with change notification.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded with the host's current network state.
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        crate::metrics::set_online(initially_online);
        Self { tx: Arc::new(tx) }
    }

    /// Current connectivity flag.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Flip the flag. Subscribers are only notified on an actual transition.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
            crate::metrics::set_online(online);
        }
    }

    /// Convenience for the "became unreachable" signal.
    pub fn set_offline(&self) {
        self.set_online(false);
    }

    /// Watch for connectivity transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
