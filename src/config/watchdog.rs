//! Periodic refreshers ("watchdogs") for live connectors.
//!
//! Each periodic connector gets one tokio task that re-fetches its config on a
//! fixed interval and merges it into the shared tree. Ticks of one connector
//! run inside that single task, so they never overlap; ticks that fall behind
//! are skipped rather than bunched up.

use super::connector::{ConnectorEntry, fetch_config};
use super::tree::SharedTree;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lower bound for refresh intervals; tokio rejects a zero period.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Identity of a registered connector (its registration index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorId(pub usize);

impl std::fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to one running refresher.
struct Watchdog {
    name: String,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Watchdog {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Registry of active refreshers, at most one per connector.
#[derive(Default)]
pub struct WatchdogRegistry {
    active: Mutex<HashMap<ConnectorId, Watchdog>>,
}

impl std::fmt::Debug for WatchdogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogRegistry")
            .field("active", &self.len())
            .finish()
    }
}

impl WatchdogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start refreshing `entry` into `tree` every `entry.refresh_interval()`.
    ///
    /// The first tick fires one interval from now. A refresher already running
    /// for `id` is cancelled first. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        id: ConnectorId,
        entry: ConnectorEntry,
        tree: Arc<SharedTree>,
        call_timeout: Duration,
    ) {
        let name = entry.connector.name().to_string();
        let period = entry.refresh_interval().max(MIN_REFRESH_INTERVAL);
        let cancelled = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(refresh_loop(
            id,
            entry,
            tree,
            Arc::clone(&cancelled),
            period,
            call_timeout,
        ));

        let previous = self.lock().insert(
            id,
            Watchdog {
                name: name.clone(),
                cancelled,
                task,
            },
        );
        if let Some(previous) = previous {
            warn!(connector = %name, id = %id, "Replacing existing watchdog");
            previous.cancel();
            previous.task.abort();
        }
        info!(connector = %name, id = %id, ?period, "Watchdog started");
    }

    /// Cancel every refresher and clear the registry.
    ///
    /// Once this returns no refresher merges into `tree` again. Returns how many
    /// refreshers were stopped; calling it with none active is a no-op.
    pub fn stop_all(&self, tree: &SharedTree) -> usize {
        let stopped: Vec<(ConnectorId, Watchdog)> = self.lock().drain().collect();
        if stopped.is_empty() {
            return 0;
        }

        for (_, watchdog) in &stopped {
            watchdog.cancel();
        }
        // A tick already holding the write lock finishes; every later one sees the flag.
        tree.barrier();
        for (id, watchdog) in &stopped {
            watchdog.task.abort();
            debug!(connector = %watchdog.name, id = %id, "Watchdog stopped");
        }
        stopped.len()
    }

    /// Number of live refreshers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a refresher is registered for `id`.
    pub fn is_active(&self, id: ConnectorId) -> bool {
        self.lock().contains_key(&id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectorId, Watchdog>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn refresh_loop(
    id: ConnectorId,
    entry: ConnectorEntry,
    tree: Arc<SharedTree>,
    cancelled: Arc<AtomicBool>,
    period: Duration,
    call_timeout: Duration,
) {
    let name = entry.connector.name().to_string();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::Acquire) {
            break;
        }

        match fetch_config(entry.connector.as_ref(), call_timeout).await {
            Ok(config) => {
                if !tree.merge_unless(&cancelled, config) {
                    break;
                }
                debug!(connector = %name, id = %id, "Watchdog refresh merged");
            }
            Err(e) => {
                warn!(connector = %name, id = %id, error = %e, "Watchdog refresh failed");
            }
        }
    }
    debug!(connector = %name, id = %id, "Watchdog loop exited");
}
