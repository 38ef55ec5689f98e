//! File watcher for configuration tier directories.
//!
//! Watches `{config_dir}/default/` and the active environment tier for changes
//! to `.json`, `.yaml` and `.yml` files.
//!
//! Emits events through a tokio watch channel when changes are detected.
//! Uses debouncing to coalesce rapid file changes.

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How often the blocking event loop checks whether anyone is still listening.
const RECEIVER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Event types emitted when tier files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// A single tier file changed
    TierFile(PathBuf),
    /// Multiple files changed in quick succession
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl ConfigChangeEvent {
    /// Returns true if this event requires a config reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, ConfigChangeEvent::Error(_))
    }

    /// Get the affected paths for this event.
    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::TierFile(p) => vec![p.as_path()],
            ConfigChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Tier directories to watch.
#[derive(Debug, Clone, Default)]
pub struct WatchPaths {
    pub tier_dirs: Vec<PathBuf>,
}

impl WatchPaths {
    /// The `default` tier plus `app_env` (once) under `config_dir`.
    pub fn for_tiers(config_dir: &Path, app_env: &str) -> Self {
        let mut tier_dirs = vec![config_dir.join(super::DEFAULT_TIER)];
        if app_env != super::DEFAULT_TIER {
            tier_dirs.push(config_dir.join(app_env));
        }
        Self { tier_dirs }
    }
}

/// Handle to control the config watcher.
pub struct ConfigWatcherHandle {
    /// Receiver for config change events.
    pub events: watch::Receiver<Option<ConfigChangeEvent>>,
    /// Handle to the watcher task.
    _task_handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcherHandle {
    /// Wait for the next config change event.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        // Skip the initial None value
        loop {
            if self.events.changed().await.is_err() {
                return None; // Sender dropped
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// Get the latest event without waiting.
    pub fn latest_event(&self) -> Option<ConfigChangeEvent> {
        self.events.borrow().clone()
    }
}

/// Starts the tier directory watcher.
///
/// Tier directories that do not exist are skipped with a warning. Must be
/// called from within a tokio runtime.
pub fn start_config_watcher(
    paths: WatchPaths,
    config: WatcherConfig,
) -> Result<ConfigWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    // Notify reports absolute paths; canonicalize so classification can match them.
    let mut watched = WatchPaths::default();
    for dir in paths.tier_dirs {
        if dir.is_dir() {
            let dir = dir.canonicalize().unwrap_or(dir);
            info!("Watching config tier: {}", dir.display());
            watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;
            watched.tier_dirs.push(dir);
        } else {
            warn!(
                "Config tier does not exist, skipping watch: {}",
                dir.display()
            );
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &watched);
    });

    Ok(ConfigWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

/// Process events from the notify debouncer and convert to ConfigChangeEvents.
fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<ConfigChangeEvent>>,
    paths: &WatchPaths,
) {
    loop {
        match rx.recv_timeout(RECEIVER_POLL_INTERVAL) {
            Ok(Ok(events)) => {
                if let Some(event) = classify_events(events, paths) {
                    debug!("Config change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Config watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                if tx.send(Some(ConfigChangeEvent::Error(e.to_string()))).is_err() {
                    return;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if tx.is_closed() {
                    debug!("Config watcher receiver dropped, stopping");
                    return;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Fold a batch of debounced events into at most one ConfigChangeEvent.
fn classify_events(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    paths: &WatchPaths,
) -> Option<ConfigChangeEvent> {
    let mut changed: Vec<PathBuf> = events
        .into_iter()
        .filter(|event| {
            matches!(
                event.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .map(|event| event.path)
        .filter(|path| is_tier_file(path, paths))
        .collect();
    changed.dedup();

    match changed.len() {
        0 => None,
        1 => changed.pop().map(ConfigChangeEvent::TierFile),
        _ => Some(ConfigChangeEvent::BatchChange(changed)),
    }
}

/// Whether `path` is a structured config file directly inside a watched tier.
fn is_tier_file(path: &Path, paths: &WatchPaths) -> bool {
    let extension = path.extension().and_then(|e| e.to_str());
    if !matches!(extension, Some("json") | Some("yaml") | Some("yml")) {
        return false;
    }
    path.parent()
        .is_some_and(|parent| paths.tier_dirs.iter().any(|dir| dir == parent))
}
