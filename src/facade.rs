//! Public entry point wrapping [`ConfigStore`] construction and lifecycle.

use crate::config::watcher::{WatchPaths, WatcherConfig, start_config_watcher};
use crate::config::{
    ConfigStore, ConfigTree, ConnectorEntry, DEFAULT_DOTENV_FILE, DEFAULT_ENV_PREFIX, EnvSource,
};
use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Construction options for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// Root holding one directory per tier (default: `./config`)
    pub config_dir: PathBuf,
    /// Where connector implementations live (default: `./connectors`)
    pub connectors_dir: PathBuf,
    /// Environment variable prefix (default: `CONFIG`)
    pub env_prefix: String,
    /// Explicit environment tier; overrides `CONFIG__APP_ENV`
    pub app_env: Option<String>,
    /// Dotenv file layered under the process environment (default: `.env`);
    /// `None` reads the process environment only
    pub env_file: Option<PathBuf>,
    /// Live sources, loaded in order after the environment overlay
    pub connectors: Vec<ConnectorEntry>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("./config"),
            connectors_dir: PathBuf::from("./connectors"),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            app_env: None,
            env_file: Some(PathBuf::from(DEFAULT_DOTENV_FILE)),
            connectors: Vec::new(),
        }
    }
}

/// Layered application configuration.
///
/// ```no_run
/// use config_aggregator::{Config, ConfigOptions};
/// use serde_json::Value;
///
/// # async fn run() {
/// let config = Config::new(ConfigOptions::default());
/// config.init().await;
/// let client_id = config.get("app.auth.client_id", Value::Null);
/// # }
/// ```
#[derive(Debug)]
pub struct Config {
    store: ConfigStore,
}

impl Config {
    pub fn new(options: ConfigOptions) -> Self {
        let mut store = ConfigStore::new()
            .with_config_dir(options.config_dir)
            .with_connectors_dir(options.connectors_dir)
            .with_env_prefix(options.env_prefix)
            .with_connectors(options.connectors);
        if let Some(app_env) = options.app_env {
            store = store.with_app_env(app_env);
        }
        store = match options.env_file {
            Some(path) => store.with_dotenv(path),
            None => store.with_env_source(EnvSource::Process),
        };
        Self { store }
    }

    /// Wrap an already configured store.
    pub fn with_store(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Load every tier. Failures are logged, never returned.
    pub async fn init(&self) {
        self.store.init().await;
    }

    /// Clear the tree and load every tier again.
    pub async fn reload(&self) {
        self.store.reload().await;
    }

    /// Empty the tree.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Value at a dotted path, or `default`.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.store.get_or(key, default)
    }

    pub fn get_opt(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store.get_as(key)
    }

    /// Snapshot of the whole tree.
    pub fn list(&self) -> Arc<ConfigTree> {
        self.store.list()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.store.set(key, value);
    }

    pub fn stop_watchdogs(&self) {
        self.store.stop_watchdogs();
    }

    pub fn current_env(&self) -> Option<String> {
        self.store.current_env()
    }

    /// Reload whenever a file in the `default` or current environment tier changes.
    ///
    /// The watcher stops when the returned handle is dropped or when the last
    /// other reference to this `Config` goes away.
    pub fn watch_files(
        self: &Arc<Self>,
        watcher_config: WatcherConfig,
    ) -> Result<AutoReloadHandle, ConfigError> {
        let app_env = self
            .current_env()
            .unwrap_or_else(|| self.store.resolve_app_env());
        let paths = WatchPaths::for_tiers(self.store.config_dir(), &app_env);
        let mut watcher = start_config_watcher(paths, watcher_config)?;

        let config = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(event) = watcher.wait_for_change().await {
                if !event.requires_reload() {
                    warn!(?event, "Config watcher reported an error");
                    continue;
                }
                let Some(config) = config.upgrade() else {
                    break;
                };
                info!(paths = ?event.affected_paths(), "Tier files changed, reloading");
                config.reload().await;
            }
        });
        Ok(AutoReloadHandle { task })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(ConfigOptions::default())
    }
}

/// Keeps file-change auto-reload running. Dropping it stops reloading.
#[derive(Debug)]
pub struct AutoReloadHandle {
    task: JoinHandle<()>,
}

impl AutoReloadHandle {
    pub fn stop(self) {}
}

impl Drop for AutoReloadHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
