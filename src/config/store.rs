//! Configuration store: ordered loading pipeline and accessors.
//!
//! `init` runs four stages strictly in order, each deep-merged over the last:
//! 1. **Defaults** - every file in `{config_dir}/default`
//! 2. **Environment** - every file in `{config_dir}/{app_env}`
//! 3. **Process environment** - `CONFIG__...` variables
//! 4. **Connectors** - live sources, optionally refreshed on a timer
//!
//! Every stage logs its own failures and carries on. Nothing raised while
//! loading reaches the caller; the tree holds whatever succeeded.

use super::ConfigTree;
use super::connector::{
    Connector, ConnectorEntry, ConnectorOptions, fetch_config, init_connector,
};
use super::env::{
    APP_ENV_KEY, DEFAULT_ENV_PREFIX, EnvKey, EnvSource, app_env_var, decode_env_key,
};
use super::files::read_tier;
use super::merge::merge_into;
use super::path::{get_path, nest, set_path};
use super::tree::SharedTree;
use super::watchdog::{ConnectorId, WatchdogRegistry};
use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Name of the always-loaded tier directory.
pub const DEFAULT_TIER: &str = "default";

/// Default upper bound on a single connector call.
pub const DEFAULT_CONNECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Owner of the active configuration tree.
#[derive(Debug)]
pub struct ConfigStore {
    tree: Arc<SharedTree>,
    watchdogs: WatchdogRegistry,
    config_dir: PathBuf,
    connectors_dir: PathBuf,
    env_prefix: String,
    app_env: Option<String>,
    env: EnvSource,
    connectors: Vec<ConnectorEntry>,
    connector_timeout: Duration,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        self.watchdogs.stop_all(&self.tree);
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(SharedTree::new()),
            watchdogs: WatchdogRegistry::new(),
            config_dir: PathBuf::from("./config"),
            connectors_dir: PathBuf::from("./connectors"),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            app_env: None,
            env: EnvSource::default(),
            connectors: Vec::new(),
            connector_timeout: DEFAULT_CONNECTOR_TIMEOUT,
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_connectors_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.connectors_dir = dir.into();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Explicit environment tier, taking precedence over `CONFIG__APP_ENV`.
    pub fn with_app_env(mut self, env: impl Into<String>) -> Self {
        let env = env.into();
        self.app_env = (!env.is_empty()).then_some(env);
        self
    }

    pub fn with_env_source(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Layer the process environment over the dotenv file at `path`.
    pub fn with_dotenv(self, path: impl Into<PathBuf>) -> Self {
        self.with_env_source(EnvSource::dotenv(path))
    }

    /// Read environment variables from a fixed set instead of the process.
    pub fn with_env_vars<K, V>(self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.with_env_source(EnvSource::fixed(vars))
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push(ConnectorEntry::new(connector));
        self
    }

    pub fn with_connector_options(
        mut self,
        connector: Arc<dyn Connector>,
        options: ConnectorOptions,
    ) -> Self {
        self.connectors
            .push(ConnectorEntry::new(connector).with_options(options));
        self
    }

    pub fn with_connectors(mut self, connectors: impl IntoIterator<Item = ConnectorEntry>) -> Self {
        self.connectors.extend(connectors);
        self
    }

    /// Upper bound on each connector `init`/`return_config` call.
    pub fn with_connector_timeout(mut self, timeout: Duration) -> Self {
        self.connector_timeout = timeout;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn connectors_dir(&self) -> &Path {
        &self.connectors_dir
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    pub fn connectors(&self) -> &[ConnectorEntry] {
        &self.connectors
    }

    /// Environment tier to load: explicit argument, else `{prefix}__APP_ENV`,
    /// else `default`.
    pub fn resolve_app_env(&self) -> String {
        self.app_env
            .clone()
            .or_else(|| self.env.var(&app_env_var(&self.env_prefix)))
            .unwrap_or_else(|| DEFAULT_TIER.to_string())
    }

    // ---- loading pipeline ----

    /// Run the full loading pipeline.
    pub async fn init(&self) {
        let app_env = self.resolve_app_env();
        info!(config_dir = %self.config_dir.display(), app_env = %app_env, "Loading configuration");

        self.load_tier(DEFAULT_TIER);
        if app_env == DEFAULT_TIER {
            self.ensure_app_env(&app_env);
        } else {
            self.load_config_files(Some(&app_env));
        }
        self.load_environment();
        self.load_connectors().await;

        info!(
            sections = self.tree.snapshot().len(),
            watchdogs = self.watchdogs.len(),
            "Configuration loaded"
        );
    }

    /// Clear the tree and run the pipeline again.
    ///
    /// Running refreshers are stopped first; periodic connectors get fresh ones.
    pub async fn reload(&self) {
        self.stop_watchdogs();
        self.clear();
        self.init().await;
    }

    /// Empty the tree without reloading.
    pub fn clear(&self) {
        self.tree.replace(ConfigTree::new());
        debug!("Configuration cleared");
    }

    /// Load one environment tier and record it as `APP_ENV` if nothing set it yet.
    ///
    /// `None` resolves the tier with [`resolve_app_env`](Self::resolve_app_env).
    pub fn load_config_files(&self, env: Option<&str>) {
        let app_env = env
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.resolve_app_env());
        self.load_tier(&app_env);
        self.ensure_app_env(&app_env);
    }

    /// Merge every file of `{config_dir}/{tier}` into the tree, one section per file.
    fn load_tier(&self, tier: &str) {
        let dir = self.config_dir.join(tier);
        let contents = match read_tier(&dir) {
            Ok(contents) => contents,
            Err(e) => {
                error!(tier, error = %e, "Skipping config tier");
                return;
            }
        };

        for failure in &contents.failures {
            error!(tier, error = %failure, "Skipping config file");
        }

        let loaded = contents.sections.len();
        self.tree.update(|tree| {
            for file in contents.sections {
                debug!(tier, section = %file.section, path = %file.path.display(), "Merging config file");
                let mut section = ConfigTree::new();
                section.insert(file.section, file.content);
                merge_into(tree, section);
            }
        });
        info!(tier, files = loaded, "Config tier loaded");
    }

    fn ensure_app_env(&self, app_env: &str) {
        self.tree.update(|tree| {
            if !tree.contains_key(APP_ENV_KEY) {
                tree.insert(APP_ENV_KEY.to_string(), Value::String(app_env.to_string()));
            }
        });
    }

    /// Apply every matching variable from the configured environment source.
    pub fn load_environment(&self) -> usize {
        self.load_environment_from(self.env.snapshot())
    }

    /// Apply every `{prefix}__...` variable from `vars`, in name order, as a
    /// single merge. Other variables are ignored. Returns how many were written.
    pub fn load_environment_from<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> usize
    where
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let decoded: Vec<(EnvKey, Value)> = sorted
            .iter()
            .filter_map(|(key, raw)| {
                let env_key = decode_env_key(&self.env_prefix, key)?;
                let value = env_key.tag.cast(raw);
                debug!(var = %key, tag = %env_key.tag, "Applying environment override");
                Some((env_key, value))
            })
            .collect();

        let applied = if decoded.is_empty() {
            0
        } else {
            self.tree.update(|tree| {
                let mut applied = 0;
                for (env_key, value) in decoded {
                    if apply_env_value(tree, &env_key.path, value) {
                        applied += 1;
                    }
                }
                applied
            })
        };
        info!(variables = applied, "Environment overrides loaded");
        applied
    }

    /// Apply a single environment variable.
    ///
    /// Returns the value written, or `None` when nothing was written: `key`
    /// lacks the `{prefix}__` prefix, or it targets an `APP_ENV` that is
    /// already recorded.
    pub fn load_env_variable(&self, key: &str, value: &str) -> Option<Value> {
        let Some(env_key) = decode_env_key(&self.env_prefix, key) else {
            debug!(var = %key, "Ignoring variable without config prefix");
            return None;
        };
        let value = env_key.tag.cast(value);
        let applied = self
            .tree
            .update(|tree| apply_env_value(tree, &env_key.path, value.clone()));
        applied.then_some(value)
    }

    /// Initialize every connector in registration order and merge its config.
    ///
    /// Returns how many connectors failed to initialize and were skipped.
    pub async fn load_connectors(&self) -> usize {
        let mut skipped = 0;
        for (index, entry) in self.connectors.iter().enumerate() {
            let id = ConnectorId(index);
            if let Err(e) = self.load_connector(id, entry).await {
                error!(id = %id, error = %e, "Connector init failed, skipping");
                skipped += 1;
            }
        }
        skipped
    }

    /// Initialize one connector, merge its first config and schedule its
    /// refresher. Only an `init` failure is returned; a failed first fetch is
    /// logged and a periodic connector is still scheduled.
    async fn load_connector(&self, id: ConnectorId, entry: &ConnectorEntry) -> ConfigResult<()> {
        let name = entry.connector.name();
        init_connector(entry, self.connector_timeout)
            .await
            .map_err(|e| ConfigError::connector(name, e))?;

        match fetch_config(entry.connector.as_ref(), self.connector_timeout).await {
            Ok(config) => {
                self.tree.merge(config);
                debug!(connector = %name, id = %id, "Connector config merged");
            }
            Err(e) => {
                let e = ConfigError::connector(name, e);
                error!(id = %id, error = %e, "Connector returned no config");
            }
        }

        if entry.connector.is_periodic() {
            self.watchdogs.start(
                id,
                entry.clone(),
                Arc::clone(&self.tree),
                self.connector_timeout,
            );
        }
        Ok(())
    }

    // ---- accessors ----

    /// Value at a dotted path, if every segment resolves.
    pub fn get(&self, path: &str) -> Option<Value> {
        get_path(&self.tree.snapshot(), path).cloned()
    }

    /// Value at a dotted path, or `default`.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// Value at a dotted path deserialized into `T`; `None` if missing or mistyped.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get(path)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(path, error = %e, "Config value has unexpected type");
                None
            }
        }
    }

    /// Write a value at a dotted path, creating intermediate mappings.
    pub fn set(&self, path: &str, value: Value) {
        self.tree.update(|tree| set_path(tree, path, value));
    }

    /// Snapshot of the whole tree.
    pub fn list(&self) -> Arc<ConfigTree> {
        self.tree.snapshot()
    }

    /// The loaded environment tier, if recorded.
    pub fn current_env(&self) -> Option<String> {
        match self.tree.snapshot().get(APP_ENV_KEY)? {
            Value::String(env) => Some(env.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Stop every refresher. Idempotent.
    pub fn stop_watchdogs(&self) {
        let stopped = self.watchdogs.stop_all(&self.tree);
        if stopped > 0 {
            info!(stopped, "Watchdogs stopped");
        }
    }

    /// Number of running refreshers.
    pub fn active_watchdogs(&self) -> usize {
        self.watchdogs.len()
    }
}

/// Merge one decoded environment value into `tree`. Returns whether it was written.
///
/// Nothing under `APP_ENV` is written once it is recorded, so the tier chosen
/// for loading stays a plain string.
fn apply_env_value(tree: &mut ConfigTree, path: &[String], value: Value) -> bool {
    if path.first().is_some_and(|key| key == APP_ENV_KEY) && tree.contains_key(APP_ENV_KEY) {
        debug!(path = %path.join("."), "Keeping existing APP_ENV");
        return false;
    }
    merge_into(tree, nest(path, value));
    true
}
