//! Connector contract for live configuration sources.
//!
//! A connector is anything that can hand back a partial configuration tree:
//! a database table, a remote config service, a secrets file. The store calls
//! it once during loading and, for periodic connectors, again on every tick.

use super::ConfigTree;
use crate::error::ConnectorError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Refresh interval used when a periodic connector does not set its own.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// A pluggable configuration source.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use config_aggregator::config::{ConfigTree, Connector};
/// use config_aggregator::error::ConnectorError;
/// use serde_json::json;
/// use std::time::Duration;
///
/// struct DbConnector;
///
/// #[async_trait]
/// impl Connector for DbConnector {
///     fn name(&self) -> &str {
///         "db"
///     }
///
///     fn is_periodic(&self) -> bool {
///         true
///     }
///
///     fn timeout(&self) -> Duration {
///         Duration::from_secs(3)
///     }
///
///     async fn return_config(&self) -> Result<ConfigTree, ConnectorError> {
///         match json!({"app": {"auth": {"client_id": 787878}}}) {
///             serde_json::Value::Object(tree) => Ok(tree),
///             _ => Err(ConnectorError::failed("not a mapping")),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether the store should keep refreshing this connector on a timer.
    fn is_periodic(&self) -> bool {
        false
    }

    /// Default refresh interval. Read once when the connector is loaded.
    fn timeout(&self) -> Duration {
        DEFAULT_REFRESH_INTERVAL
    }

    /// Prepare the connector. Called before the first `return_config`.
    async fn init(&self, _options: &ConnectorOptions) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Produce the connector's current configuration.
    ///
    /// Must not touch the process environment. Implementations doing I/O
    /// should bound it with their own timeout.
    async fn return_config(&self) -> Result<ConfigTree, ConnectorError>;
}

/// Options handed to [`Connector::init`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorOptions {
    /// Overrides the connector's own refresh interval
    pub timeout: Option<Duration>,
    /// Anything else; connectors ignore what they do not recognise
    pub extra: ConfigTree,
}

impl ConnectorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A connector registered with the store, together with its init options.
#[derive(Clone)]
pub struct ConnectorEntry {
    pub connector: Arc<dyn Connector>,
    pub options: ConnectorOptions,
}

impl ConnectorEntry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            options: ConnectorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConnectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Interval between refreshes: the init override, else the connector's own.
    pub fn refresh_interval(&self) -> Duration {
        self.options
            .timeout
            .unwrap_or_else(|| self.connector.timeout())
    }
}

impl std::fmt::Debug for ConnectorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorEntry")
            .field("name", &self.connector.name())
            .field("periodic", &self.connector.is_periodic())
            .field("options", &self.options)
            .finish()
    }
}

impl<C: Connector + 'static> From<C> for ConnectorEntry {
    fn from(connector: C) -> Self {
        Self::new(Arc::new(connector))
    }
}

/// Run [`Connector::init`] bounded by `limit`.
pub(crate) async fn init_connector(
    entry: &ConnectorEntry,
    limit: Duration,
) -> Result<(), ConnectorError> {
    tokio::time::timeout(limit, entry.connector.init(&entry.options))
        .await
        .map_err(|_| ConnectorError::TimedOut(limit))?
}

/// Run [`Connector::return_config`] bounded by `limit`.
pub(crate) async fn fetch_config(
    connector: &dyn Connector,
    limit: Duration,
) -> Result<ConfigTree, ConnectorError> {
    tokio::time::timeout(limit, connector.return_config())
        .await
        .map_err(|_| ConnectorError::TimedOut(limit))?
}
