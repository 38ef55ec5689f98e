//! Layered configuration engine.
//!
//! Consolidates configuration from four tiers with field-by-field deep merging:
//! 1. **Defaults** - files in `{config_dir}/default/`
//! 2. **Environment** - files in `{config_dir}/{APP_ENV}/`
//! 3. **Process environment** - `CONFIG__[TYPE__]section__key` variables
//! 4. **Connectors** - live sources, optionally re-merged on a timer
//!
//! ## Merge Strategy
//! - Mappings merge recursively, later tiers win on conflicts
//! - Arrays and scalars are replaced wholesale
//!
//! ## Environment Variables
//! - `CONFIG__APP_ENV` - Environment tier directory (default: `default`)
//! - Entries of `./.env` apply as well, under the real process environment
//! - `CONFIG__db__password` - Sets `db.password` as a string
//! - `CONFIG__int__app__version` - Sets `app.version` as a number
//!   (tags: `str`, `int`, `bool`, `array` and their long forms)

mod coerce;
mod connector;
mod env;
mod files;
mod merge;
mod path;
mod store;
mod tree;
pub mod watchdog;
pub mod watcher;

pub use coerce::{TypeTag, cast};
pub use connector::{Connector, ConnectorEntry, ConnectorOptions, DEFAULT_REFRESH_INTERVAL};
pub use env::{
    APP_ENV_KEY, DEFAULT_DOTENV_FILE, DEFAULT_ENV_PREFIX, ENV_SEPARATOR, EnvKey, EnvSource,
    app_env_var, decode_env_key,
};
pub use files::{FileFormat, SectionFile, TierContents, read_tier, section_name};
pub use merge::{deep_merge, deep_merge_all, merge_into};
pub use path::{get_path, nest, set_path, split_path};
pub use store::{ConfigStore, DEFAULT_CONNECTOR_TIMEOUT, DEFAULT_TIER};
pub use tree::SharedTree;
pub use watchdog::{ConnectorId, WatchdogRegistry};

/// A configuration tree: string keys mapping to scalars, arrays or nested trees.
pub type ConfigTree = serde_json::Map<String, serde_json::Value>;
