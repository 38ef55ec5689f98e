//! Process environment overlay.
//!
//! Variables named `CONFIG__[TYPETAG__]segment1__segment2...` map onto nested
//! configuration paths:
//!
//! - `CONFIG__db__password=x` sets `db.password` to `"x"`
//! - `CONFIG__int__app__version=3` sets `app.version` to `3`
//! - `CONFIG__APP_ENV=production` selects the environment tier
//!
//! Type tags are matched case-sensitively and only in lowercase
//! (`str`, `int`, `bool`, `array` and their long forms), so `CONFIG__STR__x`
//! sets `STR.x`.
//!
//! By default a `.env` file in the working directory supplies variables too.
//! Its entries sit under the real process environment: a variable set in both
//! places takes the process value. The file is read, never exported into the
//! process.

use super::coerce::TypeTag;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Separator between the prefix, the optional type tag and path segments.
pub const ENV_SEPARATOR: &str = "__";

/// Default variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "CONFIG";

/// Top-level key recording the loaded environment tier.
pub const APP_ENV_KEY: &str = "APP_ENV";

/// Dotenv file read by the default environment source.
pub const DEFAULT_DOTENV_FILE: &str = ".env";

/// Where environment variables are read from.
#[derive(Debug, Clone)]
pub enum EnvSource {
    /// Snapshot the process environment on every read
    Process,
    /// Process environment layered over the entries of a dotenv file
    Dotenv(PathBuf),
    /// A fixed set of variables
    Fixed(BTreeMap<String, String>),
}

impl Default for EnvSource {
    fn default() -> Self {
        EnvSource::Dotenv(PathBuf::from(DEFAULT_DOTENV_FILE))
    }
}

impl EnvSource {
    /// Build a fixed source from key/value pairs.
    pub fn fixed<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        EnvSource::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Process environment over the dotenv file at `path`.
    pub fn dotenv(path: impl Into<PathBuf>) -> Self {
        EnvSource::Dotenv(path.into())
    }

    /// Current variables, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        match self {
            EnvSource::Process => std::env::vars().collect(),
            EnvSource::Dotenv(path) => {
                let mut vars = read_dotenv(path);
                vars.extend(std::env::vars());
                vars
            }
            EnvSource::Fixed(vars) => vars.clone(),
        }
    }

    /// Read a single variable. Empty values count as unset.
    pub fn var(&self, key: &str) -> Option<String> {
        let process = || std::env::var(key).ok().filter(|v| !v.is_empty());
        match self {
            EnvSource::Process => process(),
            EnvSource::Dotenv(path) => {
                process().or_else(|| read_dotenv(path).remove(key).filter(|v| !v.is_empty()))
            }
            EnvSource::Fixed(vars) => vars.get(key).filter(|v| !v.is_empty()).cloned(),
        }
    }
}

/// Entries of a dotenv file. A missing file is empty; malformed lines are
/// skipped with a warning.
fn read_dotenv(path: &Path) -> BTreeMap<String, String> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => {
            debug!(path = %path.display(), "No dotenv file");
            return BTreeMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read dotenv file");
            return BTreeMap::new();
        }
    };

    let mut vars = BTreeMap::new();
    for entry in entries {
        match entry {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping dotenv entry"),
        }
    }
    vars
}

/// A decoded environment variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvKey {
    /// Path segments below the prefix
    pub path: Vec<String>,
    /// Coercion applied to the value
    pub tag: TypeTag,
}

/// Decode a variable name against `prefix`.
///
/// Returns `None` when the name does not start with `{prefix}__`, has no path
/// segments, or contains an empty segment. A recognised type tag right after
/// the prefix is consumed only if at least one path segment follows it.
pub fn decode_env_key(prefix: &str, key: &str) -> Option<EnvKey> {
    let mut segments = key.split(ENV_SEPARATOR);
    if segments.next()? != prefix {
        return None;
    }
    let mut path: Vec<String> = segments.map(str::to_string).collect();
    if path.is_empty() || path.iter().any(|s| s.is_empty()) {
        return None;
    }

    let mut tag = TypeTag::default();
    if path.len() > 1
        && let Some(parsed) = TypeTag::parse(&path[0])
    {
        tag = parsed;
        path.remove(0);
    }
    Some(EnvKey { path, tag })
}

/// Name of the variable selecting the environment tier.
pub fn app_env_var(prefix: &str) -> String {
    format!("{prefix}{ENV_SEPARATOR}{APP_ENV_KEY}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_plain_path() {
        let key = decode_env_key("CONFIG", "CONFIG__db__password").unwrap();
        assert_eq!(key.path, vec!["db", "password"]);
        assert_eq!(key.tag, TypeTag::String);
    }

    #[test]
    fn test_decode_typed_path() {
        let key = decode_env_key("CONFIG", "CONFIG__int__app__version").unwrap();
        assert_eq!(key.path, vec!["app", "version"]);
        assert_eq!(key.tag, TypeTag::Integer);

        let key = decode_env_key("CONFIG", "CONFIG__array__app__hosts").unwrap();
        assert_eq!(key.path, vec!["app", "hosts"]);
        assert_eq!(key.tag, TypeTag::Array);
    }

    #[test]
    fn test_decode_uppercase_tag_is_a_section() {
        let key = decode_env_key("CONFIG", "CONFIG__STR__x").unwrap();
        assert_eq!(key.path, vec!["STR", "x"]);
        assert_eq!(key.tag, TypeTag::String);

        let key = decode_env_key("CONFIG", "CONFIG__INT__x").unwrap();
        assert_eq!(key.path, vec!["INT", "x"]);
        assert_eq!(key.tag, TypeTag::String);
    }

    #[test]
    fn test_decode_tag_alone_is_a_key() {
        let key = decode_env_key("CONFIG", "CONFIG__bool").unwrap();
        assert_eq!(key.path, vec!["bool"]);
        assert_eq!(key.tag, TypeTag::String);
    }

    #[test]
    fn test_decode_app_env() {
        let key = decode_env_key("CONFIG", "CONFIG__APP_ENV").unwrap();
        assert_eq!(key.path, vec!["APP_ENV"]);
    }

    #[test]
    fn test_decode_rejects_foreign_names() {
        assert_eq!(decode_env_key("CONFIG", "db__password"), None);
        assert_eq!(decode_env_key("CONFIG", "CONFIG"), None);
        assert_eq!(decode_env_key("CONFIG", "CONFIGURE__db"), None);
        assert_eq!(decode_env_key("CONFIG", "CONFIG__db____password"), None);
        assert_eq!(decode_env_key("CONFIG", "OS_VERSION"), None);
    }

    #[test]
    fn test_decode_custom_prefix() {
        let key = decode_env_key("MYAPP", "MYAPP__db__user").unwrap();
        assert_eq!(key.path, vec!["db", "user"]);
        assert_eq!(decode_env_key("MYAPP", "CONFIG__db__user"), None);
    }

    #[test]
    fn test_fixed_source() {
        let env = EnvSource::fixed([("CONFIG__APP_ENV", "production"), ("EMPTY", "")]);
        assert_eq!(env.var("CONFIG__APP_ENV").as_deref(), Some("production"));
        assert_eq!(env.var("EMPTY"), None);
        assert_eq!(env.var("MISSING"), None);
        assert_eq!(env.snapshot().len(), 2);
    }

    #[test]
    fn test_dotenv_entries_are_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".env");
        std::fs::write(
            &path,
            "CONFIG_AGGREGATOR_TEST__db__password=fromdotenv\nCONFIG_AGGREGATOR_TEST__EMPTY=\n",
        )
        .unwrap();

        let env = EnvSource::dotenv(&path);
        assert_eq!(
            env.var("CONFIG_AGGREGATOR_TEST__db__password").as_deref(),
            Some("fromdotenv")
        );
        assert_eq!(env.var("CONFIG_AGGREGATOR_TEST__EMPTY"), None);
        assert_eq!(
            env.snapshot()
                .get("CONFIG_AGGREGATOR_TEST__db__password")
                .map(String::as_str),
            Some("fromdotenv")
        );
        // The file is never exported into the process.
        assert!(std::env::var("CONFIG_AGGREGATOR_TEST__db__password").is_err());
    }

    #[test]
    fn test_process_environment_beats_dotenv() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".env");
        std::fs::write(&path, "PATH=/from/dotenv\n").unwrap();

        let env = EnvSource::dotenv(&path);
        let expected = std::env::var("PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "/from/dotenv".to_string());
        assert_eq!(env.var("PATH"), Some(expected.clone()));
        assert_eq!(env.snapshot().get("PATH"), Some(&expected));
    }

    #[test]
    fn test_missing_dotenv_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let env = EnvSource::dotenv(temp.path().join(".env"));
        assert_eq!(env.var("CONFIG_AGGREGATOR_TEST__missing"), None);
        assert_eq!(env.snapshot().len(), std::env::vars().count());
    }

    #[test]
    fn test_app_env_var() {
        assert_eq!(app_env_var("CONFIG"), "CONFIG__APP_ENV");
    }
}
