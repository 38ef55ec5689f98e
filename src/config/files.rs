//! Tier directory loading.
//!
//! Every file in a tier directory becomes one top-level section keyed by its
//! basename: `config/default/db.json` populates `db`. JSON and YAML files share
//! the same value model.

use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parser selected from a file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// `.yaml`/`.yml` are YAML; everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                FileFormat::Yaml
            }
            _ => FileFormat::Json,
        }
    }

    /// Parse file content into a configuration value.
    pub fn parse(self, path: &Path, content: &str) -> ConfigResult<Value> {
        match self {
            FileFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::parse(path, e))
            }
            FileFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::parse(path, e))
            }
        }
    }
}

/// One parsed tier file.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionFile {
    /// Top-level key (file basename without extension)
    pub section: String,
    /// Parsed file content
    pub content: Value,
    /// Where the content came from
    pub path: PathBuf,
}

/// Everything read from one tier directory.
#[derive(Debug, Default)]
pub struct TierContents {
    /// Successfully parsed files, in filename order
    pub sections: Vec<SectionFile>,
    /// Files that could not be read or parsed
    pub failures: Vec<ConfigError>,
}

/// Section key for a tier file: its name with the final extension removed.
///
/// Hidden files and names without a stem are skipped.
pub fn section_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Read and parse a single tier file.
pub fn read_section_file(path: &Path) -> ConfigResult<Option<SectionFile>> {
    let Some(section) = section_name(path) else {
        debug!(path = %path.display(), "Skipping file without a section name");
        return Ok(None);
    };
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    let content = FileFormat::from_path(path).parse(path, &content)?;
    Ok(Some(SectionFile {
        section,
        content,
        path: path.to_path_buf(),
    }))
}

/// Read every file in a tier directory.
///
/// A missing directory is an error; individual bad files are collected in
/// [`TierContents::failures`] and do not stop the rest of the tier.
pub fn read_tier(dir: &Path) -> ConfigResult<TierContents> {
    if !dir.is_dir() {
        return Err(ConfigError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::read(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut contents = TierContents::default();
    for path in paths {
        match read_section_file(&path) {
            Ok(Some(file)) => contents.sections.push(file),
            Ok(None) => {}
            Err(e) => contents.failures.push(e),
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_section_name() {
        assert_eq!(section_name(Path::new("config/default/db.json")), Some("db".into()));
        assert_eq!(
            section_name(Path::new("config/default/app.local.json")),
            Some("app.local".into())
        );
        assert_eq!(section_name(Path::new("config/default/app")), Some("app".into()));
        assert_eq!(section_name(Path::new("config/default/.gitkeep")), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("a.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a.yaml")), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.YML")), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.conf")), FileFormat::Json);
    }

    #[test]
    fn test_read_tier_json_and_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.json"), r#"{"version": 2}"#).unwrap();
        std::fs::write(temp.path().join("db.yaml"), "default_connection: users\n").unwrap();

        let contents = read_tier(temp.path()).unwrap();
        assert!(contents.failures.is_empty());
        assert_eq!(contents.sections.len(), 2);
        assert_eq!(contents.sections[0].section, "app");
        assert_eq!(contents.sections[0].content, json!({"version": 2}));
        assert_eq!(contents.sections[1].section, "db");
        assert_eq!(
            contents.sections[1].content,
            json!({"default_connection": "users"})
        );
    }

    #[test]
    fn test_read_tier_collects_bad_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.json"), r#"{"version": 2}"#).unwrap();
        std::fs::write(temp.path().join("broken.json"), "{ not json").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();

        let contents = read_tier(temp.path()).unwrap();
        assert_eq!(contents.sections.len(), 1);
        assert_eq!(contents.failures.len(), 1);
        assert!(matches!(contents.failures[0], ConfigError::Parse { .. }));
    }

    #[test]
    fn test_read_tier_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = read_tier(&temp.path().join("staging"));
        assert!(matches!(result, Err(ConfigError::MissingDirectory { .. })));
    }
}
