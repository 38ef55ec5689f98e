//! Dotted-path addressing into a configuration tree.

use super::ConfigTree;
use serde_json::Value;
use tracing::warn;

/// Split `app.auth.client_id` into its segments. Empty segments are dropped.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Look up a dotted path. Any missing segment yields `None`.
pub fn get_path<'a>(tree: &'a ConfigTree, path: &str) -> Option<&'a Value> {
    let segments = split_path(path);
    let (first, rest) = segments.split_first()?;
    rest.iter()
        .try_fold(tree.get(*first)?, |value, segment| value.get(*segment))
}

/// Write `value` at a dotted path, creating intermediate mappings as needed.
///
/// A non-mapping value sitting on the path is replaced by a mapping.
pub fn set_path(tree: &mut ConfigTree, path: &str, value: Value) {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        warn!(path, "Ignoring write to empty config path");
        return;
    };

    let mut current = tree;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(ConfigTree::new()));
        if !slot.is_object() {
            *slot = Value::Object(ConfigTree::new());
        }
        current = match slot {
            Value::Object(next) => next,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

/// Build a single-branch tree holding `value` at `segments`.
///
/// `nest(&["db", "password"], v)` is `{"db": {"password": v}}`.
pub fn nest<S: AsRef<str>>(segments: &[S], value: Value) -> ConfigTree {
    let Some((last, parents)) = segments.split_last() else {
        return ConfigTree::new();
    };

    let mut leaf = ConfigTree::new();
    leaf.insert(last.as_ref().to_string(), value);
    parents.iter().rev().fold(leaf, |inner, segment| {
        let mut map = ConfigTree::new();
        map.insert(segment.as_ref().to_string(), Value::Object(inner));
        map
    })
}
