//! Deep merge for configuration trees.
//!
//! Implements field-by-field merging where the later source overrides the earlier one.
//! Arrays are replaced entirely, not concatenated.

use super::ConfigTree;
use serde_json::Value;

/// Merge `source` into `target` in place, with `source` taking precedence.
///
/// - Mappings present on both sides are merged recursively
/// - Arrays, strings, numbers, booleans and nulls from `source` replace the target value
/// - Keys only present in `target` are kept untouched
///
/// A key missing from `target` behaves as an empty mapping, so a nested object in
/// `source` lands in full.
pub fn merge_into(target: &mut ConfigTree, source: ConfigTree) {
    for (key, source_value) in source {
        let Value::Object(source_map) = source_value else {
            target.insert(key, source_value);
            continue;
        };
        if let Some(Value::Object(target_map)) = target.get_mut(&key) {
            merge_into(target_map, source_map);
        } else {
            target.insert(key, Value::Object(source_map));
        }
    }
}

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// # Example
/// ```
/// use serde_json::json;
/// use config_aggregator::config::deep_merge;
///
/// let base = json!({
///     "db": { "host": "127.0.0.1", "engine": "mariadb" },
///     "hosts": ["a", "b"]
/// });
/// let overlay = json!({
///     "db": { "host": "https://someRemoteUrl" },
///     "hosts": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result["db"]["engine"], "mariadb");
/// assert_eq!(result["db"]["host"], "https://someRemoteUrl");
/// assert_eq!(result["hosts"], json!(["c"]));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            merge_into(&mut base_map, overlay_map);
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
///
/// Starts from an empty mapping, so an empty input yields `{}`.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values
        .into_iter()
        .fold(Value::Object(ConfigTree::new()), deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_merge_simple_objects() {
        let base = json!({"a": 1, "b": 2});
        let overlay = json!({"b": 3, "c": 4});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_objects() {
        let base = json!({
            "auth": {"client_id": 1, "url": "http://localhost"},
            "version": 2
        });
        let overlay = json!({
            "auth": {"client_id": 30}
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "auth": {"client_id": 30, "url": "http://localhost"},
                "version": 2
            })
        );
    }

    #[test]
    fn test_arrays_replaced_not_merged() {
        let base = json!({"items": ["a", "b", "c"]});
        let overlay = json!({"items": ["d"]});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"items": ["d"]}));
    }

    #[test]
    fn test_null_in_source_replaces() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"a": null, "b": {"c": null}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": null, "b": {"c": null}}));
    }

    #[test]
    fn test_disjoint_keys_union() {
        let base = json!({"app": {"version": 2}});
        let overlay = json!({"db": {"default_connection": "users"}});
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({"app": {"version": 2}, "db": {"default_connection": "users"}})
        );
    }

    #[test]
    fn test_missing_target_key_takes_whole_subtree() {
        let mut target = tree(json!({"app": {"version": 2}}));
        merge_into(
            &mut target,
            tree(json!({"db": {"connections": {"users": {"host": "h"}}}})),
        );
        assert_eq!(
            Value::Object(target),
            json!({"app": {"version": 2}, "db": {"connections": {"users": {"host": "h"}}}})
        );
    }

    #[test]
    fn test_empty_target() {
        let mut target = ConfigTree::new();
        merge_into(&mut target, tree(json!({"a": {"b": 1}})));
        assert_eq!(Value::Object(target), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_absent_base_value() {
        let result = deep_merge(Value::Null, json!({"a": 1}));
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn test_deep_nested_merge() {
        let base = json!({
            "db": {
                "connections": {
                    "users": {"engine": "mariadb", "host": "127.0.0.1"}
                }
            }
        });
        let overlay = json!({
            "db": {
                "connections": {
                    "users": {"host": "https://someRemoteUrl", "user": "prod"}
                }
            }
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "db": {
                    "connections": {
                        "users": {
                            "engine": "mariadb",
                            "host": "https://someRemoteUrl",
                            "user": "prod"
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_merge_all() {
        let values = vec![json!({"a": 1}), json!({"b": 2}), json!({"a": 3, "c": 4})];
        let result = deep_merge_all(values);
        assert_eq!(result, json!({"a": 3, "b": 2, "c": 4}));
    }

    #[test]
    fn test_merge_all_empty() {
        assert_eq!(deep_merge_all(Vec::new()), json!({}));
    }

    #[test]
    fn test_overlay_replaces_primitive_with_object() {
        let base = json!({"value": 42});
        let overlay = json!({"value": {"nested": true}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": {"nested": true}}));
    }

    #[test]
    fn test_overlay_replaces_object_with_primitive() {
        let base = json!({"value": {"nested": true}});
        let overlay = json!({"value": 42});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": 42}));
    }

    #[test]
    fn test_overlay_replaces_array_with_object() {
        let base = json!({"value": ["a"]});
        let overlay = json!({"value": {"a": 1}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": {"a": 1}}));
    }
}
