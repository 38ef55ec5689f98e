//! String-to-value coercion for environment overrides.
//!
//! Environment variables are always strings; a type tag in the variable name
//! (`CONFIG__int__app__version`) selects how the raw value is interpreted.

use regex_lite::Regex;
use serde_json::{Number, Value};
use std::sync::LazyLock;
use tracing::warn;

static ARRAY_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\[(.*)\]$").ok());

/// Target type for a raw string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeTag {
    #[default]
    String,
    Integer,
    Boolean,
    Array,
}

impl TypeTag {
    /// Parse a lowercase type tag (`str`, `string`, `int`, `integer`, `bool`,
    /// `boolean`, `arr`, `array`). Matching is case-sensitive.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "str" | "string" => Some(TypeTag::String),
            "int" | "integer" => Some(TypeTag::Integer),
            "bool" | "boolean" => Some(TypeTag::Boolean),
            "arr" | "array" => Some(TypeTag::Array),
            _ => None,
        }
    }

    /// Convert `raw` into this type. Never fails.
    pub fn cast(self, raw: &str) -> Value {
        match self {
            TypeTag::String => Value::String(raw.to_string()),
            TypeTag::Integer => cast_number(raw),
            TypeTag::Boolean => Value::Bool(cast_bool(raw)),
            TypeTag::Array => cast_array(raw),
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTag::String => write!(f, "string"),
            TypeTag::Integer => write!(f, "integer"),
            TypeTag::Boolean => write!(f, "boolean"),
            TypeTag::Array => write!(f, "array"),
        }
    }
}

/// Cast `raw` according to a textual type tag.
///
/// Unknown tags fall back to the string cast with a warning.
pub fn cast(raw: &str, tag: &str) -> Value {
    match TypeTag::parse(tag) {
        Some(tag) => tag.cast(raw),
        None => {
            warn!(tag, "Unknown type tag, falling back to string");
            TypeTag::String.cast(raw)
        }
    }
}

/// Base-10 numeric parse. Non-numeric input yields `Value::Null` as the
/// not-a-number marker.
fn cast_number(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
    {
        return Value::Number(number);
    }
    warn!(value = raw, "Not a number, storing null");
    Value::Null
}

/// `false` for empty input, `"0"` and `"false"` (any case); `true` otherwise.
fn cast_bool(raw: &str) -> bool {
    let normalized = raw.trim().to_lowercase();
    !matches!(normalized.as_str(), "" | "0" | "false")
}

/// `[a, b, c]` becomes `["a", "b", "c"]`; anything else is an empty array.
fn cast_array(raw: &str) -> Value {
    let inner = ARRAY_PATTERN
        .as_ref()
        .and_then(|re| re.captures(raw.trim()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim());

    match inner {
        Some("") | None => Value::Array(Vec::new()),
        Some(items) => Value::Array(
            items
                .split(',')
                .map(|item| Value::String(item.trim().to_string()))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tags() {
        assert_eq!(TypeTag::parse("str"), Some(TypeTag::String));
        assert_eq!(TypeTag::parse("string"), Some(TypeTag::String));
        assert_eq!(TypeTag::parse("int"), Some(TypeTag::Integer));
        assert_eq!(TypeTag::parse("integer"), Some(TypeTag::Integer));
        assert_eq!(TypeTag::parse("bool"), Some(TypeTag::Boolean));
        assert_eq!(TypeTag::parse("boolean"), Some(TypeTag::Boolean));
        assert_eq!(TypeTag::parse("arr"), Some(TypeTag::Array));
        assert_eq!(TypeTag::parse("array"), Some(TypeTag::Array));
        assert_eq!(TypeTag::parse("db"), None);
    }

    #[test]
    fn test_parse_tags_is_case_sensitive() {
        assert_eq!(TypeTag::parse("INT"), None);
        assert_eq!(TypeTag::parse("Array"), None);
        assert_eq!(TypeTag::parse("STR"), None);
    }

    #[test]
    fn test_cast_string() {
        assert_eq!(cast("hello", "str"), json!("hello"));
        assert_eq!(cast(" spaced ", "string"), json!(" spaced "));
    }

    #[test]
    fn test_cast_integer() {
        assert_eq!(cast("42", "int"), json!(42));
        assert_eq!(cast(" -7 ", "integer"), json!(-7));
        assert_eq!(cast("2.5", "int"), json!(2.5));
    }

    #[test]
    fn test_cast_integer_not_a_number() {
        assert_eq!(cast("forty-two", "int"), Value::Null);
        assert_eq!(cast("", "int"), Value::Null);
        assert_eq!(cast("NaN", "int"), Value::Null);
    }

    #[test]
    fn test_cast_bool() {
        assert_eq!(cast("false", "bool"), json!(false));
        assert_eq!(cast(" FALSE ", "bool"), json!(false));
        assert_eq!(cast("0", "boolean"), json!(false));
        assert_eq!(cast("", "bool"), json!(false));
        assert_eq!(cast("TRUE", "bool"), json!(true));
        assert_eq!(cast("1", "bool"), json!(true));
        assert_eq!(cast("no", "bool"), json!(true));
    }

    #[test]
    fn test_cast_array() {
        assert_eq!(cast("[a, b, c]", "array"), json!(["a", "b", "c"]));
        assert_eq!(cast("[single]", "arr"), json!(["single"]));
        assert_eq!(cast("[]", "array"), json!([]));
        assert_eq!(cast("[ ]", "array"), json!([]));
    }

    #[test]
    fn test_cast_array_without_brackets() {
        assert_eq!(cast("a, b, c", "array"), json!([]));
        assert_eq!(cast("[a, b", "array"), json!([]));
    }

    #[test]
    fn test_unknown_tag_falls_back_to_string() {
        assert_eq!(cast("x", "unknown-type"), json!("x"));
    }
}
