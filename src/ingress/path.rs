//! Nested field lookup in parsed control payloads
//!
//! A [`PathSpec`] is split once at construction; walking a tree never touches
//! the configured path string.

use super::position::BlindPosition;
use crate::error::DecodeError;
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Path segment separator
pub const PATH_SEPARATOR: char = '/';

/// Field holding the position in the deployed payload format
pub const DEFAULT_POSITION_PATH: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathSpecError {
    #[error("Path has no segments: '{0}'")]
    Empty(String),
}

/// Ordered, immutable sequence of object keys leading to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    segments: Vec<String>,
}

impl PathSpec {
    /// Split `path` on `/`; empty segments are skipped
    pub fn parse(path: &str) -> Result<Self, PathSpecError> {
        let segments: Vec<String> = path
            .split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            return Err(PathSpecError::Empty(path.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl Default for PathSpec {
    fn default() -> Self {
        Self {
            segments: vec![DEFAULT_POSITION_PATH.to_string()],
        }
    }
}

impl FromStr for PathSpec {
    type Err = PathSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Walk `tree` along `path` and read the leaf as a blind position.
///
/// Lookups are case-sensitive. The leaf must be an integer in `0..=100`;
/// fractional numbers are a type mismatch and out-of-range integers are
/// rejected rather than clamped.
pub fn extract_position(tree: &Value, path: &PathSpec) -> Result<BlindPosition, DecodeError> {
    if is_empty_tree(tree) {
        return Err(DecodeError::EmptyInput);
    }

    let mut node = tree;
    for segment in path.segments() {
        node = node
            .as_object()
            .and_then(|object| object.get(segment))
            .ok_or_else(|| DecodeError::field_not_found(segment.as_str()))?;
    }

    read_position(node)
}

fn is_empty_tree(tree: &Value) -> bool {
    match tree {
        Value::Null => true,
        Value::Object(object) => object.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn read_position(leaf: &Value) -> Result<BlindPosition, DecodeError> {
    let Value::Number(number) = leaf else {
        return Err(DecodeError::TypeMismatch {
            found: json_type_name(leaf),
        });
    };

    if let Some(value) = number.as_i64() {
        BlindPosition::try_from(value)
    } else if let Some(value) = number.as_u64() {
        BlindPosition::try_from(value)
    } else {
        read_float_position(number)
    }
}

/// Whole numbers written in float form (`100.0`, `1e2`) count as integers.
/// Fractions inside the range are a type mismatch; anything outside is out of range.
fn read_float_position(number: &Number) -> Result<BlindPosition, DecodeError> {
    let Some(value) = number.as_f64() else {
        return Err(DecodeError::TypeMismatch { found: "number" });
    };

    if value.fract() == 0.0 && value.abs() < i128::MAX as f64 {
        return BlindPosition::from_integer(value as i128);
    }

    let range = f64::from(BlindPosition::MIN)..=f64::from(BlindPosition::MAX);
    if range.contains(&value) {
        Err(DecodeError::TypeMismatch { found: "float" })
    } else {
        Err(DecodeError::OutOfRangeFloat {
            rendered: number.to_string(),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> PathSpec {
        PathSpec::parse(p).unwrap()
    }

    #[test]
    fn test_parse_splits_segments() {
        assert_eq!(path("value").segments(), ["value"]);
        assert_eq!(path("state/target/value").segments(), ["state", "target", "value"]);
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        assert_eq!(path("/state//value/").segments(), ["state", "value"]);
    }

    #[test]
    fn test_parse_rejects_empty_path() {
        assert!(matches!(PathSpec::parse(""), Err(PathSpecError::Empty(_))));
        assert!(matches!(PathSpec::parse("///"), Err(PathSpecError::Empty(_))));
    }

    #[test]
    fn test_default_path_is_value() {
        assert_eq!(PathSpec::default(), path("value"));
        assert_eq!(PathSpec::default().to_string(), "value");
    }

    #[test]
    fn test_extract_single_segment() {
        let tree = json!({"value": 55});
        assert_eq!(
            extract_position(&tree, &PathSpec::default()),
            Ok(BlindPosition::new(55).unwrap())
        );
    }

    #[test]
    fn test_extract_nested_segments() {
        let tree = json!({"state": {"target": {"value": 12}}, "value": 99});
        assert_eq!(
            extract_position(&tree, &path("state/target/value")),
            Ok(BlindPosition::new(12).unwrap())
        );
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let tree = json!({"Value": 10});
        assert_eq!(
            extract_position(&tree, &PathSpec::default()),
            Err(DecodeError::field_not_found("value"))
        );
    }

    #[test]
    fn test_missing_intermediate_field() {
        let tree = json!({"state": {"value": 10}});
        assert_eq!(
            extract_position(&tree, &path("state/target/value")),
            Err(DecodeError::field_not_found("target"))
        );
    }

    #[test]
    fn test_descending_into_scalar_is_field_not_found() {
        let tree = json!({"state": 3});
        assert_eq!(
            extract_position(&tree, &path("state/value")),
            Err(DecodeError::field_not_found("value"))
        );
    }

    #[test]
    fn test_empty_trees() {
        for tree in [json!(null), json!({}), json!([])] {
            assert_eq!(
                extract_position(&tree, &PathSpec::default()),
                Err(DecodeError::EmptyInput),
                "tree: {tree}"
            );
        }
    }

    #[test]
    fn test_non_numeric_leaf() {
        let cases = [
            (json!({"value": "abc"}), "string"),
            (json!({"value": true}), "boolean"),
            (json!({"value": null}), "null"),
            (json!({"value": [1]}), "array"),
            (json!({"value": {"x": 1}}), "object"),
        ];
        for (tree, found) in cases {
            assert_eq!(
                extract_position(&tree, &PathSpec::default()),
                Err(DecodeError::TypeMismatch { found })
            );
        }
    }

    #[test]
    fn test_fractional_leaf_is_type_mismatch() {
        let tree = json!({"value": 42.5});
        assert_eq!(
            extract_position(&tree, &PathSpec::default()),
            Err(DecodeError::TypeMismatch { found: "float" })
        );
    }

    #[test]
    fn test_whole_floats_are_integers() {
        for (payload, expected) in [("100.0", 100u8), ("1e2", 100), ("0.0", 0), ("-0.0", 0)] {
            let tree: Value = serde_json::from_str(&format!(r#"{{"value": {payload}}}"#)).unwrap();
            assert_eq!(
                extract_position(&tree, &PathSpec::default()),
                Ok(BlindPosition::new(expected).unwrap()),
                "Failed for {payload}"
            );
        }
    }

    #[test]
    fn test_float_form_out_of_range() {
        let decode = |payload: &str| {
            let tree: Value = serde_json::from_str(&format!(r#"{{"value": {payload}}}"#)).unwrap();
            extract_position(&tree, &PathSpec::default())
        };

        assert_eq!(decode("1e3"), Err(DecodeError::OutOfRange { value: 1000 }));
        assert_eq!(
            decode("18446744073709551616"),
            Err(DecodeError::OutOfRange {
                value: 18_446_744_073_709_551_616
            })
        );
        assert!(matches!(
            decode("150.5"),
            Err(DecodeError::OutOfRangeFloat { rendered }) if rendered == "150.5"
        ));
        assert!(matches!(decode("-0.5"), Err(DecodeError::OutOfRangeFloat { .. })));
        assert!(matches!(decode("1e40"), Err(DecodeError::OutOfRangeFloat { .. })));
        assert_eq!(decode("42.5"), Err(DecodeError::TypeMismatch { found: "float" }));
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        for value in [-1i64, 101, 255] {
            let tree = json!({ "value": value });
            assert_eq!(
                extract_position(&tree, &PathSpec::default()),
                Err(DecodeError::OutOfRange {
                    value: i128::from(value)
                })
            );
        }
    }
}
