//! Recursive merge of YAML settings trees.
//!
//! Two mappings merge key by key; a key present in both is merged
//! recursively when both values are mappings, otherwise the later value
//! wins. Any other pair of values resolves to the later one.

use serde_yaml::Value;

/// Merges `right` into `left`, with `right` taking precedence.
pub fn deep_merge(left: &mut Value, right: Value) {
    match (left, right) {
        (Value::Mapping(left_map), Value::Mapping(right_map)) => {
            for (key, right_value) in right_map {
                if let Some(left_value) = left_map.get_mut(&key) {
                    deep_merge(left_value, right_value);
                } else {
                    left_map.insert(key, right_value);
                }
            }
        }
        (left, right) => {
            *left = right;
        }
    }
}

/// Folds a sequence of trees into one, later trees winning.
#[must_use]
pub fn merge_all(trees: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Mapping(serde_yaml::Mapping::new());
    for tree in trees {
        deep_merge(&mut merged, tree);
    }
    merged
}
