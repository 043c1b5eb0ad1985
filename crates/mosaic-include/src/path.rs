//! Dotted-path addressing into context trees.
//!
//! Paths are plain `.`-separated member names (`meta.colors.0`). Objects are
//! indexed by key, arrays by numeric segment. Reading a member that does not
//! exist yields `None`, but stepping *through* a missing or `null` value is an
//! error: callers decide what an absent result means, while a broken
//! intermediate surfaces where it happens.

use serde_json::Value;
use tracing::trace;

use crate::error::{IncludeError, Result};

/// Addresses `path` inside `tree`.
///
/// A `None` path returns the tree itself. With `omit_last_segment` the final
/// segment is dropped before traversal, which yields the container that holds
/// the addressed value rather than the value.
///
/// # Errors
///
/// [`IncludeError::PathNotFound`] if a segment has to be read from a missing
/// or `null` value.
///
/// # Example
///
/// ```rust
/// use mosaic_include::get_by_path;
/// use serde_json::json;
///
/// let tree = json!({"a": {"b": {"c": 1}}});
/// assert_eq!(get_by_path(&tree, Some("a.b.c"), false).unwrap(), Some(&json!(1)));
/// assert_eq!(get_by_path(&tree, Some("a.b.c"), true).unwrap(), Some(&json!({"c": 1})));
/// assert_eq!(get_by_path(&tree, Some("a.x"), false).unwrap(), None);
/// assert!(get_by_path(&tree, Some("a.x.y"), false).is_err());
/// ```
pub fn get_by_path<'a>(
    tree: &'a Value,
    path: Option<&str>,
    omit_last_segment: bool,
) -> Result<Option<&'a Value>> {
    let Some(path) = path else {
        return Ok(Some(tree));
    };

    let mut segments: Vec<&str> = path.split('.').collect();
    if omit_last_segment {
        segments.pop();
    }

    let mut current = Some(tree);
    for segment in segments {
        current = member(current, segment, path)?;
    }
    trace!(path, omit_last_segment, found = current.is_some(), "addressed path");
    Ok(current)
}

/// Reads a single member of `value`.
///
/// `path` is only used to describe the failure.
pub fn member<'a>(value: Option<&'a Value>, segment: &str, path: &str) -> Result<Option<&'a Value>> {
    match value {
        None | Some(Value::Null) => Err(IncludeError::PathNotFound {
            path: path.to_string(),
            segment: segment.to_string(),
        }),
        Some(Value::Object(map)) => Ok(map.get(segment)),
        Some(Value::Array(items)) => Ok(segment.parse::<usize>().ok().and_then(|i| items.get(i))),
        Some(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn none_path_returns_tree() {
        let tree = json!({"a": 1});
        assert_eq!(get_by_path(&tree, None, false).unwrap(), Some(&tree));
        assert_eq!(get_by_path(&tree, None, true).unwrap(), Some(&tree));
    }

    #[test]
    fn omitting_single_segment_returns_tree() {
        let tree = json!({"text": {"text": "Hello"}});
        assert_eq!(get_by_path(&tree, Some("text"), true).unwrap(), Some(&tree));
    }

    #[test]
    fn array_segments_index() {
        let tree = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(
            get_by_path(&tree, Some("items.1.name"), false).unwrap(),
            Some(&json!("b"))
        );
        assert_eq!(get_by_path(&tree, Some("items.9"), false).unwrap(), None);
        assert_eq!(get_by_path(&tree, Some("items.first"), false).unwrap(), None);
    }

    #[test]
    fn missing_leaf_is_none() {
        let tree = json!({"a": {}});
        assert_eq!(get_by_path(&tree, Some("a.b"), false).unwrap(), None);
    }

    #[test]
    fn scalar_member_is_none() {
        let tree = json!({"a": "text"});
        assert_eq!(get_by_path(&tree, Some("a.len"), false).unwrap(), None);
    }

    #[test]
    fn stepping_through_missing_value_fails() {
        let tree = json!({"a": {}});
        let err = get_by_path(&tree, Some("a.b.c"), false).unwrap_err();
        assert_eq!(
            err,
            IncludeError::PathNotFound {
                path: "a.b.c".into(),
                segment: "c".into()
            }
        );
    }

    #[test]
    fn stepping_through_null_fails() {
        let tree = json!({"a": null});
        assert!(get_by_path(&tree, Some("a.b"), false).is_err());
    }

    #[test]
    fn omitted_segment_is_never_read() {
        let tree = json!({"a": {}});
        // "b" is missing, and "c" is the dropped segment
        assert_eq!(get_by_path(&tree, Some("a.b.c"), true).unwrap(), None);
    }
}
