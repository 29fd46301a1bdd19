//! Externally-defined override resolution.
//!
//! A desired-state document can mark a field with the sentinel token
//! `{{EXTERNALLY_DEFINED}}` to mean "defer to whatever value currently exists
//! remotely" — the field is owned by whoever last set it outside of this
//! system. [`resolve`] replaces every sentinel-bearing occurrence of a
//! directive's field with the corresponding existing value, or applies the
//! directive's fallback when no existing value is available.
//!
//! Note:
//! - The admin settings may define the same field in several blocks, but the
//!   GitHub API retains one externally-set value only (the most recent), so
//!   every occurrence resolves against the first matching existing entry.
//! - The update API for rulesets accepts several overrides; the create API
//!   accepts one only. The [`OverrideContext`] carries that constraint so call
//!   sites don't special-case it.

use crate::errors::{SyncError, SyncResult};
use serde_json::{Map, Value};

#[cfg(test)]
#[path = "overrides_tests.rs"]
mod tests;

/// The sentinel token marking a field as externally managed. Preserved
/// byte-for-byte for compatibility with existing desired-state documents.
pub const EXTERNALLY_DEFINED: &str = "{{EXTERNALLY_DEFINED}}";

/// The shape of the empty value substituted when nothing exists remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Array,
    Object,
    Scalar,
    /// An unrecognized kind from a configuration document. Resolving a
    /// missing field through this is a configuration error.
    Other(String),
}

/// What to do when the sentinel has no existing counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnMissing {
    /// Remove the field and prune `delete_depth` ancestor levels so no
    /// dangling partial rule is sent upstream.
    Delete,
    /// Substitute the type-appropriate empty value.
    EmptyValue,
}

/// How to resolve the sentinel for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideDirective {
    /// The field key the directive applies to (matched anywhere in the tree).
    pub field: String,

    /// Shape of the empty fallback value.
    pub value_kind: ValueKind,

    /// Fallback behavior when no existing value is found.
    pub on_missing: OnMissing,

    /// Ancestor levels to prune when `on_missing` is `Delete`.
    pub delete_depth: usize,
}

impl OverrideDirective {
    /// A directive substituting an empty value of the given kind.
    pub fn empty_value(field: impl Into<String>, value_kind: ValueKind) -> Self {
        Self {
            field: field.into(),
            value_kind,
            on_missing: OnMissing::EmptyValue,
            delete_depth: 0,
        }
    }

    /// A directive deleting the field and `delete_depth` ancestor levels.
    pub fn delete(field: impl Into<String>, delete_depth: usize) -> Self {
        Self {
            field: field.into(),
            value_kind: ValueKind::Scalar,
            on_missing: OnMissing::Delete,
            delete_depth,
        }
    }

    /// Parses directives from a configuration document's `overrides` mapping:
    /// `{ field: { type: "array"|"dict", action: "delete", parents: n } }`.
    pub fn from_document(document: &Value) -> Vec<Self> {
        let Some(entries) = document.get("overrides").and_then(Value::as_object) else {
            return Vec::new();
        };

        entries
            .iter()
            .map(|(field, props)| {
                if props["action"].as_str() == Some("delete") {
                    return Self::delete(
                        field,
                        props["parents"].as_u64().unwrap_or(0) as usize,
                    );
                }
                let value_kind = match props["type"].as_str() {
                    Some("array") => ValueKind::Array,
                    Some("dict") => ValueKind::Object,
                    Some("scalar") | None => ValueKind::Scalar,
                    Some(other) => ValueKind::Other(other.to_string()),
                };
                Self::empty_value(field, value_kind)
            })
            .collect()
    }
}

/// Whether the document is destined for a create or an update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideContext {
    /// Create calls accept at most one externally-defined override.
    Create,
    /// Update calls accept several.
    Update,
}

/// One step along a path into a JSON tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Resolves every sentinel-bearing directive field in `desired` against
/// `existing`, returning the corrected document.
///
/// # Errors
///
/// - `SyncError::OverrideResolution` when a missing field's fallback has an
///   unrecognized value kind, or when a create-context document carries more
///   than one sentinel-bearing occurrence.
pub fn resolve(
    directives: &[OverrideDirective],
    desired: &Value,
    existing: &Value,
    context: OverrideContext,
) -> SyncResult<Value> {
    let mut resolved = desired.clone();

    let sentinel_occurrences: usize = directives
        .iter()
        .map(|directive| sentinel_paths(&resolved, &directive.field).len())
        .sum();

    if context == OverrideContext::Create && sentinel_occurrences > 1 {
        let fields: Vec<&str> = directives
            .iter()
            .filter(|d| !sentinel_paths(&resolved, &d.field).is_empty())
            .map(|d| d.field.as_str())
            .collect();
        return Err(SyncError::OverrideResolution {
            field: fields.join(", "),
            reason: format!(
                "create accepts a single externally-defined override, found {sentinel_occurrences}"
            ),
        });
    }

    for directive in directives {
        // Paths shift as ancestors are pruned; re-scan after each removal.
        loop {
            let paths = sentinel_paths(&resolved, &directive.field);
            let Some(path) = paths.into_iter().next() else {
                break;
            };

            let existing_value = first_field_value(existing, &directive.field);
            match existing_value {
                Some(value) => {
                    set_field(&mut resolved, &path, &directive.field, value);
                }
                None => apply_missing(&mut resolved, &path, directive)?,
            }
        }
    }

    Ok(resolved)
}

/// Applies a directive's fallback for one occurrence with no existing value.
fn apply_missing(
    document: &mut Value,
    path: &[PathSegment],
    directive: &OverrideDirective,
) -> SyncResult<()> {
    match directive.on_missing {
        OnMissing::EmptyValue => {
            let empty = match &directive.value_kind {
                ValueKind::Array => Value::Array(Vec::new()),
                ValueKind::Object => Value::Object(Map::new()),
                ValueKind::Scalar => Value::String(String::new()),
                ValueKind::Other(kind) => {
                    return Err(SyncError::OverrideResolution {
                        field: directive.field.clone(),
                        reason: format!("unknown value kind '{kind}'"),
                    })
                }
            };
            set_field(document, path, &directive.field, empty);
            Ok(())
        }
        OnMissing::Delete => {
            remove_field(document, path, &directive.field);
            if directive.delete_depth > 0 {
                // Prune the ancestor `delete_depth` levels above the field's
                // containing object, bottom-up over the recorded path.
                let cut = path.len().saturating_sub(directive.delete_depth - 1);
                remove_at_path(document, &path[..cut]);
            }
            Ok(())
        }
    }
}

/// Paths to every object containing `field` with the sentinel somewhere in
/// its value. The path addresses the containing object.
fn sentinel_paths(document: &Value, field: &str) -> Vec<Vec<PathSegment>> {
    let mut paths = Vec::new();
    let mut current = Vec::new();
    collect_paths(document, field, &mut current, &mut paths);
    paths
}

fn collect_paths(
    value: &Value,
    field: &str,
    current: &mut Vec<PathSegment>,
    paths: &mut Vec<Vec<PathSegment>>,
) {
    match value {
        Value::Object(map) => {
            if let Some(field_value) = map.get(field) {
                if contains_sentinel(field_value) {
                    paths.push(current.clone());
                }
            }
            for (key, child) in map {
                if key == field {
                    continue;
                }
                current.push(PathSegment::Key(key.clone()));
                collect_paths(child, field, current, paths);
                current.pop();
            }
        }
        Value::Array(list) => {
            for (index, child) in list.iter().enumerate() {
                current.push(PathSegment::Index(index));
                collect_paths(child, field, current, paths);
                current.pop();
            }
        }
        _ => {}
    }
}

fn contains_sentinel(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains(EXTERNALLY_DEFINED),
        Value::Array(list) => list.iter().any(contains_sentinel),
        Value::Object(map) => map.values().any(contains_sentinel),
        _ => false,
    }
}

/// The first value of `field` anywhere in `existing`, document order.
fn first_field_value(existing: &Value, field: &str) -> Option<Value> {
    match existing {
        Value::Object(map) => {
            if let Some(value) = map.get(field) {
                return Some(value.clone());
            }
            map.values().find_map(|child| first_field_value(child, field))
        }
        Value::Array(list) => list.iter().find_map(|child| first_field_value(child, field)),
        _ => None,
    }
}

fn node_at_path<'a>(document: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut node = document;
    for segment in path {
        node = match segment {
            PathSegment::Key(key) => node.as_object_mut()?.get_mut(key)?,
            PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(node)
}

fn set_field(document: &mut Value, path: &[PathSegment], field: &str, value: Value) {
    if let Some(Value::Object(map)) = node_at_path(document, path) {
        map.insert(field.to_string(), value);
    }
}

fn remove_field(document: &mut Value, path: &[PathSegment], field: &str) {
    if let Some(Value::Object(map)) = node_at_path(document, path) {
        map.remove(field);
    }
}

/// Removes the node addressed by `path` from its parent container.
fn remove_at_path(document: &mut Value, path: &[PathSegment]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let Some(parent) = node_at_path(document, parents) else {
        return;
    };
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.remove(key);
        }
        (Value::Array(list), PathSegment::Index(index)) if *index < list.len() => {
            list.remove(*index);
        }
        _ => {}
    }
}
