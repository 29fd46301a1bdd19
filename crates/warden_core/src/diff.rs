//! Structural deep-diff between desired and existing state.
//!
//! [`compare`] walks a desired value and an existing value in lock-step and
//! reports what the desired state would add, modify, or no longer mention.
//! Objects are walked by key; arrays are matched by a stable identity field
//! (never by position, since desired and live orderings are not guaranteed to
//! agree); scalar arrays compare as unordered sets.
//!
//! A key present only in the existing state is reported under `deletions` but
//! does **not** count as a change: most plugins only push forward the fields
//! they manage and tolerate unmanaged live fields. Plugins that do prune
//! unmatched live state opt in at the reconciler level instead.
//!
//! The addition/modification/deletion trees mirror the input shape and are
//! embedded verbatim in dry-run messages. They are advisory text for humans,
//! not a machine-consumed contract.

use serde_json::{json, Map, Value};

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;

/// Fields tried, in order, to match array elements between desired and
/// existing collections.
const IDENTITY_FIELDS: &[&str] = &[
    "name", "context", "username", "login", "slug", "id", "app_id", "type",
];

/// The outcome of a structural comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Desired subtrees absent from the existing state (`Value::Null` when none).
    pub additions: Value,

    /// Desired leaf values differing from the existing state (`Value::Null` when none).
    pub modifications: Value,

    /// Existing subtrees the desired state does not mention (`Value::Null` when none).
    pub deletions: Value,

    /// True iff any addition or modification exists. Deletions alone do not
    /// make a pair "changed".
    pub has_changes: bool,
}

impl DiffResult {
    /// Renders the diff as a compact JSON summary for dry-run messages.
    pub fn summary(&self) -> String {
        json!({
            "additions": self.additions,
            "modifications": self.modifications,
            "deletions": self.deletions,
        })
        .to_string()
    }
}

/// Compares a desired value against an existing value.
pub fn compare(desired: &Value, existing: &Value) -> DiffResult {
    let (additions, modifications, deletions) = diff_values(desired, existing);
    let has_changes = additions.is_some() || modifications.is_some();
    DiffResult {
        additions: additions.unwrap_or(Value::Null),
        modifications: modifications.unwrap_or(Value::Null),
        deletions: deletions.unwrap_or(Value::Null),
        has_changes,
    }
}

type Parts = (Option<Value>, Option<Value>, Option<Value>);

fn diff_values(desired: &Value, existing: &Value) -> Parts {
    match (desired, existing) {
        (Value::Object(d), Value::Object(e)) => diff_objects(d, e),
        (Value::Array(d), Value::Array(e)) => diff_arrays(d, e),
        (d, e) => {
            if d == e {
                (None, None, None)
            } else {
                (None, Some(d.clone()), None)
            }
        }
    }
}

fn diff_objects(desired: &Map<String, Value>, existing: &Map<String, Value>) -> Parts {
    let mut additions = Map::new();
    let mut modifications = Map::new();
    let mut deletions = Map::new();

    for (key, desired_value) in desired {
        match existing.get(key) {
            None => {
                additions.insert(key.clone(), desired_value.clone());
            }
            Some(existing_value) => {
                let (child_adds, child_mods, child_dels) =
                    diff_values(desired_value, existing_value);
                if let Some(child) = child_adds {
                    additions.insert(key.clone(), child);
                }
                if let Some(child) = child_mods {
                    modifications.insert(key.clone(), child);
                }
                if let Some(child) = child_dels {
                    deletions.insert(key.clone(), child);
                }
            }
        }
    }

    for (key, existing_value) in existing {
        if !desired.contains_key(key) {
            deletions.insert(key.clone(), existing_value.clone());
        }
    }

    (
        non_empty_object(additions),
        non_empty_object(modifications),
        non_empty_object(deletions),
    )
}

fn diff_arrays(desired: &[Value], existing: &[Value]) -> Parts {
    let mut additions = Vec::new();
    let mut modifications = Vec::new();
    let mut deletions = Vec::new();

    for desired_element in desired {
        match find_match(desired_element, existing) {
            None => additions.push(desired_element.clone()),
            Some(existing_element) => {
                let (child_adds, child_mods, _) = diff_values(desired_element, existing_element);
                if child_adds.is_some() || child_mods.is_some() {
                    let mut report = deep_merge(child_adds, child_mods).unwrap_or(Value::Null);
                    annotate_identity(&mut report, desired_element);
                    modifications.push(report);
                }
            }
        }
    }

    for existing_element in existing {
        if find_match(existing_element, desired).is_none() {
            deletions.push(existing_element.clone());
        }
    }

    (
        non_empty_array(additions),
        non_empty_array(modifications),
        non_empty_array(deletions),
    )
}

/// Finds the element of `candidates` matching `element` by identity field, or
/// by whole-value equality when no identity field is present.
fn find_match<'a>(element: &Value, candidates: &'a [Value]) -> Option<&'a Value> {
    if let Value::Object(fields) = element {
        for identity in IDENTITY_FIELDS {
            if let Some(id_value) = fields.get(*identity) {
                return candidates
                    .iter()
                    .find(|candidate| candidate.get(*identity) == Some(id_value));
            }
        }
    }
    candidates.iter().find(|candidate| *candidate == element)
}

/// Copies the element's identity field onto a modification report so readers
/// can tell which entry changed.
fn annotate_identity(report: &mut Value, element: &Value) {
    let (Value::Object(report_fields), Value::Object(element_fields)) = (report, element) else {
        return;
    };
    for identity in IDENTITY_FIELDS {
        if let Some(id_value) = element_fields.get(*identity) {
            report_fields
                .entry(identity.to_string())
                .or_insert_with(|| id_value.clone());
            return;
        }
    }
}

/// Deep-merges two optional objects. Keys are disjoint per level by
/// construction (additions are absent keys, modifications present ones), but
/// both can appear under the same parent key at deeper levels.
fn deep_merge(a: Option<Value>, b: Option<Value>) -> Option<Value> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let mut merged = a;
            for (key, value) in b {
                let entry = merged.remove(&key);
                merged.insert(key, deep_merge(entry, Some(value)).unwrap_or(Value::Null));
            }
            Some(Value::Object(merged))
        }
        // Mismatched shapes cannot both occur for one key; prefer the latter.
        (_, b) => b,
    }
}

fn non_empty_object(map: Map<String, Value>) -> Option<Value> {
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

fn non_empty_array(list: Vec<Value>) -> Option<Value> {
    if list.is_empty() {
        None
    } else {
        Some(Value::Array(list))
    }
}
