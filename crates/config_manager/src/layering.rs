//! Configuration layer merging.
//!
//! This module implements the layered configuration model that combines the
//! deployment defaults, the org-wide settings document, optional per-scope
//! fragments, and ad hoc overrides into one effective document.
//!
//! # Merge rule
//!
//! Layers merge in precedence order from lowest to highest:
//! 1. **Deployment** - on-disk defaults, loaded once per process
//! 2. **Org** - the admin repository's settings document at the requested ref
//! 3. **SubOrg** - the fragment whose membership rule matches the repository
//! 4. **Repo** - the repository's own configuration file
//! 5. **Override** - caller-supplied pseudo-config (e.g. rename handling)
//!
//! A later layer replaces an earlier layer **key-by-key at the top level**;
//! there is no deep merge. A layer that omits a key inherits the prior layer's
//! value for that key. This matches how operators reason about the documents:
//! a suborg fragment that declares `teams` owns the whole team list for its
//! repositories.

use serde_json::{Map, Value};
use std::fmt;

#[cfg(test)]
#[path = "layering_tests.rs"]
mod tests;

/// The kind of a configuration layer, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerKind {
    /// On-disk deployment defaults.
    Deployment,
    /// The org-wide settings document.
    Org,
    /// A sub-organization fragment.
    SubOrg,
    /// A per-repository configuration file.
    Repo,
    /// Caller-supplied override (rename pseudo-config).
    Override,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Deployment => "deployment",
            LayerKind::Org => "org",
            LayerKind::SubOrg => "suborg",
            LayerKind::Repo => "repo",
            LayerKind::Override => "override",
        };
        f.write_str(name)
    }
}

/// One named source of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    /// Which precedence slot this layer occupies.
    pub kind: LayerKind,

    /// Where the document came from (file path or a synthetic label), used in
    /// log lines and error messages.
    pub source: String,

    /// The parsed document. Only object documents contribute keys; anything
    /// else is ignored with a warning at load time.
    pub document: Value,
}

impl ConfigLayer {
    pub fn new(kind: LayerKind, source: impl Into<String>, document: Value) -> Self {
        Self {
            kind,
            source: source.into(),
            document,
        }
    }
}

/// Merges layers by top-level key replacement, in the order given.
///
/// The caller is responsible for ordering the slice by precedence (lowest
/// first); [`ConfigLayer::kind`] is informational here.
///
/// # Examples
///
/// ```rust
/// use config_manager::{merge_layers, ConfigLayer, LayerKind};
/// use serde_json::json;
///
/// let merged = merge_layers(&[
///     ConfigLayer::new(LayerKind::Org, "settings.yml", json!({
///         "teams": [{ "name": "core", "permission": "push" }],
///         "repository": { "has_wiki": false },
///     })),
///     ConfigLayer::new(LayerKind::SubOrg, "frontend.yml", json!({
///         "teams": [{ "name": "frontend", "permission": "admin" }],
///     })),
/// ]);
///
/// // The suborg layer owns `teams`; `repository` is inherited from the org layer.
/// assert_eq!(merged["teams"][0]["name"], "frontend");
/// assert_eq!(merged["repository"]["has_wiki"], false);
/// ```
pub fn merge_layers(layers: &[ConfigLayer]) -> Value {
    let mut merged = Map::new();
    for layer in layers {
        match &layer.document {
            Value::Object(entries) => {
                for (key, value) in entries {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            _ => {
                tracing::warn!(
                    source = %layer.source,
                    kind = %layer.kind,
                    "Ignoring non-mapping configuration layer"
                );
            }
        }
    }
    Value::Object(merged)
}
