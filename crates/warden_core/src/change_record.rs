//! Change records — the dry-run unit.
//!
//! A [`ChangeRecord`] describes one prospective or completed action: the
//! plugin that produced it, the target repository, the remote call it would
//! make (if any), and a severity. Records are immutable once created. A
//! dry-run returns the full ordered list; a live run returns only the
//! informational and error entries that accumulated along the way.

use github_client::{ApiCall, RepoKey};
use serde::Serialize;
use std::fmt;

#[cfg(test)]
#[path = "change_record_tests.rs"]
mod tests;

/// Severity of a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Error,
}

/// One prospective or completed action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// The resource plugin that produced this record.
    pub plugin: &'static str,

    /// The repository the action targets.
    pub repo: RepoKey,

    /// The remote call description; `None` for purely informational or error
    /// entries.
    pub action: Option<ApiCall>,

    /// Human-readable description (for errors, the underlying error text).
    pub message: String,

    /// Record severity.
    pub severity: Severity,
}

impl ChangeRecord {
    /// A planned remote mutation (dry-run) or an action being taken.
    pub fn planned(
        plugin: &'static str,
        repo: &RepoKey,
        action: ApiCall,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin,
            repo: repo.clone(),
            action: Some(action),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    /// An informational entry with no associated remote call.
    pub fn info(plugin: &'static str, repo: &RepoKey, message: impl Into<String>) -> Self {
        Self {
            plugin,
            repo: repo.clone(),
            action: None,
            message: message.into(),
            severity: Severity::Info,
        }
    }

    /// An error entry with no associated remote call.
    pub fn error(plugin: &'static str, repo: &RepoKey, message: impl Into<String>) -> Self {
        Self {
            plugin,
            repo: repo.clone(),
            action: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
        };
        match &self.action {
            Some(action) => write!(
                f,
                "[{severity}] {} {}: {} ({})",
                self.plugin, self.repo, self.message, action
            ),
            None => write!(f, "[{severity}] {} {}: {}", self.plugin, self.repo, self.message),
        }
    }
}

/// The result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// The ordered change records accumulated across plugins and repositories.
    pub records: Vec<ChangeRecord>,
}

impl SyncReport {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    /// Whether any record carries error severity.
    pub fn has_errors(&self) -> bool {
        self.records
            .iter()
            .any(|record| record.severity == Severity::Error)
    }

    /// Appends another report's records, preserving order.
    pub fn extend(&mut self, other: SyncReport) {
        self.records.extend(other.records);
    }
}
