//! Configuration management for org-warden.
//!
//! This crate owns everything between "YAML documents in the admin repository"
//! and "the desired state for one repository": the deployment defaults file,
//! the org-wide settings document, sub-organization fragments, per-repository
//! files, layer merging, scope restrictions, and the validator pattern.
//!
//! The layering rule is deliberately simple — later layers replace earlier
//! layers key-by-key at the top level — and is implemented once in
//! [`merge_layers`]; see that module for the precedence order.

pub mod deployment;
pub mod env;
pub mod errors;
pub mod layering;
pub mod resolver;
pub mod restrictions;
pub mod settings;
pub mod source;
pub mod suborg;

// Re-export for convenient access
pub use deployment::DeploymentDefaults;
pub use env::WardenEnv;
pub use errors::{ConfigurationError, ConfigurationResult};
pub use layering::{merge_layers, ConfigLayer, LayerKind};
pub use resolver::{ConfigResolver, ScopeDecision};
pub use restrictions::{RestrictedRepos, ValidatorConfig};
pub use settings::DesiredConfig;
pub use source::{ConfigFile, ConfigSource, GitHubConfigSource};
pub use suborg::{SubOrgConfig, SubOrgMatcher};
