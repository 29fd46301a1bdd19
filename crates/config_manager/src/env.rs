//! Deployment environment settings.
//!
//! Gathers the small set of environment variables that control where
//! configuration documents live and which optional behaviors are enabled.
//! Every field has a default so a bare deployment works without any
//! environment at all.

use std::env;

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

/// Environment-derived settings for one deployment.
///
/// Constructed once at startup (`WardenEnv::from_env`) and passed explicitly to
/// the components that need it; never read ambiently after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardenEnv {
    /// Name of the admin repository holding the settings documents.
    pub admin_repo: String,

    /// Directory inside the admin repository holding configuration.
    pub config_path: String,

    /// File name of the org-wide settings document, relative to `config_path`.
    pub settings_file_path: String,

    /// On-disk path of the deployment defaults document.
    pub deployment_config_file: String,

    /// When true, a team named in the settings that does not exist in the
    /// organization is created before being granted repository access.
    pub create_teams_if_missing: bool,
}

impl Default for WardenEnv {
    fn default() -> Self {
        Self {
            admin_repo: "admin".to_string(),
            config_path: ".github".to_string(),
            settings_file_path: "settings.yml".to_string(),
            deployment_config_file: "deployment-settings.yml".to_string(),
            create_teams_if_missing: false,
        }
    }
}

impl WardenEnv {
    /// Reads the environment, falling back to defaults for unset variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            admin_repo: env::var("ADMIN_REPO").unwrap_or(defaults.admin_repo),
            config_path: env::var("CONFIG_PATH").unwrap_or(defaults.config_path),
            settings_file_path: env::var("SETTINGS_FILE_PATH")
                .unwrap_or(defaults.settings_file_path),
            deployment_config_file: env::var("DEPLOYMENT_CONFIG_FILE")
                .unwrap_or(defaults.deployment_config_file),
            create_teams_if_missing: env::var("CREATE_TEAMS_IF_NOT_EXIST")
                .map(|v| v == "true")
                .unwrap_or(defaults.create_teams_if_missing),
        }
    }

    /// Path of the org-wide settings document inside the admin repository.
    pub fn settings_path(&self) -> String {
        format!("{}/{}", self.config_path, self.settings_file_path)
    }

    /// Directory of sub-organization fragments inside the admin repository.
    pub fn suborgs_dir(&self) -> String {
        format!("{}/suborgs", self.config_path)
    }

    /// Path of a per-repository configuration file inside the admin repository.
    pub fn repo_config_path(&self, repo_name: &str) -> String {
        format!("{}/repos/{}.yml", self.config_path, repo_name)
    }
}
