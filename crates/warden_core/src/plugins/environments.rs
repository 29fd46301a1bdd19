//! Deployment environment plugin.
//!
//! Environments carry nested sub-collections (variables, deployment branch
//! policies, deployment protection rules) that GitHub exposes through separate
//! endpoints. The live state for comparison is assembled from all of them.
//! Environment names and variable names are case-folded to lowercase before
//! comparison. When a sub-collection differs, it is rewritten wholesale —
//! existing entries deleted, desired entries recreated — keyed by name/id
//! equality rather than position.

use crate::change_record::ChangeRecord;
use crate::errors::SyncResult;
use crate::reconciler::{Diffable, Executor};
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey, RepositoryAdmin};
use serde_json::{json, Value};
use std::sync::Arc;

#[cfg(test)]
#[path = "environments_tests.rs"]
mod tests;

pub struct Environments {
    admin: Arc<dyn RepositoryAdmin>,
    repo: RepoKey,
    entries: Vec<Value>,
}

/// Which parts of a matched environment differ.
#[derive(Debug, Default, PartialEq, Eq)]
struct Changed {
    settings: bool,
    branch_policies: bool,
    variables: bool,
    protection_rules: bool,
}

impl Changed {
    fn any(&self) -> bool {
        self.settings || self.branch_policies || self.variables || self.protection_rules
    }
}

impl Environments {
    pub fn new(admin: Arc<dyn RepositoryAdmin>, repo: RepoKey, entries: Vec<Value>) -> Self {
        // Force all names to lowercase to avoid comparison issues.
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                lowercase_field(&mut entry, "name");
                if let Some(variables) = entry
                    .get_mut("variables")
                    .and_then(Value::as_array_mut)
                {
                    for variable in variables {
                        lowercase_field(variable, "name");
                    }
                }
                entry
            })
            .collect();
        Self { admin, repo, entries }
    }

    fn env_path(&self, name: &str) -> String {
        format!(
            "/repos/{}/{}/environments/{}",
            self.repo.owner, self.repo.name, name
        )
    }

    /// Assembles the comparable live state of one environment from its object
    /// and the three sub-collection endpoints.
    async fn assemble_existing(&self, environment: &Value) -> SyncResult<Value> {
        let name = environment["name"]
            .as_str()
            .unwrap_or_default()
            .to_lowercase();
        let rules = environment["protection_rules"].as_array().cloned().unwrap_or_default();

        let wait_timer = rules
            .iter()
            .find(|rule| rule["type"] == "wait_timer")
            .and_then(|rule| rule["wait_timer"].as_u64())
            .unwrap_or(0);
        let reviewers_rule = rules.iter().find(|rule| rule["type"] == "required_reviewers");
        let prevent_self_review = reviewers_rule
            .and_then(|rule| rule["prevent_self_review"].as_bool())
            .unwrap_or(false);
        let reviewers: Vec<Value> = reviewers_rule
            .and_then(|rule| rule["reviewers"].as_array().cloned())
            .unwrap_or_default()
            .iter()
            .map(|reviewer| json!({ "id": reviewer["reviewer"]["id"], "type": reviewer["type"] }))
            .collect();

        let deployment_branch_policy = match &environment["deployment_branch_policy"] {
            Value::Null => Value::Null,
            policy => {
                let custom = policy["custom_branch_policies"].as_bool().unwrap_or(false);
                let custom_value = if custom {
                    let response = self
                        .admin
                        .request(&ApiCall::get(format!(
                            "{}/deployment-branch-policies",
                            self.env_path(&name)
                        )))
                        .await?;
                    Value::Array(
                        response["branch_policies"]
                            .as_array()
                            .cloned()
                            .unwrap_or_default()
                            .iter()
                            .map(|branch_policy| json!({ "name": branch_policy["name"] }))
                            .collect(),
                    )
                } else {
                    Value::Bool(false)
                };
                json!({
                    "protected_branches": policy["protected_branches"].as_bool().unwrap_or(false),
                    "custom_branch_policies": custom_value,
                })
            }
        };

        let variables_response = self
            .admin
            .request(&ApiCall::get(format!("{}/variables", self.env_path(&name))))
            .await?;
        let variables: Vec<Value> = variables_response["variables"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|variable| {
                json!({
                    "name": variable["name"].as_str().unwrap_or_default().to_lowercase(),
                    "value": variable["value"],
                })
            })
            .collect();

        let rules_response = self
            .admin
            .request(&ApiCall::get(format!(
                "{}/deployment_protection_rules",
                self.env_path(&name)
            )))
            .await?;
        let deployment_protection_rules: Vec<Value> = rules_response
            ["custom_deployment_protection_rules"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|rule| json!({ "app_id": rule["app"]["id"], "id": rule["id"] }))
            .collect();

        Ok(json!({
            "name": name,
            "wait_timer": wait_timer,
            "prevent_self_review": prevent_self_review,
            "reviewers": reviewers,
            "deployment_branch_policy": deployment_branch_policy,
            "variables": variables,
            "deployment_protection_rules": deployment_protection_rules,
        }))
    }

    /// Computes which parts of a matched pair differ, using the desired
    /// entry's defaults for unspecified parts.
    fn changed_parts(existing: &Value, desired: &Value) -> Changed {
        let desired = with_defaults(desired);

        let settings = existing["wait_timer"] != desired["wait_timer"]
            || existing["prevent_self_review"] != desired["prevent_self_review"]
            || !same_set_by(&existing["reviewers"], &desired["reviewers"], "id")
            || branch_policy_differs(
                &existing["deployment_branch_policy"],
                &desired["deployment_branch_policy"],
            );
        let variables = !same_set_by(&existing["variables"], &desired["variables"], "name")
            || !values_agree(&existing["variables"], &desired["variables"], "name", "value");
        let protection_rules = !same_set_by(
            &existing["deployment_protection_rules"],
            &desired["deployment_protection_rules"],
            "app_id",
        );
        let branch_policies = branch_policy_differs(
            &existing["deployment_branch_policy"],
            &desired["deployment_branch_policy"],
        );

        Changed {
            settings,
            branch_policies,
            variables,
            protection_rules,
        }
    }

    /// The PUT payload for the environment's own settings.
    fn settings_payload(desired: &Value) -> Value {
        let desired = with_defaults(desired);
        let branch_policy = match &desired["deployment_branch_policy"] {
            Value::Null => Value::Null,
            policy => json!({
                "protected_branches": policy["protected_branches"].as_bool().unwrap_or(false),
                "custom_branch_policies": !matches!(
                    &policy["custom_branch_policies"],
                    Value::Null | Value::Bool(false)
                ),
            }),
        };
        json!({
            "wait_timer": desired["wait_timer"],
            "prevent_self_review": desired["prevent_self_review"],
            "reviewers": desired["reviewers"],
            "deployment_branch_policy": branch_policy,
        })
    }

    async fn create_branch_policies(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        name: &str,
        desired: &Value,
    ) -> SyncResult<()> {
        let policies = desired["deployment_branch_policy"]["custom_branch_policies"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        for policy in policies {
            let policy_name = match &policy {
                Value::String(policy_name) => json!(policy_name),
                other => other["name"].clone(),
            };
            executor
                .apply(
                    self.name(),
                    &self.repo,
                    records,
                    ApiCall::post(
                        format!("{}/deployment-branch-policies", self.env_path(name)),
                        json!({ "name": policy_name }),
                    ),
                    "Create deployment branch policy",
                )
                .await?;
        }
        Ok(())
    }

    async fn create_variables(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        name: &str,
        desired: &Value,
    ) -> SyncResult<()> {
        for variable in desired["variables"].as_array().cloned().unwrap_or_default() {
            executor
                .apply(
                    self.name(),
                    &self.repo,
                    records,
                    ApiCall::post(
                        format!("{}/variables", self.env_path(name)),
                        json!({ "name": variable["name"], "value": variable["value"] }),
                    ),
                    "Create environment variable",
                )
                .await?;
        }
        Ok(())
    }

    async fn create_protection_rules(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        name: &str,
        desired: &Value,
    ) -> SyncResult<()> {
        for rule in desired["deployment_protection_rules"]
            .as_array()
            .cloned()
            .unwrap_or_default()
        {
            executor
                .apply(
                    self.name(),
                    &self.repo,
                    records,
                    ApiCall::post(
                        format!("{}/deployment_protection_rules", self.env_path(name)),
                        json!({ "integration_id": rule["app_id"] }),
                    ),
                    "Create deployment protection rule",
                )
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Diffable for Environments {
    fn name(&self) -> &'static str {
        "environments"
    }

    fn repo(&self) -> &RepoKey {
        &self.repo
    }

    fn desired_entries(&self) -> &[Value] {
        &self.entries
    }

    async fn fetch_existing(&self) -> SyncResult<Vec<Value>> {
        let environments = self.admin.list_environments(&self.repo).await?;
        let mut assembled = Vec::with_capacity(environments.len());
        for environment in &environments {
            assembled.push(self.assemble_existing(environment).await?);
        }
        Ok(assembled)
    }

    fn matches(&self, existing: &Value, desired: &Value) -> bool {
        existing["name"] == desired["name"]
    }

    fn has_changed(&self, existing: &Value, desired: &Value) -> bool {
        Self::changed_parts(existing, desired).any()
    }

    async fn create(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        desired: &Value,
    ) -> SyncResult<()> {
        let name = desired["name"].as_str().unwrap_or_default();
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::put(self.env_path(name), Self::settings_payload(desired)),
                format!("Create environment '{name}'"),
            )
            .await?;
        self.create_branch_policies(executor, records, name, desired).await?;
        self.create_variables(executor, records, name, desired).await?;
        self.create_protection_rules(executor, records, name, desired).await?;
        Ok(())
    }

    async fn update(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
        desired: &Value,
    ) -> SyncResult<()> {
        let name = desired["name"].as_str().unwrap_or_default();
        let changed = Self::changed_parts(existing, desired);

        if changed.settings {
            executor
                .apply(
                    self.name(),
                    &self.repo,
                    records,
                    ApiCall::put(self.env_path(name), Self::settings_payload(desired)),
                    format!("Update environment '{name}' settings"),
                )
                .await?;
        }

        // Changed sub-collections are rewritten: delete everything live, then
        // recreate the desired entries.
        if changed.branch_policies
            && desired["deployment_branch_policy"]["custom_branch_policies"].is_array()
        {
            let response = self
                .admin
                .request(&ApiCall::get(format!(
                    "{}/deployment-branch-policies",
                    self.env_path(name)
                )))
                .await?;
            for policy in response["branch_policies"].as_array().cloned().unwrap_or_default() {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        records,
                        ApiCall::delete(format!(
                            "{}/deployment-branch-policies/{}",
                            self.env_path(name),
                            policy["id"]
                        )),
                        "Delete deployment branch policy",
                    )
                    .await?;
            }
            self.create_branch_policies(executor, records, name, desired).await?;
        }

        if changed.variables {
            for variable in existing["variables"].as_array().cloned().unwrap_or_default() {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        records,
                        ApiCall::delete(format!(
                            "{}/variables/{}",
                            self.env_path(name),
                            variable["name"].as_str().unwrap_or_default()
                        )),
                        "Delete environment variable",
                    )
                    .await?;
            }
            self.create_variables(executor, records, name, desired).await?;
        }

        if changed.protection_rules {
            for rule in existing["deployment_protection_rules"]
                .as_array()
                .cloned()
                .unwrap_or_default()
            {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        records,
                        ApiCall::delete(format!(
                            "{}/deployment_protection_rules/{}",
                            self.env_path(name),
                            rule["id"]
                        )),
                        "Delete deployment protection rule",
                    )
                    .await?;
            }
            self.create_protection_rules(executor, records, name, desired).await?;
        }

        Ok(())
    }

    async fn remove(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
    ) -> SyncResult<()> {
        let name = existing["name"].as_str().unwrap_or_default();
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::delete(self.env_path(name)),
                format!("Delete environment '{name}'"),
            )
            .await?;
        Ok(())
    }
}

fn lowercase_field(entry: &mut Value, field: &str) {
    if let Some(name) = entry[field].as_str() {
        let lowered = name.to_lowercase();
        entry[field] = Value::String(lowered);
    }
}

/// Fills the desired entry's unspecified parts with their defaults so it is
/// comparable with assembled live state.
fn with_defaults(desired: &Value) -> Value {
    let mut filled = desired.clone();
    let Some(map) = filled.as_object_mut() else {
        return filled;
    };
    map.entry("wait_timer").or_insert(json!(0));
    map.entry("prevent_self_review").or_insert(json!(false));
    map.entry("reviewers").or_insert(json!([]));
    map.entry("deployment_branch_policy").or_insert(Value::Null);
    map.entry("variables").or_insert(json!([]));
    map.entry("deployment_protection_rules").or_insert(json!([]));
    filled
}

/// Set equality of two arrays keyed by one field.
fn same_set_by(a: &Value, b: &Value, key: &str) -> bool {
    let collect = |value: &Value| -> Vec<String> {
        let mut keys: Vec<String> = value
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|entry| entry[key].to_string())
            .collect();
        keys.sort();
        keys
    };
    collect(a) == collect(b)
}

/// Whether entries matched by `key` agree on `value_field`.
fn values_agree(existing: &Value, desired: &Value, key: &str, value_field: &str) -> bool {
    let empty = Vec::new();
    let existing = existing.as_array().unwrap_or(&empty);
    let desired = desired.as_array().unwrap_or(&empty);
    desired.iter().all(|entry| {
        existing
            .iter()
            .find(|candidate| candidate[key] == entry[key])
            .map(|candidate| candidate[value_field] == entry[value_field])
            .unwrap_or(false)
    })
}

fn branch_policy_differs(existing: &Value, desired: &Value) -> bool {
    match (existing, desired) {
        (Value::Null, Value::Null) => false,
        (Value::Null, _) | (_, Value::Null) => true,
        (existing, desired) => {
            existing["protected_branches"] != desired["protected_branches"]
                || !policy_names_equal(
                    &existing["custom_branch_policies"],
                    &desired["custom_branch_policies"],
                )
        }
    }
}

/// Custom branch policies may be `false` or a list of names/`{name}` objects.
fn policy_names_equal(existing: &Value, desired: &Value) -> bool {
    fn names(value: &Value) -> Option<Vec<String>> {
        let list = value.as_array()?;
        let mut names: Vec<String> = list
            .iter()
            .map(|entry| match entry {
                Value::String(name) => name.clone(),
                other => other["name"].as_str().unwrap_or_default().to_string(),
            })
            .collect();
        names.sort();
        Some(names)
    }

    match (names(existing), names(desired)) {
        (Some(a), Some(b)) => a == b,
        (None, None) => existing == desired,
        _ => false,
    }
}
