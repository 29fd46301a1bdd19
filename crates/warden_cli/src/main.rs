//! org-warden CLI: reconcile GitHub repository settings from the admin
//! repository's YAML documents.
//!
//! Authentication comes from the environment: either `GITHUB_TOKEN`, or
//! `GITHUB_APP_ID` plus `GITHUB_APP_PRIVATE_KEY_FILE` for GitHub App
//! authentication (the installation for the target organization is resolved
//! automatically).

use clap::{Args, Parser, Subcommand};
use config_manager::{ConfigResolver, DeploymentDefaults, GitHubConfigSource, WardenEnv};
use github_client::{GitHubClient, RepoKey};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_core::{SyncMode, SyncReport, Warden};

/// org-warden CLI: enforce declarative repository settings across an organization
#[derive(Parser)]
#[command(name = "org-warden")]
#[command(about = "Enforce declarative repository settings across a GitHub organization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// The GitHub organization
    #[arg(long)]
    org: String,

    /// Compute and print the changes without applying them
    #[arg(long)]
    dry_run: bool,

    /// Git ref of the admin repository to read configuration from
    #[arg(long = "ref")]
    git_ref: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a single repository
    Sync {
        #[command(flatten)]
        common: CommonArgs,

        /// The repository name
        #[arg(long)]
        repo: String,
    },

    /// Reconcile every member repository of a sub-organization
    SyncSuborg {
        #[command(flatten)]
        common: CommonArgs,

        /// The sub-organization fragment name
        #[arg(long)]
        name: String,
    },

    /// Reconcile every repository of the organization
    SyncAll {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("ORG_WARDEN_LOG"))
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Sync { common, repo } => run(common, |warden, mode, git_ref| async move {
            let repo = RepoKey::new(common.org.clone(), repo.clone());
            warden.sync_repository(mode, &repo, git_ref.as_deref()).await
        })
        .await,
        Commands::SyncSuborg { common, name } => run(common, |warden, mode, git_ref| async move {
            warden
                .sync_suborg(mode, &common.org, name, git_ref.as_deref())
                .await
        })
        .await,
        Commands::SyncAll { common } => run(common, |warden, mode, git_ref| async move {
            warden.sync_all(mode, &common.org, git_ref.as_deref()).await
        })
        .await,
    };

    match result {
        Ok(report) => {
            for record in &report.records {
                println!("{record}");
            }
            std::process::exit(if report.has_errors() { 1 } else { 0 });
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

/// Builds the client and driver for the target organization and runs one sync
/// operation.
async fn run<'a, F, Fut>(common: &'a CommonArgs, operation: F) -> anyhow::Result<SyncReport>
where
    F: FnOnce(Arc<Warden>, SyncMode, Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<SyncReport, warden_core::SyncError>>,
{
    let admin = Arc::new(build_client(&common.org).await?);
    let env = WardenEnv::from_env();
    let deployment =
        DeploymentDefaults::load_cached(Path::new(&env.deployment_config_file), &env.admin_repo)?;

    let admin_repo = RepoKey::new(common.org.clone(), env.admin_repo.clone());
    let source = Arc::new(GitHubConfigSource::new(admin.clone(), admin_repo));
    let resolver = ConfigResolver::new(source, admin.clone(), env, deployment.clone());

    let warden = Arc::new(Warden::new(admin, resolver));
    let mode = if common.dry_run {
        SyncMode::DryRun
    } else {
        SyncMode::Apply
    };

    Ok(operation(warden, mode, common.git_ref.clone()).await?)
}

/// Creates a GitHub client from the environment.
///
/// `GITHUB_TOKEN` wins when set; otherwise GitHub App credentials are used and
/// exchanged for an installation token scoped to the organization.
async fn build_client(org: &str) -> anyhow::Result<GitHubClient> {
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        let octocrab = github_client::create_token_client(&token)?;
        return Ok(GitHubClient::new(octocrab));
    }

    let app_id: u64 = std::env::var("GITHUB_APP_ID")
        .map_err(|_| anyhow::anyhow!("set GITHUB_TOKEN, or GITHUB_APP_ID and GITHUB_APP_PRIVATE_KEY_FILE"))?
        .parse()?;
    let key_file = std::env::var("GITHUB_APP_PRIVATE_KEY_FILE")
        .map_err(|_| anyhow::anyhow!("GITHUB_APP_PRIVATE_KEY_FILE is not set"))?;
    let private_key = std::fs::read_to_string(&key_file)?;

    let app_client = github_client::create_app_client(app_id, &private_key).await?;
    let token = GitHubClient::new(app_client)
        .get_installation_token_for_org(org)
        .await?;
    let octocrab = github_client::create_token_client(&token)?;
    Ok(GitHubClient::new(octocrab))
}
