use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gei_migration_helper::{FeatureStatus, Repository, Session, Settings, Visibility};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gei-migration-helper")]
#[command(version)]
#[command(about = "Bulk GitHub Advanced Security changes for GitHub Enterprise Importer migrations")]
struct Cli {
    /// The access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every skipped or ignored API outcome
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct OrgSelection {
    /// The slug of the enterprise
    #[arg(long)]
    enterprise: Option<String>,

    /// To filter for a single organization
    #[arg(long)]
    organization: Option<String>,
}

#[derive(Args, Debug)]
struct RepoSelection {
    #[arg(long)]
    organization: String,

    /// Single repository; every repository of the organization when omitted
    #[arg(long)]
    repository: Option<String>,
}

#[derive(Args, Debug)]
struct RepoTarget {
    #[arg(long)]
    organization: String,

    #[arg(long)]
    repository: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Activate GHAS features for all orgs in an enterprise
    ActivateGhasFeatures {
        #[command(flatten)]
        orgs: OrgSelection,
    },
    /// Deactivate GHAS features for all orgs in an enterprise
    DeactivateGhasFeatures {
        #[command(flatten)]
        orgs: OrgSelection,
    },
    /// Change advanced security, secret scanning and push protection of repositories
    ChangeGhasSettings {
        #[command(flatten)]
        repos: RepoSelection,

        #[arg(long, value_enum)]
        advanced_security: FeatureStatus,

        #[arg(long, value_enum)]
        secret_scanning: FeatureStatus,

        #[arg(long, value_enum)]
        push_protection: FeatureStatus,
    },
    /// Change the visibility of a repository
    SetVisibility {
        #[command(flatten)]
        target: RepoTarget,

        #[arg(long, value_enum)]
        visibility: Visibility,
    },
    /// Archive repositories
    Archive {
        #[command(flatten)]
        repos: RepoSelection,
    },
    /// Unarchive repositories
    Unarchive {
        #[command(flatten)]
        repos: RepoSelection,
    },
    /// Disable the active workflows of repositories
    DisableWorkflows {
        #[command(flatten)]
        repos: RepoSelection,
    },
    /// Enable every workflow of repositories
    EnableWorkflows {
        #[command(flatten)]
        repos: RepoSelection,
    },
    /// Delete all branch protection rules of a repository
    DeleteBranchProtections {
        #[command(flatten)]
        target: RepoTarget,
    },
    /// Create an empty repository
    CreateRepository {
        #[command(flatten)]
        target: RepoTarget,
    },
    /// Report code scanning analyses on the default branch
    CodeScanningStatus {
        #[command(flatten)]
        target: RepoTarget,
    },
    /// Open an issue
    CreateIssue {
        #[command(flatten)]
        target: RepoTarget,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("[❌] {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "gei_migration_helper=debug"
    } else {
        "gei_migration_helper=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let token = cli
        .token
        .context("no access token, pass --token or set GITHUB_TOKEN")?;
    let mut session = Session::from_settings(&settings);

    match cli.command {
        Command::ActivateGhasFeatures { orgs } => {
            change_org_defaults(&mut session, &token, orgs, true).await
        }
        Command::DeactivateGhasFeatures { orgs } => {
            change_org_defaults(&mut session, &token, orgs, false).await
        }
        Command::ChangeGhasSettings {
            repos,
            advanced_security,
            secret_scanning,
            push_protection,
        } => {
            let org = repos.organization.clone();
            for repository in repositories(&mut session, &token, &repos).await? {
                if repository.archived {
                    warn!("[⏭️] Skipping archived repository: {}", repository.name);
                    continue;
                }
                info!("[🔄] Changing GHAS settings for repository: {}", repository.name);
                session
                    .change_ghas_repo_settings(
                        &token,
                        &org,
                        &repository,
                        advanced_security,
                        secret_scanning,
                        push_protection,
                    )
                    .await
                    .with_context(|| format!("changing GHAS settings of {org}/{}", repository.name))?;
                info!("[✅] Done");
            }
            Ok(())
        }
        Command::SetVisibility { target, visibility } => {
            info!(
                "[🔄] Changing visibility of {}/{} to {visibility}",
                target.organization, target.repository
            );
            session
                .change_repository_visibility(
                    &token,
                    &target.organization,
                    &target.repository,
                    visibility,
                )
                .await?;
            info!("[✅] Done");
            Ok(())
        }
        Command::Archive { repos } => change_archive_state(&mut session, &token, &repos, true).await,
        Command::Unarchive { repos } => {
            change_archive_state(&mut session, &token, &repos, false).await
        }
        Command::DisableWorkflows { repos } => {
            let org = repos.organization.clone();
            for repository in repositories(&mut session, &token, &repos).await? {
                info!("[🔄] Disabling workflows for repository: {}", repository.name);
                let workflows = session
                    .get_active_workflows(&token, &org, &repository.name)
                    .await?;
                session
                    .disable_workflows(&token, &org, &repository.name, &workflows)
                    .await?;
                info!("[✅] Done ({} workflow(s))", workflows.len());
            }
            Ok(())
        }
        Command::EnableWorkflows { repos } => {
            let org = repos.organization.clone();
            for repository in repositories(&mut session, &token, &repos).await? {
                info!("[🔄] Enabling workflows for repository: {}", repository.name);
                let workflows = session
                    .get_all_workflows(&token, &org, &repository.name)
                    .await?;
                session
                    .enable_workflows(&token, &org, &repository.name, &workflows)
                    .await?;
                info!("[✅] Done ({} workflow(s))", workflows.len());
            }
            Ok(())
        }
        Command::DeleteBranchProtections { target } => {
            info!(
                "[🔄] Deleting branch protections for repository: {}",
                target.repository
            );
            let deleted = session
                .delete_branch_protections(&token, &target.organization, &target.repository)
                .await?;
            info!("[✅] Done ({deleted} rule(s) deleted)");
            Ok(())
        }
        Command::CreateRepository { target } => {
            info!("[🔄] Creating repository: {}", target.repository);
            session
                .create_repository(&token, &target.organization, &target.repository)
                .await?;
            info!("[✅] Done");
            Ok(())
        }
        Command::CodeScanningStatus { target } => {
            let repository = session
                .get_repository(&token, &target.organization, &target.repository)
                .await?;
            let branch = repository.default_branch.as_deref().unwrap_or("main");
            let analyses = session
                .get_code_scanning_analyses(&token, &target.organization, &repository.name, branch)
                .await?;

            if analyses.is_empty() {
                info!("Code scanning has no analyses for {}@{branch}", repository.name);
            }
            for analysis in &analyses {
                info!(
                    "{} {} on {}: {} result(s), {} rule(s)",
                    analysis.created_at.format("%Y-%m-%d %H:%M"),
                    analysis.tool.name,
                    analysis.git_ref,
                    analysis.results_count,
                    analysis.rules_count
                );
            }
            Ok(())
        }
        Command::CreateIssue {
            target,
            title,
            body,
        } => {
            let issue = session
                .create_issue(&token, &target.organization, &target.repository, &title, &body)
                .await?;
            info!(
                "[✅] Created issue #{} {}",
                issue.number,
                issue.html_url.as_deref().unwrap_or_default()
            );
            Ok(())
        }
    }
}

async fn organizations(session: &mut Session, token: &str, orgs: OrgSelection) -> Result<Vec<String>> {
    if let Some(organization) = orgs.organization {
        return Ok(vec![organization]);
    }

    let enterprise = orgs
        .enterprise
        .context("either --enterprise or --organization is required")?;
    info!("[🔄] Fetching organizations from enterprise...");
    let organizations = session
        .list_enterprise_organizations(token, &enterprise)
        .await
        .context("Error fetching organizations from enterprise")?;
    info!("[✅] Done");
    Ok(organizations)
}

async fn repositories(
    session: &mut Session,
    token: &str,
    repos: &RepoSelection,
) -> Result<Vec<Repository>> {
    match &repos.repository {
        Some(name) => Ok(vec![
            session
                .get_repository(token, &repos.organization, name)
                .await?,
        ]),
        None => {
            info!(
                "[🔄] Fetching repositories from organization: {}",
                repos.organization
            );
            let repositories = session
                .get_repositories(token, &repos.organization)
                .await?;
            info!("[✅] Done ({} repositories)", repositories.len());
            Ok(repositories)
        }
    }
}

async fn change_org_defaults(
    session: &mut Session,
    token: &str,
    orgs: OrgSelection,
    activate: bool,
) -> Result<()> {
    let verb = if activate { "Activating" } else { "Deactivating" };
    for organization in organizations(session, token, orgs).await? {
        info!("[🔄] {verb} GHAS settings for organization: {organization}");
        session
            .change_ghas_org_settings(token, &organization, activate)
            .await
            .with_context(|| format!("changing GHAS defaults of {organization}"))?;
        info!("[✅] Done");
    }
    Ok(())
}

async fn change_archive_state(
    session: &mut Session,
    token: &str,
    repos: &RepoSelection,
    archived: bool,
) -> Result<()> {
    let verb = if archived { "Archiving" } else { "Unarchiving" };
    for repository in repositories(session, token, repos).await? {
        info!("[🔄] {verb} repository: {}", repository.name);
        session
            .change_archive_state(token, &repos.organization, &repository.name, archived)
            .await?;
        info!("[✅] Done");
    }
    Ok(())
}
