//! The GitHub façade used by every migration command.
//!
//! A [`Session`] owns the clients built for the most recent access token and
//! rebuilds them whenever a call supplies a different one. Each operation is
//! a single provider call (or one call per page / per item), classified with
//! the operation's [`ErrorPolicy`].

use std::time::Duration;

use tracing::debug;

use crate::api::{ClientFactory, Clients, Cursor, GraphQlApi, PageNumber, RestApi};
use crate::config::{PageSizes, Settings};
use crate::error::{resolve, ApiResult, Error, ErrorPolicy, Outcome, Result};
use crate::github::OctocrabFactory;
use crate::models::{
    BranchProtectionRule, FeatureStatus, Issue, OrganizationSecurityDefaults, Repository,
    RepositoryPatch, ScanningAnalysis, SecurityAndAnalysis, Visibility, Workflow,
};
use crate::pagination::collect_all;

const FIRST_PAGE: PageNumber = 1;

/// Already at the requested state (visibility, GHAS status, existing repository).
const UNPROCESSABLE: ErrorPolicy = ErrorPolicy::ignoring(&[422]);
/// Editing an archived repository is forbidden, which includes archiving it again.
const ALREADY_ARCHIVED: ErrorPolicy = ErrorPolicy::ignoring(&[403]);

pub struct Session<F: ClientFactory = OctocrabFactory> {
    factory: F,
    settle_delay: Duration,
    page_sizes: PageSizes,
    clients: Option<Clients<F::Rest, F::GraphQl>>,
}

impl Session<OctocrabFactory> {
    /// Session talking to GitHub through octocrab, configured by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let factory = match &settings.github.api_url {
            Some(url) => OctocrabFactory::with_base_uri(url.clone()),
            None => OctocrabFactory::new(),
        };
        Session::new(factory, settings)
    }
}

impl<F: ClientFactory> Session<F> {
    pub fn new(factory: F, settings: &Settings) -> Self {
        Self {
            factory,
            settle_delay: settings.settle_delay(),
            page_sizes: settings.pagination,
            clients: None,
        }
    }

    /// Returns the clients for `token`, building them on first use or when
    /// the token differs from the one the cached clients were built with.
    pub fn ensure_clients(&mut self, token: &str) -> Result<&Clients<F::Rest, F::GraphQl>> {
        let stale = self
            .clients
            .as_ref()
            .map_or(true, |clients| clients.token() != token);

        if stale {
            self.clients = None;
            let (rest, graphql) = self.factory.build(token)?;
            debug!("GitHub clients (re)built for a new access token");
            self.clients = Some(Clients::new(token, rest, graphql));
        }

        self.clients
            .as_ref()
            .ok_or_else(|| Error::ClientInit("no clients available".to_string()))
    }

    /// Sets the three "enabled for new repositories" GHAS defaults of `org`.
    pub async fn change_ghas_org_settings(
        &mut self,
        token: &str,
        org: &str,
        activate: bool,
    ) -> Result<()> {
        let clients = self.ensure_clients(token)?;
        let defaults = OrganizationSecurityDefaults::all(activate);

        clients.rest.edit_organization(org, &defaults).await?;
        Ok(())
    }

    /// Applies security-and-analysis statuses to `repository`, then waits for
    /// the change to propagate.
    ///
    /// Advanced security is left untouched on public repositories. A 422 is
    /// taken as "already in that state".
    pub async fn change_ghas_repo_settings(
        &mut self,
        token: &str,
        org: &str,
        repository: &Repository,
        advanced_security: FeatureStatus,
        secret_scanning: FeatureStatus,
        push_protection: FeatureStatus,
    ) -> Result<()> {
        let settle_delay = self.settle_delay;
        let clients = self.ensure_clients(token)?;
        let settings = SecurityAndAnalysis::for_repository(
            repository,
            advanced_security,
            secret_scanning,
            push_protection,
        );
        let patch = RepositoryPatch::security_and_analysis(settings);

        let result = clients
            .rest
            .edit_repository(org, &repository.name, &patch)
            .await;

        if !settle_delay.is_zero() {
            debug!(
                "waiting {} seconds for changes to apply...",
                settle_delay.as_secs()
            );
            tokio::time::sleep(settle_delay).await;
        }

        ignore_benign(result, UNPROCESSABLE, "security settings", org, &repository.name)
    }

    pub async fn get_repository(&mut self, token: &str, org: &str, name: &str) -> Result<Repository> {
        let clients = self.ensure_clients(token)?;

        match resolve(
            clients.rest.get_repository(org, name).await,
            ErrorPolicy::NOT_FOUND_ON_404,
        ) {
            Outcome::Success(repository) => Ok(repository),
            Outcome::NotFound(_) => Err(Error::RepositoryNotFound {
                org: org.to_string(),
                repo: name.to_string(),
            }),
            Outcome::Ignored(err) | Outcome::Failed(err) => Err(err.into()),
        }
    }

    /// Every repository of `org` (all types), in GitHub's order.
    pub async fn get_repositories(&mut self, token: &str, org: &str) -> Result<Vec<Repository>> {
        let per_page = self.page_sizes.repositories;
        let clients = self.ensure_clients(token)?;

        let repositories = collect_all(FIRST_PAGE, |page| {
            clients.rest.list_org_repositories(org, page, per_page)
        })
        .await?;
        debug!(org, count = repositories.len(), "listed repositories");
        Ok(repositories)
    }

    pub async fn change_repository_visibility(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        visibility: Visibility,
    ) -> Result<()> {
        let clients = self.ensure_clients(token)?;
        let result = clients
            .rest
            .edit_repository(org, repo, &RepositoryPatch::visibility(visibility))
            .await;

        ignore_benign(result, UNPROCESSABLE, "visibility", org, repo)
    }

    pub async fn archive_repository(&mut self, token: &str, org: &str, repo: &str) -> Result<()> {
        self.change_archive_state(token, org, repo, true).await
    }

    pub async fn unarchive_repository(&mut self, token: &str, org: &str, repo: &str) -> Result<()> {
        self.change_archive_state(token, org, repo, false).await
    }

    pub async fn change_archive_state(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        archived: bool,
    ) -> Result<()> {
        let clients = self.ensure_clients(token)?;
        let result = clients
            .rest
            .edit_repository(org, repo, &RepositoryPatch::archived(archived))
            .await;

        ignore_benign(result, ALREADY_ARCHIVED, "archive state", org, repo)
    }

    /// Creates an empty repository; an existing one with that name is fine.
    pub async fn create_repository(&mut self, token: &str, org: &str, name: &str) -> Result<()> {
        let clients = self.ensure_clients(token)?;
        let result = clients.rest.create_repository(org, name).await;

        ignore_benign(result, UNPROCESSABLE, "creation", org, name)
    }

    pub async fn get_all_workflows(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
    ) -> Result<Vec<Workflow>> {
        let per_page = self.page_sizes.workflows;
        let clients = self.ensure_clients(token)?;

        let workflows = collect_all(FIRST_PAGE, |page| {
            clients.rest.list_workflows(org, repo, page, per_page)
        })
        .await?;
        Ok(workflows)
    }

    pub async fn get_active_workflows(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
    ) -> Result<Vec<Workflow>> {
        let workflows = self.get_all_workflows(token, org, repo).await?;
        Ok(workflows.into_iter().filter(Workflow::is_active).collect())
    }

    /// Disables each workflow. A workflow GitHub refuses to disable does not
    /// stop the migration; only transport failures are returned.
    pub async fn disable_workflows(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        workflows: &[Workflow],
    ) -> Result<()> {
        let clients = self.ensure_clients(token)?;

        for workflow in workflows {
            let result = clients
                .rest
                .set_workflow_enabled(org, repo, workflow.id, false)
                .await;
            match resolve(result, ErrorPolicy::ANY_PROVIDER_ERROR) {
                Outcome::Success(()) => {}
                Outcome::Ignored(err) | Outcome::NotFound(err) => debug!(
                    "failed to disable workflow: {} - will not stop migration ({err})",
                    workflow.name
                ),
                Outcome::Failed(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Enables each workflow; 422 (cannot be enabled, e.g. already active) is skipped.
    pub async fn enable_workflows(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        workflows: &[Workflow],
    ) -> Result<()> {
        let clients = self.ensure_clients(token)?;

        for workflow in workflows {
            let result = clients
                .rest
                .set_workflow_enabled(org, repo, workflow.id, true)
                .await;
            ignore_benign(result, UNPROCESSABLE, "workflow enable", org, repo)?;
        }
        Ok(())
    }

    /// Code scanning analyses for `default_branch`; empty when code scanning
    /// has never run (GitHub answers 404).
    pub async fn get_code_scanning_analyses(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Vec<ScanningAnalysis>> {
        let clients = self.ensure_clients(token)?;
        let result = clients
            .rest
            .list_code_scanning_analyses(org, repo, default_branch)
            .await;

        match resolve(result, ErrorPolicy::NOT_FOUND_ON_404) {
            Outcome::Success(analyses) => Ok(analyses),
            Outcome::NotFound(_) => Ok(Vec::new()),
            Outcome::Ignored(err) | Outcome::Failed(err) => Err(err.into()),
        }
    }

    pub async fn has_code_scanning_analysis(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<bool> {
        let analyses = self
            .get_code_scanning_analyses(token, org, repo, default_branch)
            .await?;
        Ok(!analyses.is_empty())
    }

    pub async fn create_issue(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> Result<Issue> {
        let clients = self.ensure_clients(token)?;
        Ok(clients.rest.create_issue(org, repo, title, body).await?)
    }

    pub async fn get_issue(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
        number: u64,
    ) -> Result<Issue> {
        let clients = self.ensure_clients(token)?;

        match resolve(
            clients.rest.get_issue(org, repo, number).await,
            ErrorPolicy::NOT_FOUND_ON_404,
        ) {
            Outcome::Success(issue) => Ok(issue),
            Outcome::NotFound(_) => Err(Error::IssueNotFound {
                org: org.to_string(),
                repo: repo.to_string(),
                number,
            }),
            Outcome::Ignored(err) | Outcome::Failed(err) => Err(err.into()),
        }
    }

    pub async fn list_branch_protection_rules(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
    ) -> Result<Vec<BranchProtectionRule>> {
        let first = self.page_sizes.branch_protection_rules;
        let clients = self.ensure_clients(token)?;

        let rules = collect_all(Cursor::None, |after| {
            clients.graphql.branch_protection_rules(org, repo, first, after)
        })
        .await?;
        Ok(rules)
    }

    /// Deletes every branch protection rule of `repo`, returning how many were
    /// deleted.
    ///
    /// Stops at the first failed deletion; rules deleted before it stay deleted.
    pub async fn delete_branch_protections(
        &mut self,
        token: &str,
        org: &str,
        repo: &str,
    ) -> Result<usize> {
        let rules = self.list_branch_protection_rules(token, org, repo).await?;
        let clients = self.ensure_clients(token)?;

        for (deleted, rule) in rules.iter().enumerate() {
            if let Err(source) = clients.graphql.delete_branch_protection_rule(&rule.id).await {
                return Err(Error::BranchProtectionDeletion {
                    org: org.to_string(),
                    repo: repo.to_string(),
                    rule_id: rule.id.clone(),
                    deleted,
                    source,
                });
            }
        }
        debug!(org, repo, count = rules.len(), "deleted branch protection rules");
        Ok(rules.len())
    }

    /// Logins of every organization in `enterprise`.
    pub async fn list_enterprise_organizations(
        &mut self,
        token: &str,
        enterprise: &str,
    ) -> Result<Vec<String>> {
        let first = self.page_sizes.enterprise_organizations;
        let clients = self.ensure_clients(token)?;

        let organizations = collect_all(Cursor::None, |after| {
            clients.graphql.enterprise_organizations(enterprise, first, after)
        })
        .await?;
        Ok(organizations)
    }
}

fn ignore_benign(
    result: ApiResult<()>,
    policy: ErrorPolicy,
    change: &str,
    org: &str,
    repo: &str,
) -> Result<()> {
    match resolve(result, policy) {
        Outcome::Success(()) => Ok(()),
        Outcome::Ignored(err) => {
            debug!("skipping {change} change for {org}/{repo}: {err}");
            Ok(())
        }
        Outcome::NotFound(err) | Outcome::Failed(err) => Err(err.into()),
    }
}
