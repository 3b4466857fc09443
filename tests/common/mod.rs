//! In-memory GitHub used by the integration tests.
//!
//! `FakeGitHub` answers the way github.com does for the cases the migration
//! relies on (422 when nothing changes, 403 on archived repositories, 404 for
//! missing entities). Any call can additionally be scripted to fail.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use gei_migration_helper::api::{ClientFactory, Cursor, GraphQlApi, PageNumber, RestApi};
use gei_migration_helper::error::ApiResult;
use gei_migration_helper::models::{
    FeatureSetting, OrganizationSecurityDefaults, Owner, RepositoryPatch, SecurityAndAnalysis,
};
use gei_migration_helper::pagination::Page;
use gei_migration_helper::{
    ApiError, BranchProtectionRule, Error, Issue, Repository, ScanningAnalysis, Session, Settings,
    Visibility, Workflow, WorkflowState,
};

#[derive(Default)]
pub struct State {
    pub repositories: Vec<Repository>,
    /// Keyed by repository name.
    pub workflows: HashMap<String, Vec<Workflow>>,
    pub analyses: HashMap<String, Vec<ScanningAnalysis>>,
    pub rules: Vec<BranchProtectionRule>,
    pub issues: Vec<Issue>,
    pub organizations: Vec<String>,
    pub org_defaults: HashMap<String, OrganizationSecurityDefaults>,
    /// Request bodies of every `edit_repository` call, accepted or not.
    pub patches: Vec<RepositoryPatch>,
    /// Every call made, in order, as `"<method> <target>"`.
    pub calls: Vec<String>,
    failures: HashMap<String, ApiError>,
}

impl State {
    fn call(&mut self, call: String) -> ApiResult<()> {
        let failure = self.failures.get(&call).cloned();
        self.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn repository_mut(&mut self, org: &str, name: &str) -> ApiResult<&mut Repository> {
        self.repositories
            .iter_mut()
            .find(|repo| repo.owner_login() == Some(org) && repo.name == name)
            .ok_or_else(not_found)
    }
}

#[derive(Clone, Default)]
pub struct FakeGitHub {
    state: Arc<Mutex<State>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_repository(&self, repository: Repository) {
        self.state().repositories.push(repository);
    }

    pub fn repository(&self, org: &str, name: &str) -> Repository {
        self.state().repository_mut(org, name).unwrap().clone()
    }

    /// Makes every subsequent call matching `call` fail with `err`.
    pub fn fail(&self, call: impl Into<String>, err: ApiError) {
        self.state().failures.insert(call.into(), err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        let prefix = format!("{method} ");
        self.state()
            .calls
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }
}

fn not_found() -> ApiError {
    ApiError::provider(404, "Not Found")
}

fn unprocessable(message: &str) -> ApiError {
    ApiError::provider(422, message)
}

fn page_of<T: Clone>(items: &[T], page: PageNumber, per_page: u8) -> Page<T, PageNumber> {
    let per_page = usize::from(per_page);
    let start = (page as usize - 1) * per_page;
    let end = (start + per_page).min(items.len());
    let chunk = items.get(start..end).unwrap_or_default().to_vec();

    if end < items.len() {
        Page::with_next(chunk, page + 1)
    } else {
        Page::last(chunk)
    }
}

fn connection_of<T: Clone>(items: &[T], first: u8, after: Cursor) -> Page<T, Cursor> {
    let start = after.map_or(0, |cursor| cursor.parse::<usize>().unwrap());
    let end = (start + usize::from(first)).min(items.len());
    let chunk = items[start..end].to_vec();

    if end < items.len() {
        Page::with_next(chunk, Some(end.to_string()))
    } else {
        Page::last(chunk)
    }
}

fn merge(current: &mut Option<FeatureSetting>, update: &Option<FeatureSetting>) -> bool {
    match update {
        Some(update) if current.as_ref() != Some(update) => {
            *current = Some(update.clone());
            true
        }
        _ => false,
    }
}

#[async_trait]
impl RestApi for FakeGitHub {
    async fn edit_organization(
        &self,
        org: &str,
        defaults: &OrganizationSecurityDefaults,
    ) -> ApiResult<()> {
        let mut state = self.state();
        state.call(format!("edit_organization {org}"))?;
        state.org_defaults.insert(org.to_string(), defaults.clone());
        Ok(())
    }

    async fn get_repository(&self, org: &str, repo: &str) -> ApiResult<Repository> {
        let mut state = self.state();
        state.call(format!("get_repository {org}/{repo}"))?;
        state.repository_mut(org, repo).cloned()
    }

    async fn list_org_repositories(
        &self,
        org: &str,
        page: PageNumber,
        per_page: u8,
    ) -> ApiResult<Page<Repository, PageNumber>> {
        let mut state = self.state();
        state.call(format!("list_org_repositories {org} page={page}"))?;
        let repositories: Vec<_> = state
            .repositories
            .iter()
            .filter(|repo| repo.owner_login() == Some(org))
            .cloned()
            .collect();
        Ok(page_of(&repositories, page, per_page))
    }

    async fn edit_repository(
        &self,
        org: &str,
        repo: &str,
        patch: &RepositoryPatch,
    ) -> ApiResult<()> {
        let mut state = self.state();
        state.call(format!("edit_repository {org}/{repo}"))?;
        state.patches.push(patch.clone());
        let repository = state.repository_mut(org, repo)?;

        if repository.archived && patch.archived != Some(false) {
            return Err(ApiError::provider(
                403,
                "Repository was archived so is read-only.",
            ));
        }
        if let Some(archived) = patch.archived {
            repository.archived = archived;
        }

        if let Some(visibility) = patch.visibility {
            if repository.visibility == Some(visibility) {
                return Err(unprocessable("Visibility is already set"));
            }
            repository.visibility = Some(visibility);
        }

        if let Some(update) = &patch.security_and_analysis {
            if repository.is_public() && update.advanced_security.is_some() {
                return Err(unprocessable(
                    "Advanced security is always enabled for public repos",
                ));
            }
            let current = repository
                .security_and_analysis
                .get_or_insert_with(SecurityAndAnalysis::default);
            let mut changed = merge(&mut current.advanced_security, &update.advanced_security);
            changed |= merge(&mut current.secret_scanning, &update.secret_scanning);
            changed |= merge(
                &mut current.secret_scanning_push_protection,
                &update.secret_scanning_push_protection,
            );
            if !changed {
                return Err(unprocessable("No security settings were changed"));
            }
        }
        Ok(())
    }

    async fn create_repository(&self, org: &str, name: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.call(format!("create_repository {org}/{name}"))?;
        if state.repository_mut(org, name).is_ok() {
            return Err(unprocessable("name already exists on this account"));
        }
        state
            .repositories
            .push(repository(org, name, Visibility::Private));
        Ok(())
    }

    async fn list_workflows(
        &self,
        org: &str,
        repo: &str,
        page: PageNumber,
        per_page: u8,
    ) -> ApiResult<Page<Workflow, PageNumber>> {
        let mut state = self.state();
        state.call(format!("list_workflows {org}/{repo} page={page}"))?;
        let workflows = state.workflows.get(repo).cloned().unwrap_or_default();
        Ok(page_of(&workflows, page, per_page))
    }

    async fn set_workflow_enabled(
        &self,
        org: &str,
        repo: &str,
        workflow_id: u64,
        enabled: bool,
    ) -> ApiResult<()> {
        let mut state = self.state();
        let action = if enabled { "enable" } else { "disable" };
        state.call(format!("{action}_workflow {org}/{repo} {workflow_id}"))?;
        let workflow = state
            .workflows
            .get_mut(repo)
            .and_then(|workflows| workflows.iter_mut().find(|w| w.id == workflow_id))
            .ok_or_else(not_found)?;

        if workflow.state == WorkflowState::Deleted {
            return Err(unprocessable("Workflow has been deleted"));
        }
        workflow.state = if enabled {
            WorkflowState::Active
        } else {
            WorkflowState::DisabledManually
        };
        Ok(())
    }

    async fn list_code_scanning_analyses(
        &self,
        org: &str,
        repo: &str,
        git_ref: &str,
    ) -> ApiResult<Vec<ScanningAnalysis>> {
        let mut state = self.state();
        state.call(format!("list_code_scanning_analyses {org}/{repo}@{git_ref}"))?;
        match state.analyses.get(repo) {
            Some(analyses) => Ok(analyses
                .iter()
                .filter(|analysis| analysis.git_ref.ends_with(git_ref))
                .cloned()
                .collect()),
            None => Err(ApiError::provider(404, "no analysis found")),
        }
    }

    async fn create_issue(
        &self,
        org: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> ApiResult<Issue> {
        let mut state = self.state();
        state.call(format!("create_issue {org}/{repo}"))?;
        let issue = Issue {
            number: state.issues.len() as u64 + 1,
            title: title.to_string(),
            body: Some(body.to_string()),
            html_url: None,
        };
        state.issues.push(issue.clone());
        Ok(issue)
    }

    async fn get_issue(&self, org: &str, repo: &str, number: u64) -> ApiResult<Issue> {
        let mut state = self.state();
        state.call(format!("get_issue {org}/{repo}#{number}"))?;
        state
            .issues
            .iter()
            .find(|issue| issue.number == number)
            .cloned()
            .ok_or_else(not_found)
    }
}

#[async_trait]
impl GraphQlApi for FakeGitHub {
    async fn branch_protection_rules(
        &self,
        org: &str,
        repo: &str,
        first: u8,
        after: Cursor,
    ) -> ApiResult<Page<BranchProtectionRule, Cursor>> {
        let mut state = self.state();
        let cursor = after.clone().unwrap_or_default();
        state.call(format!("branch_protection_rules {org}/{repo} after={cursor}"))?;
        Ok(connection_of(&state.rules, first, after))
    }

    async fn delete_branch_protection_rule(&self, rule_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.call(format!("delete_branch_protection_rule {rule_id}"))?;
        let before = state.rules.len();
        state.rules.retain(|rule| rule.id != rule_id);
        if state.rules.len() == before {
            return Err(ApiError::Query {
                kind: Some("NOT_FOUND".to_string()),
                message: format!("Could not resolve to a node with the global id of '{rule_id}'"),
            });
        }
        Ok(())
    }

    async fn enterprise_organizations(
        &self,
        enterprise: &str,
        first: u8,
        after: Cursor,
    ) -> ApiResult<Page<String, Cursor>> {
        let mut state = self.state();
        let cursor = after.clone().unwrap_or_default();
        state.call(format!("enterprise_organizations {enterprise} after={cursor}"))?;
        Ok(connection_of(&state.organizations, first, after))
    }
}

/// Hands out clients backed by one shared [`FakeGitHub`] and records every
/// token it was asked to build clients for.
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub github: FakeGitHub,
    builds: Arc<AtomicUsize>,
    tokens: Arc<Mutex<Vec<String>>>,
    broken: bool,
}

impl FakeFactory {
    pub fn new(github: FakeGitHub) -> Self {
        FakeFactory {
            github,
            ..Default::default()
        }
    }

    /// A factory whose transport can never be built.
    pub fn broken(github: FakeGitHub) -> Self {
        FakeFactory {
            github,
            broken: true,
            ..Default::default()
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

impl ClientFactory for FakeFactory {
    type Rest = FakeGitHub;
    type GraphQl = FakeGitHub;

    fn build(&self, token: &str) -> Result<(FakeGitHub, FakeGitHub), Error> {
        if self.broken {
            return Err(Error::ClientInit("invalid header value".to_string()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());
        Ok((self.github.clone(), self.github.clone()))
    }
}

pub const TOKEN: &str = "ghp_first";
pub const OTHER_TOKEN: &str = "ghp_second";

/// A session over `factory` that does not wait after security changes.
pub fn session(factory: &FakeFactory) -> Session<FakeFactory> {
    let settings = Settings::default().with_settle_delay(Duration::ZERO);
    Session::new(factory.clone(), &settings)
}

pub fn repository(org: &str, name: &str, visibility: Visibility) -> Repository {
    Repository {
        name: name.to_string(),
        owner: Some(Owner {
            login: org.to_string(),
        }),
        visibility: Some(visibility),
        archived: false,
        default_branch: Some("main".to_string()),
        security_and_analysis: None,
    }
}

pub fn workflow(id: u64, state: WorkflowState) -> Workflow {
    Workflow {
        id,
        name: format!("workflow-{id}"),
        path: Some(format!(".github/workflows/workflow-{id}.yml")),
        state,
    }
}

pub fn rule(id: &str) -> BranchProtectionRule {
    BranchProtectionRule { id: id.to_string() }
}
