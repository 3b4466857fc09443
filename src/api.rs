//! Provider interfaces used by [`Session`](crate::Session).
//!
//! [`RestApi`] and [`GraphQlApi`] are one method per GitHub call; they do no
//! classification of their own and report failures as [`ApiError`]. The
//! octocrab-backed implementations live in [`crate::github`].

use async_trait::async_trait;

use crate::error::{ApiResult, Result};
use crate::models::{
    BranchProtectionRule, Issue, OrganizationSecurityDefaults, Repository, RepositoryPatch,
    ScanningAnalysis, Workflow,
};
use crate::pagination::Page;

/// REST pages are numbered from 1.
pub type PageNumber = u32;

/// GraphQL connections resume after an opaque cursor; `None` is the start.
pub type Cursor = Option<String>;

#[async_trait]
pub trait RestApi: Send + Sync {
    async fn edit_organization(
        &self,
        org: &str,
        defaults: &OrganizationSecurityDefaults,
    ) -> ApiResult<()>;

    async fn get_repository(&self, org: &str, repo: &str) -> ApiResult<Repository>;

    async fn list_org_repositories(
        &self,
        org: &str,
        page: PageNumber,
        per_page: u8,
    ) -> ApiResult<Page<Repository, PageNumber>>;

    async fn edit_repository(&self, org: &str, repo: &str, patch: &RepositoryPatch)
        -> ApiResult<()>;

    async fn create_repository(&self, org: &str, name: &str) -> ApiResult<()>;

    async fn list_workflows(
        &self,
        org: &str,
        repo: &str,
        page: PageNumber,
        per_page: u8,
    ) -> ApiResult<Page<Workflow, PageNumber>>;

    async fn set_workflow_enabled(
        &self,
        org: &str,
        repo: &str,
        workflow_id: u64,
        enabled: bool,
    ) -> ApiResult<()>;

    async fn list_code_scanning_analyses(
        &self,
        org: &str,
        repo: &str,
        git_ref: &str,
    ) -> ApiResult<Vec<ScanningAnalysis>>;

    async fn create_issue(&self, org: &str, repo: &str, title: &str, body: &str)
        -> ApiResult<Issue>;

    async fn get_issue(&self, org: &str, repo: &str, number: u64) -> ApiResult<Issue>;
}

#[async_trait]
pub trait GraphQlApi: Send + Sync {
    async fn branch_protection_rules(
        &self,
        org: &str,
        repo: &str,
        first: u8,
        after: Cursor,
    ) -> ApiResult<Page<BranchProtectionRule, Cursor>>;

    async fn delete_branch_protection_rule(&self, rule_id: &str) -> ApiResult<()>;

    async fn enterprise_organizations(
        &self,
        enterprise: &str,
        first: u8,
        after: Cursor,
    ) -> ApiResult<Page<String, Cursor>>;
}

/// Builds the REST and GraphQL clients for one access token.
pub trait ClientFactory {
    type Rest: RestApi;
    type GraphQl: GraphQlApi;

    fn build(&self, token: &str) -> Result<(Self::Rest, Self::GraphQl)>;
}

/// The client pair built for `token`.
pub struct Clients<R, G> {
    token: String,
    pub rest: R,
    pub graphql: G,
}

impl<R, G> Clients<R, G> {
    pub fn new(token: impl Into<String>, rest: R, graphql: G) -> Self {
        Clients {
            token: token.into(),
            rest,
            graphql,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}
