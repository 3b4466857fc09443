use async_trait::async_trait;
use serde_json::json;

use super::rate_limit::RateLimitWaiter;
use crate::api::{PageNumber, RestApi};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Issue, OrganizationSecurityDefaults, Repository, RepositoryPatch, ScanningAnalysis, Workflow,
};
use crate::pagination::Page;

#[derive(serde::Serialize)]
struct ListParams {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    per_page: u8,
    page: PageNumber,
}

#[derive(serde::Serialize)]
struct AnalysesParams<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

/// GitHub REST v3 client.
#[derive(Clone)]
pub struct RestClient {
    transport: RateLimitWaiter,
}

impl RestClient {
    pub fn new(transport: RateLimitWaiter) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl RestApi for RestClient {
    async fn edit_organization(
        &self,
        org: &str,
        defaults: &OrganizationSecurityDefaults,
    ) -> ApiResult<()> {
        let octocrab = self.transport.octocrab();
        let route = format!("/orgs/{org}");

        let _: serde_json::Value = self
            .transport
            .send(|| octocrab.patch(&route, Some(defaults)))
            .await?;
        Ok(())
    }

    async fn get_repository(&self, org: &str, repo: &str) -> ApiResult<Repository> {
        let octocrab = self.transport.octocrab();
        let route = format!("/repos/{org}/{repo}");

        self.transport
            .send(|| octocrab.get(&route, None::<&()>))
            .await
    }

    async fn list_org_repositories(
        &self,
        org: &str,
        page: PageNumber,
        per_page: u8,
    ) -> ApiResult<Page<Repository, PageNumber>> {
        let octocrab = self.transport.octocrab();
        let route = format!("/orgs/{org}/repos");
        let params = ListParams {
            kind: Some("all"),
            per_page,
            page,
        };

        let response: octocrab::Page<Repository> = self
            .transport
            .send(|| octocrab.get(&route, Some(&params)))
            .await?;
        Ok(into_page(response, page))
    }

    async fn edit_repository(
        &self,
        org: &str,
        repo: &str,
        patch: &RepositoryPatch,
    ) -> ApiResult<()> {
        let octocrab = self.transport.octocrab();
        let route = format!("/repos/{org}/{repo}");

        let _: serde_json::Value = self
            .transport
            .send(|| octocrab.patch(&route, Some(patch)))
            .await?;
        Ok(())
    }

    async fn create_repository(&self, org: &str, name: &str) -> ApiResult<()> {
        let octocrab = self.transport.octocrab();
        let route = format!("/orgs/{org}/repos");
        let body = json!({ "name": name });

        let _: serde_json::Value = self
            .transport
            .send(|| octocrab.post(&route, Some(&body)))
            .await?;
        Ok(())
    }

    async fn list_workflows(
        &self,
        org: &str,
        repo: &str,
        page: PageNumber,
        per_page: u8,
    ) -> ApiResult<Page<Workflow, PageNumber>> {
        let octocrab = self.transport.octocrab();
        let route = format!("/repos/{org}/{repo}/actions/workflows");
        let params = ListParams {
            kind: None,
            per_page,
            page,
        };

        let response: octocrab::Page<Workflow> = self
            .transport
            .send(|| octocrab.get(&route, Some(&params)))
            .await?;
        Ok(into_page(response, page))
    }

    async fn set_workflow_enabled(
        &self,
        org: &str,
        repo: &str,
        workflow_id: u64,
        enabled: bool,
    ) -> ApiResult<()> {
        let octocrab = self.transport.octocrab();
        let action = if enabled { "enable" } else { "disable" };
        let route = format!("/repos/{org}/{repo}/actions/workflows/{workflow_id}/{action}");
        let route = route.as_str();

        // 204 with an empty body, so the response is checked by hand
        self.transport
            .send(|| async move {
                let response = octocrab._put(route, None::<&()>).await?;
                let status = response.status();
                let remaining = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|value| value.to_str().ok());
                empty_response(status.as_u16(), status.canonical_reason(), remaining)
            })
            .await
    }

    async fn list_code_scanning_analyses(
        &self,
        org: &str,
        repo: &str,
        git_ref: &str,
    ) -> ApiResult<Vec<ScanningAnalysis>> {
        let octocrab = self.transport.octocrab();
        let route = format!("/repos/{org}/{repo}/code-scanning/analyses");
        let params = AnalysesParams { git_ref };

        self.transport
            .send(|| octocrab.get(&route, Some(&params)))
            .await
    }

    async fn create_issue(
        &self,
        org: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> ApiResult<Issue> {
        let octocrab = self.transport.octocrab();
        let route = format!("/repos/{org}/{repo}/issues");
        let body = json!({ "title": title, "body": body });

        self.transport
            .send(|| octocrab.post(&route, Some(&body)))
            .await
    }

    async fn get_issue(&self, org: &str, repo: &str, number: u64) -> ApiResult<Issue> {
        let octocrab = self.transport.octocrab();
        let route = format!("/repos/{org}/{repo}/issues/{number}");

        self.transport
            .send(|| octocrab.get(&route, None::<&()>))
            .await
    }
}

fn into_page<T>(response: octocrab::Page<T>, current: PageNumber) -> Page<T, PageNumber> {
    let next = response.next.as_ref().map(|uri| {
        uri.query()
            .and_then(page_from_query)
            .unwrap_or(current + 1)
    });

    Page {
        items: response.items,
        next,
    }
}

fn page_from_query(query: &str) -> Option<PageNumber> {
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}

fn empty_response(status: u16, reason: Option<&str>, rate_limit_remaining: Option<&str>) -> ApiResult<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    let message = if matches!(status, 403 | 429) && rate_limit_remaining == Some("0") {
        "API rate limit exceeded".to_string()
    } else {
        reason.unwrap_or("request failed").to_string()
    };
    Err(ApiError::provider(status, message))
}
