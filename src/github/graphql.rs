use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::rate_limit::RateLimitWaiter;
use crate::api::{Cursor, GraphQlApi};
use crate::error::{ApiError, ApiResult};
use crate::models::BranchProtectionRule;
use crate::pagination::Page;

const BRANCH_PROTECTION_RULES: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    branchProtectionRules(first: $first, after: $cursor) {
      nodes { id }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const DELETE_BRANCH_PROTECTION_RULE: &str = r#"
mutation($id: ID!) {
  deleteBranchProtectionRule(input: { branchProtectionRuleId: $id }) {
    clientMutationId
  }
}"#;

const ENTERPRISE_ORGANIZATIONS: &str = r#"
query($slug: String!, $first: Int!, $cursor: String) {
  enterprise(slug: $slug) {
    organizations(first: $first, after: $cursor) {
      nodes { login }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

#[derive(serde::Deserialize, Debug)]
struct Envelope<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(serde::Deserialize, Debug)]
struct QueryError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl<D> Envelope<D> {
    fn into_data(self) -> ApiResult<D> {
        if let Some(first) = self.errors.first() {
            let message = self
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::Query {
                kind: first.kind.clone(),
                message,
            });
        }

        self.data.ok_or_else(|| ApiError::Query {
            kind: None,
            message: "response contained no data".to_string(),
        })
    }
}

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    nodes: Vec<N>,
    page_info: PageInfo,
}

impl<N> Connection<N> {
    fn into_page(self) -> Page<N, Cursor> {
        let has_next_page = self.page_info.has_next_page;
        // A next page without a cursor would restart from the first one.
        let next = self
            .page_info
            .end_cursor
            .filter(|_| has_next_page)
            .map(Some);

        Page {
            items: self.nodes,
            next,
        }
    }
}

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RepositoryRules {
    branch_protection_rules: Connection<BranchProtectionRule>,
}

#[derive(serde::Deserialize, Debug)]
struct RepositoryData {
    repository: Option<RepositoryRules>,
}

#[derive(serde::Deserialize, Debug)]
struct Login {
    login: String,
}

#[derive(serde::Deserialize, Debug)]
struct EnterpriseOrganizations {
    organizations: Connection<Login>,
}

#[derive(serde::Deserialize, Debug)]
struct EnterpriseData {
    enterprise: Option<EnterpriseOrganizations>,
}

fn not_found(what: String) -> ApiError {
    ApiError::Query {
        kind: Some("NOT_FOUND".to_string()),
        message: format!("Could not resolve to {what}"),
    }
}

/// GitHub GraphQL v4 client.
#[derive(Clone)]
pub struct GraphQlClient {
    transport: RateLimitWaiter,
}

impl GraphQlClient {
    pub fn new(transport: RateLimitWaiter) -> Self {
        Self { transport }
    }

    async fn run<D: DeserializeOwned>(&self, payload: serde_json::Value) -> ApiResult<D> {
        let octocrab = self.transport.octocrab();
        let payload = &payload;

        // Posted directly so that the `errors` array reaches `into_data`.
        self.transport
            .send(|| async move {
                let envelope: Envelope<D> = octocrab.post("/graphql", Some(payload)).await?;
                envelope.into_data()
            })
            .await
    }
}

#[async_trait]
impl GraphQlApi for GraphQlClient {
    async fn branch_protection_rules(
        &self,
        org: &str,
        repo: &str,
        first: u8,
        after: Cursor,
    ) -> ApiResult<Page<BranchProtectionRule, Cursor>> {
        let payload = json!({
            "query": BRANCH_PROTECTION_RULES,
            "variables": { "owner": org, "name": repo, "first": first, "cursor": after },
        });

        let data: RepositoryData = self.run(payload).await?;
        let repository = data
            .repository
            .ok_or_else(|| not_found(format!("a Repository with the name '{org}/{repo}'")))?;
        Ok(repository.branch_protection_rules.into_page())
    }

    async fn delete_branch_protection_rule(&self, rule_id: &str) -> ApiResult<()> {
        let payload = json!({
            "query": DELETE_BRANCH_PROTECTION_RULE,
            "variables": { "id": rule_id },
        });

        let _: serde_json::Value = self.run(payload).await?;
        Ok(())
    }

    async fn enterprise_organizations(
        &self,
        enterprise: &str,
        first: u8,
        after: Cursor,
    ) -> ApiResult<Page<String, Cursor>> {
        let payload = json!({
            "query": ENTERPRISE_ORGANIZATIONS,
            "variables": { "slug": enterprise, "first": first, "cursor": after },
        });

        let data: EnterpriseData = self.run(payload).await?;
        let enterprise = data
            .enterprise
            .ok_or_else(|| not_found(format!("an Enterprise with the slug '{enterprise}'")))?;
        let page = enterprise.organizations.into_page();

        Ok(Page {
            items: page.items.into_iter().map(|org| org.login).collect(),
            next: page.next,
        })
    }
}
