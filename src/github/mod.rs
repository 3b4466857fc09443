//! octocrab-backed implementations of [`RestApi`](crate::api::RestApi) and
//! [`GraphQlApi`](crate::api::GraphQlApi).

mod graphql;
mod rate_limit;
mod rest;

use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use tracing::debug;

pub use graphql::GraphQlClient;
pub use rate_limit::{RateLimitWaiter, RateResource};
pub use rest::RestClient;

use crate::api::ClientFactory;
use crate::error::{Error, Result};

/// Builds a token-authenticated octocrab transport wrapped in a
/// [`RateLimitWaiter`], shared by the REST and GraphQL clients.
#[derive(Debug, Clone, Default)]
pub struct OctocrabFactory {
    base_uri: Option<String>,
}

impl OctocrabFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets a GitHub Enterprise Server API root instead of api.github.com.
    pub fn with_base_uri(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: Some(base_uri.into()),
        }
    }
}

impl ClientFactory for OctocrabFactory {
    type Rest = RestClient;
    type GraphQl = GraphQlClient;

    fn build(&self, token: &str) -> Result<(RestClient, GraphQlClient)> {
        // RateLimitWaiter is the only retry path.
        let mut builder = Octocrab::builder()
            .add_retry_config(RetryConfig::None)
            .personal_token(token.to_string());
        if let Some(base_uri) = &self.base_uri {
            builder = builder
                .base_uri(base_uri.as_str())
                .map_err(|e| Error::ClientInit(e.to_string()))?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| Error::ClientInit(e.to_string()))?;
        debug!(base_uri = ?self.base_uri, "built GitHub clients");

        let transport = RateLimitWaiter::new(octocrab);
        let graphql = transport.for_resource(RateResource::GraphQl);
        Ok((RestClient::new(transport), GraphQlClient::new(graphql)))
    }
}
