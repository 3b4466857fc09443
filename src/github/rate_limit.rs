use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{ApiError, ApiResult};

/// GitHub asks clients that hit a secondary limit to back off for at least a minute.
const SECONDARY_LIMIT_WAIT: Duration = Duration::from_secs(60);
const RESET_MARGIN: Duration = Duration::from_secs(1);

/// The quota a client's requests count against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateResource {
    Core,
    GraphQl,
}

/// Authenticated octocrab transport that waits out rate-limit windows.
///
/// Requests are serialized: a clone shares the same in-flight lock, so the
/// REST and GraphQL clients built from one token never overlap.
#[derive(Clone)]
pub struct RateLimitWaiter {
    octocrab: Arc<Octocrab>,
    in_flight: Arc<Mutex<()>>,
    resource: RateResource,
}

impl RateLimitWaiter {
    pub fn new(octocrab: Octocrab) -> Self {
        Self {
            octocrab: Arc::new(octocrab),
            in_flight: Arc::new(Mutex::new(())),
            resource: RateResource::Core,
        }
    }

    /// The same transport and in-flight lock, waiting on `resource`'s reset.
    pub fn for_resource(&self, resource: RateResource) -> Self {
        Self {
            resource,
            ..self.clone()
        }
    }

    pub fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }

    /// Runs `request`, re-issuing it after the reset time whenever GitHub
    /// reports an exhausted rate limit.
    pub async fn send<T, E, F, Fut>(&self, mut request: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApiError>,
    {
        let _in_flight = self.in_flight.lock().await;

        loop {
            let result: ApiResult<T> = request().await.map_err(Into::into);
            match result {
                Err(err) if err.is_rate_limited() => {
                    let wait = self.time_until_reset().await?;
                    warn!(
                        wait_secs = wait.as_secs(),
                        "GitHub rate limit exceeded ({err}), waiting for the window to reset"
                    );
                    tokio::time::sleep(wait).await;
                }
                result => return result,
            }
        }
    }

    async fn time_until_reset(&self) -> ApiResult<Duration> {
        let limits = self.octocrab.ratelimit().get().await?;
        let rate = match self.resource {
            RateResource::Core => &limits.resources.core,
            RateResource::GraphQl => limits
                .resources
                .graphql
                .as_ref()
                .unwrap_or(&limits.resources.core),
        };
        let reset_at = DateTime::from_timestamp(rate.reset as i64, 0).unwrap_or_else(Utc::now);

        Ok(reset_wait(rate.remaining, reset_at, Utc::now()))
    }
}

fn reset_wait(remaining: usize, reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    if remaining > 0 {
        return SECONDARY_LIMIT_WAIT;
    }

    (reset_at - now).to_std().unwrap_or(Duration::ZERO) + RESET_MARGIN
}
