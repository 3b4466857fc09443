//! Error types and the per-operation error classifier.
//!
//! Every provider call returns an [`ApiError`] on failure. The error carries
//! the HTTP status (when there was a response) so that each operation can
//! decide, through an [`ErrorPolicy`], whether the failure is ignorable,
//! means "not found", or must be propagated.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single call to GitHub.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No usable HTTP response: connection failure, timeout, undecodable body.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A non-2xx REST response.
    #[error("GitHub returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// The GraphQL endpoint answered with an `errors` array.
    #[error("GraphQL error: {message}")]
    Query {
        kind: Option<String>,
        message: String,
    },
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
        }
    }

    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        ApiError::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            ApiError::Provider { status: 429, .. } => true,
            ApiError::Provider {
                status: 403,
                message,
            } => message.to_ascii_lowercase().contains("rate limit"),
            ApiError::Query { kind, .. } => kind.as_deref() == Some("RATE_LIMITED"),
            ApiError::Provider { .. } | ApiError::Transport { .. } => false,
        }
    }
}

impl From<octocrab::Error> for ApiError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => ApiError::Provider {
                status: source.status_code.as_u16(),
                message: source.message,
            },
            other => ApiError::Transport {
                message: other.to_string(),
            },
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// How a failed call should be treated by the calling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ignorable,
    NotFound,
    Fatal,
}

/// The benign-failure carve-outs of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    ignorable: &'static [u16],
    not_found: bool,
    any_provider_error: bool,
}

impl ErrorPolicy {
    /// Every failure is fatal.
    pub const STRICT: ErrorPolicy = ErrorPolicy {
        ignorable: &[],
        not_found: false,
        any_provider_error: false,
    };

    /// 404 means the entity does not exist.
    pub const NOT_FOUND_ON_404: ErrorPolicy = ErrorPolicy {
        ignorable: &[],
        not_found: true,
        any_provider_error: false,
    };

    /// Any response from GitHub, whatever its status, is ignorable.
    pub const ANY_PROVIDER_ERROR: ErrorPolicy = ErrorPolicy {
        ignorable: &[],
        not_found: false,
        any_provider_error: true,
    };

    pub const fn ignoring(statuses: &'static [u16]) -> Self {
        ErrorPolicy {
            ignorable: statuses,
            not_found: false,
            any_provider_error: false,
        }
    }

    pub fn classify(&self, err: &ApiError) -> Disposition {
        if err.is_rate_limited() {
            return Disposition::Fatal;
        }

        match err {
            ApiError::Transport { .. } => Disposition::Fatal,
            ApiError::Query { .. } if self.any_provider_error => Disposition::Ignorable,
            ApiError::Query { .. } => Disposition::Fatal,
            ApiError::Provider { status, .. } => {
                if self.not_found && *status == 404 {
                    Disposition::NotFound
                } else if self.any_provider_error || self.ignorable.contains(status) {
                    Disposition::Ignorable
                } else {
                    Disposition::Fatal
                }
            }
        }
    }
}

/// A provider call result after classification.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Ignored(ApiError),
    NotFound(ApiError),
    Failed(ApiError),
}

pub fn resolve<T>(result: ApiResult<T>, policy: ErrorPolicy) -> Outcome<T> {
    match result {
        Ok(value) => Outcome::Success(value),
        Err(err) => match policy.classify(&err) {
            Disposition::Ignorable => Outcome::Ignored(err),
            Disposition::NotFound => Outcome::NotFound(err),
            Disposition::Fatal => Outcome::Failed(err),
        },
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to initialise GitHub clients: {0}")]
    ClientInit(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("repository {org}/{repo} not found")]
    RepositoryNotFound { org: String, repo: String },

    #[error("issue #{number} not found in {org}/{repo}")]
    IssueNotFound {
        org: String,
        repo: String,
        number: u64,
    },

    #[error("error deleting branch protection rules for {org}/{repo} (rule {rule_id}, {deleted} already deleted)")]
    BranchProtectionDeletion {
        org: String,
        repo: String,
        rule_id: String,
        deleted: usize,
        #[source]
        source: ApiError,
    },

    #[error("invalid configuration in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl Error {
    /// HTTP status of the underlying provider failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) | Error::BranchProtectionDeletion { source: err, .. } => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::RepositoryNotFound { .. } | Error::IssueNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
