//! Bulk GitHub Advanced Security changes for GitHub Enterprise Importer
//! migrations: GHAS defaults and statuses, visibility, archive state,
//! workflows and branch protection, applied one repository at a time.

pub mod api;
pub mod config;
pub mod error;
pub mod github;
pub mod models;
pub mod pagination;
pub mod session;

pub use config::Settings;
pub use error::{ApiError, Error, Result};
pub use models::{
    BranchProtectionRule, FeatureStatus, Issue, Repository, ScanningAnalysis, Visibility,
    Workflow, WorkflowState,
};
pub use session::Session;
