use std::fmt;

use chrono::{DateTime, Utc};

#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single security-and-analysis feature.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    Enabled,
    Disabled,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Enabled => "enabled",
            FeatureStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeatureSetting {
    pub status: FeatureStatus,
}

impl From<FeatureStatus> for FeatureSetting {
    fn from(status: FeatureStatus) -> Self {
        FeatureSetting { status }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityAndAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_security: Option<FeatureSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scanning: Option<FeatureSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scanning_push_protection: Option<FeatureSetting>,
}

impl SecurityAndAnalysis {
    /// Builds the update payload for `repository`.
    ///
    /// GitHub always enables advanced security on public repositories and
    /// rejects any attempt to set it, so the field is left out for them.
    pub fn for_repository(
        repository: &Repository,
        advanced_security: FeatureStatus,
        secret_scanning: FeatureStatus,
        push_protection: FeatureStatus,
    ) -> Self {
        let advanced_security = if repository.is_public() {
            None
        } else {
            Some(advanced_security.into())
        };

        SecurityAndAnalysis {
            advanced_security,
            secret_scanning: Some(secret_scanning.into()),
            secret_scanning_push_protection: Some(push_protection.into()),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub login: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub security_and_analysis: Option<SecurityAndAnalysis>,
}

impl Repository {
    pub fn is_public(&self) -> bool {
        self.visibility == Some(Visibility::Public)
    }

    pub fn owner_login(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.login.as_str())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Active,
    Deleted,
    DisabledFork,
    DisabledInactivity,
    DisabledManually,
    #[serde(other)]
    Unknown,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    pub state: WorkflowState,
}

impl Workflow {
    pub fn is_active(&self) -> bool {
        self.state == WorkflowState::Active
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BranchProtectionRule {
    pub id: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTool {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanningAnalysis {
    pub id: u64,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub analysis_key: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub tool: AnalysisTool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub results_count: u64,
    #[serde(default)]
    pub rules_count: u64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Organization-level defaults applied to newly created repositories.
#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OrganizationSecurityDefaults {
    pub advanced_security_enabled_for_new_repositories: bool,
    pub secret_scanning_enabled_for_new_repositories: bool,
    pub secret_scanning_push_protection_enabled_for_new_repositories: bool,
}

impl OrganizationSecurityDefaults {
    pub fn all(enabled: bool) -> Self {
        OrganizationSecurityDefaults {
            advanced_security_enabled_for_new_repositories: enabled,
            secret_scanning_enabled_for_new_repositories: enabled,
            secret_scanning_push_protection_enabled_for_new_repositories: enabled,
        }
    }
}

/// Partial repository update; unset fields are not sent.
#[derive(serde::Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_and_analysis: Option<SecurityAndAnalysis>,
}

impl RepositoryPatch {
    pub fn visibility(visibility: Visibility) -> Self {
        RepositoryPatch {
            visibility: Some(visibility),
            ..Default::default()
        }
    }

    pub fn archived(archived: bool) -> Self {
        RepositoryPatch {
            archived: Some(archived),
            ..Default::default()
        }
    }

    pub fn security_and_analysis(settings: SecurityAndAnalysis) -> Self {
        RepositoryPatch {
            security_and_analysis: Some(settings),
            ..Default::default()
        }
    }
}
