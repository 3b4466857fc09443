//! Optional TOML settings file.
//!
//! ```toml
//! [github]
//! api_url = "https://github.example.com/api/v3"
//!
//! [migration]
//! settle_delay_secs = 10
//!
//! [pagination]
//! repositories = 10
//! workflows = 10
//! branch_protection_rules = 100
//! enterprise_organizations = 100
//! ```
//!
//! Every key is optional. The access token is never read from this file.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

const MAX_PAGE_SIZE: u8 = 100;

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub github: GitHubSettings,
    pub migration: MigrationSettings,
    pub pagination: PageSizes,
}

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSettings {
    /// API root for GitHub Enterprise Server; api.github.com when unset.
    pub api_url: Option<String>,
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationSettings {
    /// Pause after each repository security change while GitHub propagates it.
    pub settle_delay_secs: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            settle_delay_secs: 10,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PageSizes {
    pub repositories: u8,
    pub workflows: u8,
    pub branch_protection_rules: u8,
    pub enterprise_organizations: u8,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            repositories: 10,
            workflows: 10,
            branch_protection_rules: 100,
            enterprise_organizations: 100,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&contents).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(contents: &str) -> std::result::Result<Self, String> {
        let settings: Settings = toml::from_str(contents).map_err(|e| e.to_string())?;
        settings.pagination.validate()?;
        Ok(settings)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.migration.settle_delay_secs)
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.migration.settle_delay_secs = delay.as_secs();
        self
    }
}

impl PageSizes {
    fn validate(&self) -> std::result::Result<(), String> {
        let sizes = [
            ("repositories", self.repositories),
            ("workflows", self.workflows),
            ("branch_protection_rules", self.branch_protection_rules),
            ("enterprise_organizations", self.enterprise_organizations),
        ];
        for (name, size) in sizes {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(format!(
                    "pagination.{name} must be between 1 and {MAX_PAGE_SIZE}, got {size}"
                ));
            }
        }
        Ok(())
    }
}
