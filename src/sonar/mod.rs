pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::model::issue::{Issue, IssueStatus, Resolution, Transition};
use crate::model::setting::{QualityProfile, Setting, SettingValue};

pub use client::{Credentials, SonarClient};
pub use error::SonarError;

pub type SonarResult<T> = std::result::Result<T, SonarError>;

/// Filter for an issue search within one project.
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    pub component: String,
    pub rule: Option<String>,
    pub status: Option<IssueStatus>,
    pub resolutions: Vec<Resolution>,
}

impl IssueQuery {
    pub fn for_rule(component: &str, rule: &str) -> Self {
        Self {
            component: component.to_string(),
            rule: Some(rule.to_string()),
            ..Default::default()
        }
    }

    pub fn in_status(component: &str, status: IssueStatus, resolutions: &[Resolution]) -> Self {
        Self {
            component: component.to_string(),
            status: Some(status),
            resolutions: resolutions.to_vec(),
            ..Default::default()
        }
    }
}

/// Everything the reconcilers need from a SonarQube project.
///
/// Mutating calls resolve to `Ok(())` once the server accepted the change, or
/// once the change was logged when the implementation runs in dry-run mode.
#[async_trait]
pub trait SonarApi: Send + Sync {
    /// All issues matching the query, across every result page.
    async fn list_issues(&self, query: &IssueQuery) -> SonarResult<Vec<Issue>>;
    async fn transition_issue(&self, issue_key: &str, transition: Transition) -> SonarResult<()>;
    async fn add_comment(&self, issue_key: &str, text: &str) -> SonarResult<()>;
    /// Fails with [`SonarError::NotFound`] when the project does not exist.
    async fn get_settings(&self, component: &str) -> SonarResult<Vec<Setting>>;
    async fn set_setting(&self, component: &str, key: &str, value: &SettingValue) -> SonarResult<()>;
    async fn reset_settings(&self, component: &str, keys: &[String]) -> SonarResult<()>;
    async fn create_project(&self, component: &str, name: &str) -> SonarResult<()>;
    async fn get_quality_profiles(&self, component: &str) -> SonarResult<Vec<QualityProfile>>;
    async fn assign_quality_profile(
        &self,
        component: &str,
        language: &str,
        profile: &str,
    ) -> SonarResult<()>;
}
