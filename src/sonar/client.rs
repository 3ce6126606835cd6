use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use super::{IssueQuery, SonarApi, SonarError, SonarResult};
use crate::model::issue::{Issue, Transition};
use crate::model::setting::{FieldValues, QualityProfile, Setting, SettingValue};

const API_SEARCH_ISSUES: &str = "api/issues/search";
const API_DO_TRANSITION: &str = "api/issues/do_transition";
const API_ADD_COMMENT: &str = "api/issues/add_comment";
const API_SETTINGS: &str = "api/settings/values";
const API_SET_SETTING: &str = "api/settings/set";
const API_RESET_SETTINGS: &str = "api/settings/reset";
const API_CREATE_PROJECT: &str = "api/projects/create";
const API_SEARCH_PROFILES: &str = "api/qualityprofiles/search";
const API_ADD_PROJECT_TO_PROFILE: &str = "api/qualityprofiles/add_project";

const PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// User name or token.
    pub login: String,
    /// Empty for token authentication.
    pub password: Option<String>,
}

/// HTTP implementation of [`SonarApi`] bound to one server.
pub struct SonarClient {
    base_url: String,
    auth_header: Option<String>,
    dry_run: bool,
    client: reqwest::Client,
}

impl SonarClient {
    pub fn new(
        base_url: &str,
        credentials: Option<&Credentials>,
        dry_run: bool,
        insecure: bool,
    ) -> SonarResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            base_url,
            auth_header: credentials.and_then(basic_auth_header),
            dry_run,
            client,
        })
    }

    fn url(&self, api: &str, params: &[(&str, String)]) -> String {
        let query: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect();
        if query.is_empty() {
            format!("{}{api}", self.base_url)
        } else {
            format!("{}{api}?{}", self.base_url, query.join("&"))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SonarResult<T> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }
        let resp = check_status(url, request.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn post_form(&self, api: &str, params: &[(&str, String)]) -> SonarResult<()> {
        let url = self.url(api, &[]);
        let mut request = self.client.post(&url).form(params);
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }
        check_status(&url, request.send().await?).await?;
        Ok(())
    }
}

fn basic_auth_header(credentials: &Credentials) -> Option<String> {
    if credentials.login.trim().is_empty() {
        return None;
    }
    let password = credentials.password.as_deref().unwrap_or_default();
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{password}", credentials.login));
    Some(format!("Basic {encoded}"))
}

async fn check_status(url: &str, resp: reqwest::Response) -> SonarResult<reqwest::Response> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(SonarError::NotFound {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SonarError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }
    Ok(resp)
}

#[derive(Deserialize)]
struct IssuesPage {
    #[serde(default)]
    issues: Vec<Issue>,
    paging: Paging,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paging {
    total: usize,
}

#[derive(Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    settings: Vec<RawSetting>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSetting {
    key: String,
    value: Option<String>,
    values: Option<BTreeSet<String>>,
    field_values: Option<BTreeSet<FieldValues>>,
    #[serde(default)]
    inherited: bool,
}

impl RawSetting {
    fn into_setting(self) -> Option<Setting> {
        let value = match (self.value, self.values, self.field_values) {
            (Some(value), _, _) => SettingValue::Single(value),
            (None, Some(values), _) => SettingValue::Multi(values),
            (None, None, Some(records)) => SettingValue::Fields(records),
            (None, None, None) => {
                warn!("Setting {} has no value, skipping it", self.key);
                return None;
            }
        };
        Some(Setting {
            key: self.key,
            value,
            inherited: self.inherited,
        })
    }
}

#[derive(Deserialize)]
struct ProfilesResponse {
    #[serde(default)]
    profiles: Vec<QualityProfile>,
}

#[async_trait]
impl SonarApi for SonarClient {
    async fn list_issues(&self, query: &IssueQuery) -> SonarResult<Vec<Issue>> {
        let mut params = vec![
            ("componentKeys", query.component.clone()),
            ("additionalFields", "comments".to_string()),
            ("ps", PAGE_SIZE.to_string()),
        ];
        if let Some(rule) = &query.rule {
            params.push(("rules", rule.clone()));
        }
        if let Some(status) = query.status {
            params.push(("statuses", status.as_str().to_string()));
        }
        if !query.resolutions.is_empty() {
            let resolutions: Vec<&str> = query.resolutions.iter().map(|r| r.as_str()).collect();
            params.push(("resolutions", resolutions.join(",")));
        }

        let mut issues: Vec<Issue> = Vec::new();
        let mut page = 1usize;
        loop {
            let mut page_params = params.clone();
            page_params.push(("p", page.to_string()));
            let url = self.url(API_SEARCH_ISSUES, &page_params);

            let result: IssuesPage = match self.get_json(&url).await {
                Ok(result) => result,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    error!(
                        "Error getting issues from URL {url}: {e}. Continuing with the {} issues fetched so far",
                        issues.len()
                    );
                    break;
                }
            };

            let fetched = result.issues.len();
            issues.extend(result.issues);
            if fetched == 0 || issues.len() >= result.paging.total {
                break;
            }
            page += 1;
        }

        debug!("Fetched {} issues for {}", issues.len(), query.component);
        Ok(issues)
    }

    async fn transition_issue(&self, issue_key: &str, transition: Transition) -> SonarResult<()> {
        if self.dry_run {
            info!("Issue {issue_key} would be updated: {transition}");
            return Ok(());
        }
        self.post_form(
            API_DO_TRANSITION,
            &[
                ("issue", issue_key.to_string()),
                ("transition", transition.as_str().to_string()),
            ],
        )
        .await?;
        info!("Issue {issue_key} updated: {transition}");
        Ok(())
    }

    async fn add_comment(&self, issue_key: &str, text: &str) -> SonarResult<()> {
        if self.dry_run {
            info!("Issue {issue_key} would be updated with comment: '{text}'");
            return Ok(());
        }
        self.post_form(
            API_ADD_COMMENT,
            &[("issue", issue_key.to_string()), ("text", text.to_string())],
        )
        .await?;
        info!("Issue {issue_key} updated with comment: '{text}'");
        Ok(())
    }

    async fn get_settings(&self, component: &str) -> SonarResult<Vec<Setting>> {
        let url = self.url(API_SETTINGS, &[("component", component.to_string())]);
        let response: SettingsResponse = self.get_json(&url).await?;
        Ok(response
            .settings
            .into_iter()
            .filter_map(RawSetting::into_setting)
            .collect())
    }

    async fn set_setting(&self, component: &str, key: &str, value: &SettingValue) -> SonarResult<()> {
        let mut params = vec![
            ("component", component.to_string()),
            ("key", key.to_string()),
        ];
        match value {
            SettingValue::Single(value) => params.push(("value", value.clone())),
            SettingValue::Multi(values) => {
                if values.is_empty() {
                    return Err(SonarError::EmptyValue(key.to_string()));
                }
                params.extend(values.iter().map(|v| ("values", v.clone())));
            }
            SettingValue::Fields(records) => {
                if records.is_empty() {
                    return Err(SonarError::EmptyValue(key.to_string()));
                }
                for record in records {
                    params.push(("fieldValues", serde_json::to_string(record)?));
                }
            }
        }

        if self.dry_run {
            info!("Setting {key} would be updated to '{value}'");
            return Ok(());
        }
        self.post_form(API_SET_SETTING, &params).await?;
        info!("Setting {key} updated to '{value}'");
        Ok(())
    }

    async fn reset_settings(&self, component: &str, keys: &[String]) -> SonarResult<()> {
        if self.dry_run {
            info!("Settings {} would be reset", keys.join(", "));
            return Ok(());
        }
        self.post_form(
            API_RESET_SETTINGS,
            &[("component", component.to_string()), ("keys", keys.join(","))],
        )
        .await?;
        info!("Settings {} reset", keys.join(", "));
        Ok(())
    }

    async fn create_project(&self, component: &str, name: &str) -> SonarResult<()> {
        if self.dry_run {
            info!("Project {component} would be created");
            return Ok(());
        }
        self.post_form(
            API_CREATE_PROJECT,
            &[("project", component.to_string()), ("name", name.to_string())],
        )
        .await?;
        info!("Project {component} created");
        Ok(())
    }

    async fn get_quality_profiles(&self, component: &str) -> SonarResult<Vec<QualityProfile>> {
        let url = self.url(API_SEARCH_PROFILES, &[("project", component.to_string())]);
        let response: ProfilesResponse = self.get_json(&url).await?;
        Ok(response.profiles)
    }

    async fn assign_quality_profile(
        &self,
        component: &str,
        language: &str,
        profile: &str,
    ) -> SonarResult<()> {
        if self.dry_run {
            info!("Project {component} language {language} would be set to use quality profile {profile}");
            return Ok(());
        }
        self.post_form(
            API_ADD_PROJECT_TO_PROFILE,
            &[
                ("project", component.to_string()),
                ("language", language.to_string()),
                ("qualityProfile", profile.to_string()),
            ],
        )
        .await?;
        info!("Project {component} language {language} set to use quality profile {profile}");
        Ok(())
    }
}
