use std::collections::HashMap;

use tracing::{error, info};

use crate::model::setting::{QualityProfile, Setting, SettingValue};
use crate::sonar::{SonarApi, SonarResult};

/// A change made (or, in dry-run, announced) on the target project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    CreateProject,
    SetValue { key: String, value: SettingValue },
    Reset { keys: Vec<String> },
    AssignProfile { language: String, profile: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOutcome {
    pub applied: Vec<ConfigChange>,
    pub failed: usize,
}

impl ConfigOutcome {
    fn record(&mut self, result: SonarResult<()>, change: ConfigChange) {
        match result {
            Ok(()) => self.applied.push(change),
            Err(e) => {
                self.failed += 1;
                error!("Error applying {change:?}: {e}");
            }
        }
    }
}

/// Brings a target project's settings and quality profiles in line with a source project.
///
/// Not transactional: each change is sent on its own and a failure does not
/// undo earlier ones.
pub struct ConfigReconciler<'a, A: SonarApi + ?Sized> {
    target: &'a A,
}

impl<'a, A: SonarApi + ?Sized> ConfigReconciler<'a, A> {
    pub fn new(target: &'a A) -> Self {
        Self { target }
    }

    pub async fn reconcile(
        &self,
        component: &str,
        source_settings: &[Setting],
        source_profiles: &[QualityProfile],
    ) -> ConfigOutcome {
        let mut outcome = ConfigOutcome::default();
        self.reconcile_settings(component, source_settings, &mut outcome)
            .await;
        self.reconcile_profiles(component, source_profiles, &mut outcome)
            .await;

        info!(
            "Settings for {component} processed: {} changes, {} failures",
            outcome.applied.len(),
            outcome.failed
        );
        outcome
    }

    async fn target_settings(&self, component: &str, outcome: &mut ConfigOutcome) -> Option<Vec<Setting>> {
        match self.target.get_settings(component).await {
            Ok(settings) => return Some(settings),
            Err(e) if e.is_not_found() => {
                info!("Project {component} not found on target, creating it");
            }
            Err(e) => {
                error!("Error getting settings for {component}: {e}");
                return None;
            }
        }

        let created = self
            .target
            .create_project(component, &format!("Project {component}"))
            .await;
        let ok = created.is_ok();
        outcome.record(created, ConfigChange::CreateProject);
        if !ok {
            return None;
        }

        match self.target.get_settings(component).await {
            Ok(settings) => Some(settings),
            Err(e) if e.is_not_found() => Some(Vec::new()),
            Err(e) => {
                error!("Error getting settings for new project {component}: {e}");
                None
            }
        }
    }

    async fn reconcile_settings(&self, component: &str, source: &[Setting], outcome: &mut ConfigOutcome) {
        let Some(target) = self.target_settings(component, outcome).await else {
            return;
        };
        let mut remaining: HashMap<String, Setting> =
            target.into_iter().map(|s| (s.key.clone(), s)).collect();

        for setting in source {
            match remaining.remove(&setting.key) {
                Some(existing) if existing.value == setting.value => continue,
                Some(existing) => {
                    info!(
                        "Changing setting {}: {} -> {}",
                        setting.key, existing.value, setting.value
                    );
                }
                None => {}
            }
            let result = self
                .target
                .set_setting(component, &setting.key, &setting.value)
                .await;
            outcome.record(
                result,
                ConfigChange::SetValue {
                    key: setting.key.clone(),
                    value: setting.value.clone(),
                },
            );
        }

        if !remaining.is_empty() {
            let mut keys: Vec<String> = remaining.into_keys().collect();
            keys.sort();
            let result = self.target.reset_settings(component, &keys).await;
            outcome.record(result, ConfigChange::Reset { keys });
        }
    }

    async fn reconcile_profiles(&self, component: &str, source: &[QualityProfile], outcome: &mut ConfigOutcome) {
        let target = match self.target.get_quality_profiles(component).await {
            Ok(profiles) => profiles,
            Err(e) => {
                error!("Error getting quality profiles for project {component}: {e}");
                return;
            }
        };
        let by_language: HashMap<&str, &str> = target
            .iter()
            .map(|p| (p.language.as_str(), p.name.as_str()))
            .collect();

        for profile in source {
            if by_language.get(profile.language.as_str()) == Some(&profile.name.as_str()) {
                continue;
            }
            let result = self
                .target
                .assign_quality_profile(component, &profile.language, &profile.name)
                .await;
            outcome.record(
                result,
                ConfigChange::AssignProfile {
                    language: profile.language.clone(),
                    profile: profile.name.clone(),
                },
            );
        }
    }
}
