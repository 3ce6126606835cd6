use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cli::{Endpoint, RunConfig};
use crate::model::issue::{Issue, IssueStatus};
use crate::reconcile::{
    ConfigOutcome, ConfigReconciler, IssueOutcome, IssueReconciler, MigrationFlags,
};
use crate::sonar::{IssueQuery, SonarApi, SonarClient};

/// Outcome of a whole run, one entry per phase that ran.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub config: Option<ConfigOutcome>,
    pub issues: Option<IssueOutcome>,
}

pub async fn run(config: &RunConfig) -> Result<RunSummary> {
    if config.dry_run {
        info!("Dry run: nothing will be changed on {}", config.target.url);
    }
    let mut summary = RunSummary::default();
    if config.migrate_project {
        summary.config = Some(migrate_project(config).await?);
    }
    if let Some(flags) = config.issues {
        summary.issues = Some(migrate_issues(config, flags).await?);
    }
    Ok(summary)
}

fn connect(endpoint: &Endpoint, dry_run: bool, insecure: bool) -> Result<SonarClient> {
    SonarClient::new(&endpoint.url, endpoint.credentials.as_ref(), dry_run, insecure)
        .with_context(|| format!("Failed to create HTTP client for {}", endpoint.url))
}

async fn migrate_project(config: &RunConfig) -> Result<ConfigOutcome> {
    let (settings, profiles) = {
        // The source is never written to.
        let source = connect(&config.source, true, config.insecure)?;
        let component = &config.source.component;
        let settings = source
            .get_settings(component)
            .await
            .with_context(|| format!("Failed to read settings of {component}"))?;
        let profiles = source
            .get_quality_profiles(component)
            .await
            .with_context(|| format!("Failed to read quality profiles of {component}"))?;
        (settings, profiles)
    };
    info!(
        "Read {} settings and {} quality profiles from {}",
        settings.len(),
        profiles.len(),
        config.source.component
    );

    let target = connect(&config.target, config.dry_run, config.insecure)?;
    Ok(ConfigReconciler::new(&target)
        .reconcile(&config.target.component, &settings, &profiles)
        .await)
}

async fn migrate_issues(config: &RunConfig, flags: MigrationFlags) -> Result<IssueOutcome> {
    let source_issues = {
        let source = connect(&config.source, true, config.insecure)?;
        fetch_source_issues(&source, &config.source.component, &flags).await
    };

    let target = connect(&config.target, config.dry_run, config.insecure)?;
    Ok(IssueReconciler::new(&target, flags)
        .reconcile(&config.target.component, &source_issues, config.line_delta)
        .await)
}

/// Source issues whose state is worth migrating: confirmed ones and those
/// resolved with one of the selected resolutions.
pub async fn fetch_source_issues<A: SonarApi + ?Sized>(
    source: &A,
    component: &str,
    flags: &MigrationFlags,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    if flags.confirmed {
        let query = IssueQuery::in_status(component, IssueStatus::Confirmed, &[]);
        match source.list_issues(&query).await {
            Ok(found) => issues.extend(found),
            Err(e) => error!("Error getting confirmed issues of {component}: {e}"),
        }
    }

    let resolutions = flags.resolutions();
    if !resolutions.is_empty() {
        let query = IssueQuery::in_status(component, IssueStatus::Resolved, &resolutions);
        match source.list_issues(&query).await {
            Ok(found) => issues.extend(found),
            Err(e) => error!("Error getting resolved issues of {component}: {e}"),
        }
    }

    info!("Found {} flagged issues in {component}", issues.len());
    issues
}
