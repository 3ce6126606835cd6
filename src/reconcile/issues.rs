use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::model::issue::{Issue, IssueStatus, Resolution, Transition};
use crate::sonar::{IssueQuery, SonarApi};

/// Which parts of an issue's state are carried over to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationFlags {
    pub confirmed: bool,
    pub false_positive: bool,
    pub wont_fix: bool,
    pub comments: bool,
}

impl MigrationFlags {
    pub const ALL: MigrationFlags = MigrationFlags {
        confirmed: true,
        false_positive: true,
        wont_fix: true,
        comments: true,
    };

    /// Resolutions whose source issues need to be fetched.
    pub fn resolutions(&self) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        if self.false_positive {
            resolutions.push(Resolution::FalsePositive);
        }
        if self.wont_fix {
            resolutions.push(Resolution::WontFix);
        }
        resolutions
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueOutcome {
    pub processed: usize,
    pub updated: usize,
    pub unmatched: usize,
}

/// Matches source issues to target issues and copies their review state.
///
/// Target issues are fetched per rule the first time the rule shows up and
/// kept in a pool for the rest of the run. A matched issue leaves its pool, so
/// no target issue is paired with two source issues.
pub struct IssueReconciler<'a, A: SonarApi + ?Sized> {
    target: &'a A,
    flags: MigrationFlags,
    pools: HashMap<String, Vec<Issue>>,
}

impl<'a, A: SonarApi + ?Sized> IssueReconciler<'a, A> {
    pub fn new(target: &'a A, flags: MigrationFlags) -> Self {
        Self {
            target,
            flags,
            pools: HashMap::new(),
        }
    }

    pub async fn reconcile(
        &mut self,
        component: &str,
        source_issues: &[Issue],
        line_delta: u32,
    ) -> IssueOutcome {
        let total = source_issues.len();
        let mut outcome = IssueOutcome::default();
        info!("Processing {total} issues...");

        for source in source_issues {
            match self.take_match(component, source, line_delta).await {
                Some(target) => {
                    if self.apply(source, &target).await {
                        outcome.updated += 1;
                    }
                }
                None => {
                    outcome.unmatched += 1;
                    warn!("Could not find match for {}", source.location());
                }
            }
            outcome.processed += 1;
            info!(
                "Processed {} and updated {} of {total} issues",
                outcome.processed, outcome.updated
            );
        }

        info!(
            "Processed {} issues: {} updated, {} unmatched.",
            outcome.processed, outcome.updated, outcome.unmatched
        );
        outcome
    }

    async fn pool(&mut self, component: &str, rule: &str) -> &mut Vec<Issue> {
        if !self.pools.contains_key(rule) {
            let issues = match self
                .target
                .list_issues(&IssueQuery::for_rule(component, rule))
                .await
            {
                Ok(issues) => issues,
                Err(e) => {
                    error!("Error getting issues for rule {rule} in {component}: {e}");
                    Vec::new()
                }
            };
            self.pools.insert(rule.to_string(), issues);
        }
        self.pools.entry(rule.to_string()).or_default()
    }

    /// Removes and returns the closest target issue for `source`, if any lies
    /// within `line_delta` lines in the same file.
    async fn take_match(&mut self, component: &str, source: &Issue, line_delta: u32) -> Option<Issue> {
        let pool = self.pool(component, &source.rule).await;
        let index = closest_candidate(pool, source, line_delta)?;
        Some(pool.remove(index))
    }

    /// Applies transition and comments; true if anything changed on the target.
    async fn apply(&self, source: &Issue, target: &Issue) -> bool {
        let mut changed = false;

        if let Some(transition) = choose_transition(&self.flags, source, target) {
            match self.target.transition_issue(&target.key, transition).await {
                Ok(()) => changed = true,
                Err(e) => error!(
                    "Error doing transition '{transition}' for issue {} ({}): {e}",
                    target.location(),
                    target.key
                ),
            }
        }

        if self.flags.comments {
            if let (Some(comments), Some(_)) = (&source.comments, &target.comments) {
                for text in comments.iter().filter_map(|c| c.markdown.as_deref()) {
                    if target.has_comment(text) {
                        continue;
                    }
                    match self.target.add_comment(&target.key, text).await {
                        Ok(()) => changed = true,
                        Err(e) => error!(
                            "Error adding comment '{text}' to issue {} ({}): {e}",
                            target.location(),
                            target.key
                        ),
                    }
                }
            }
        }

        changed
    }
}

/// Index of the candidate with the smallest line distance. Ties go to the
/// earliest entry in the pool.
fn closest_candidate(pool: &[Issue], source: &Issue, line_delta: u32) -> Option<usize> {
    pool.iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.file_path() == source.file_path())
        .filter_map(|(index, candidate)| {
            candidate
                .line_distance(source)
                .filter(|distance| *distance <= line_delta)
                .map(|distance| (index, distance))
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(index, _)| index)
}

/// At most one transition per pair. Resolved targets are never touched and
/// reopened targets can only be resolved, not confirmed.
fn choose_transition(flags: &MigrationFlags, source: &Issue, target: &Issue) -> Option<Transition> {
    if target.status == IssueStatus::Open
        && flags.confirmed
        && source.status == IssueStatus::Confirmed
    {
        return Some(Transition::Confirm);
    }
    if target.status == IssueStatus::Resolved {
        return None;
    }
    match source.resolution {
        Some(Resolution::FalsePositive) if flags.false_positive => Some(Transition::FalsePositive),
        Some(Resolution::WontFix) if flags.wont_fix => Some(Transition::WontFix),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(line: u32, status: IssueStatus) -> Issue {
        Issue {
            key: format!("T{line}"),
            rule: "java:S2384".into(),
            component: "prj2:A.java".into(),
            line: Some(line),
            status,
            resolution: None,
            comments: None,
        }
    }

    #[test]
    fn closest_candidate_respects_delta() {
        let pool = vec![issue(48, IssueStatus::Open), issue(60, IssueStatus::Open)];
        let source = issue(50, IssueStatus::Confirmed);
        assert_eq!(closest_candidate(&pool, &source, 5), Some(0));
        assert_eq!(closest_candidate(&pool, &source, 1), None);
        assert_eq!(closest_candidate(&pool, &source, 10), Some(0));
    }

    #[test]
    fn closest_candidate_prefers_smaller_distance() {
        let pool = vec![issue(45, IssueStatus::Open), issue(51, IssueStatus::Open)];
        let source = issue(50, IssueStatus::Confirmed);
        assert_eq!(closest_candidate(&pool, &source, 5), Some(1));
    }

    #[test]
    fn closest_candidate_ties_go_to_first_in_pool() {
        let pool = vec![issue(52, IssueStatus::Open), issue(48, IssueStatus::Open)];
        let source = issue(50, IssueStatus::Confirmed);
        for _ in 0..3 {
            assert_eq!(closest_candidate(&pool, &source, 2), Some(0));
        }
    }

    #[test]
    fn closest_candidate_requires_same_file() {
        let mut other_file = issue(50, IssueStatus::Open);
        other_file.component = "prj2:B.java".into();
        let source = issue(50, IssueStatus::Confirmed);
        assert_eq!(closest_candidate(&[other_file], &source, 0), None);
    }

    #[test]
    fn confirm_only_applies_to_open_targets() {
        let flags = MigrationFlags::ALL;
        let source = issue(1, IssueStatus::Confirmed);
        assert_eq!(
            choose_transition(&flags, &source, &issue(1, IssueStatus::Open)),
            Some(Transition::Confirm)
        );
        assert_eq!(
            choose_transition(&flags, &source, &issue(1, IssueStatus::Reopened)),
            None
        );
        assert_eq!(
            choose_transition(&flags, &source, &issue(1, IssueStatus::Confirmed)),
            None
        );
    }

    #[test]
    fn resolutions_skip_resolved_targets() {
        let flags = MigrationFlags::ALL;
        let mut source = issue(1, IssueStatus::Resolved);
        source.resolution = Some(Resolution::FalsePositive);
        assert_eq!(
            choose_transition(&flags, &source, &issue(1, IssueStatus::Reopened)),
            Some(Transition::FalsePositive)
        );
        assert_eq!(
            choose_transition(&flags, &source, &issue(1, IssueStatus::Resolved)),
            None
        );

        source.resolution = Some(Resolution::WontFix);
        assert_eq!(
            choose_transition(&flags, &source, &issue(1, IssueStatus::Confirmed)),
            Some(Transition::WontFix)
        );
    }

    #[test]
    fn disabled_flags_suppress_transitions() {
        let flags = MigrationFlags {
            confirmed: false,
            false_positive: false,
            wont_fix: true,
            comments: false,
        };
        let mut source = issue(1, IssueStatus::Confirmed);
        assert_eq!(choose_transition(&flags, &source, &issue(1, IssueStatus::Open)), None);

        source.status = IssueStatus::Resolved;
        source.resolution = Some(Resolution::FalsePositive);
        assert_eq!(choose_transition(&flags, &source, &issue(1, IssueStatus::Open)), None);
    }

    #[test]
    fn flags_select_resolutions() {
        assert_eq!(
            MigrationFlags::ALL.resolutions(),
            vec![Resolution::FalsePositive, Resolution::WontFix]
        );
        let confirmed_only = MigrationFlags {
            confirmed: true,
            false_positive: false,
            wont_fix: false,
            comments: true,
        };
        assert!(confirmed_only.resolutions().is_empty());
    }
}
