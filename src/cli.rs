use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::reconcile::MigrationFlags;
use crate::sonar::Credentials;

#[derive(Parser, Debug)]
#[command(name = "sonar-migrate", version)]
#[command(about = "Migrate SonarQube issue resolutions, comments and project settings from one project to another")]
#[command(after_help = "\
If none of the issue migration options are given, all of them are enabled.
The projects need to be identical or at least very similar to map the issues.

Examples:
  sonar-migrate -s https://sonar.test.com --source-component com.test:prj1 --target-component com.test:prj1-branch
      Migrates resolutions and comments to a branch.
  sonar-migrate -s https://sonar1.test.com --source-component com.test:prj1 --target-url https://sonar2.test.com
      Migrates resolutions and comments from one server to another one.")]
pub struct Cli {
    /// URL of the source SonarQube
    #[arg(short = 's', long, value_name = "URL")]
    pub source_url: Option<String>,

    /// Source component key, e.g. project key
    #[arg(long, value_name = "KEY")]
    pub source_component: Option<String>,

    /// Login user name or token for the source
    #[arg(long, value_name = "USER_OR_TOKEN", env = "SONAR_SOURCE_LOGIN")]
    pub source_login: Option<String>,

    /// Password for the source, if a login user name is given
    #[arg(long, value_name = "PASSWORD", env = "SONAR_SOURCE_PASSWORD", hide_env_values = true)]
    pub source_password: Option<String>,

    /// URL of the target SonarQube (default: source URL)
    #[arg(long, value_name = "URL")]
    pub target_url: Option<String>,

    /// Target component key (default: source component key)
    #[arg(long, value_name = "KEY")]
    pub target_component: Option<String>,

    /// Login user name or token for the target (default: source login)
    #[arg(long, value_name = "USER_OR_TOKEN", env = "SONAR_TARGET_LOGIN")]
    pub target_login: Option<String>,

    /// Password for the target (default: source password)
    #[arg(long, value_name = "PASSWORD", env = "SONAR_TARGET_PASSWORD", hide_env_values = true)]
    pub target_password: Option<String>,

    /// Maximum difference of line numbers for two issues to match
    #[arg(long, value_name = "DELTA", default_value_t = 0)]
    pub delta_line: u32,

    /// Migrate project settings and quality profiles
    #[arg(long)]
    pub migrate_project: bool,

    /// Confirm open target issues whose source issue is confirmed
    #[arg(long)]
    pub migrate_confirmed: bool,

    /// Resolve target issues as false positive
    #[arg(long)]
    pub migrate_false_positive: bool,

    /// Resolve target issues as won't fix
    #[arg(long)]
    pub migrate_wont_fix: bool,

    /// Copy issue comments
    #[arg(long)]
    pub migrate_comments: bool,

    /// Run without actually updating anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Config file (default: ~/.sonar-migrate/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing source SonarQube URL or source component key")]
    MissingSource,

    #[error("Invalid target. It must be different than the source.")]
    SameTarget,

    #[error("Invalid migration options: one of confirmed, false-positives or wont-fix must be given.")]
    CommentsOnly,
}

/// One SonarQube project on one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub component: String,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub source: Endpoint,
    pub target: Endpoint,
    pub line_delta: u32,
    pub dry_run: bool,
    pub insecure: bool,
    pub migrate_project: bool,
    /// `None` when only project settings are migrated.
    pub issues: Option<MigrationFlags>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn credentials(login: Option<String>, password: Option<String>) -> Option<Credentials> {
    non_blank(login).map(|login| Credentials {
        login,
        password: non_blank(password),
    })
}

impl Cli {
    /// Applies config file defaults and source fallbacks, then validates the result.
    pub fn resolve(self, config: &AppConfig) -> Result<RunConfig, ConfigError> {
        let source_url = non_blank(self.source_url.or_else(|| config.source.url.clone()))
            .ok_or(ConfigError::MissingSource)?;
        let source_component =
            non_blank(self.source_component.or_else(|| config.source.component.clone()))
                .ok_or(ConfigError::MissingSource)?;
        let source_login = self.source_login.or_else(|| config.source.login.clone());
        let source_password = self.source_password.or_else(|| config.source.password.clone());

        let target_url = non_blank(self.target_url.or_else(|| config.target.url.clone()))
            .unwrap_or_else(|| source_url.clone());
        let target_component =
            non_blank(self.target_component.or_else(|| config.target.component.clone()))
                .unwrap_or_else(|| source_component.clone());
        let target_login = self
            .target_login
            .or_else(|| config.target.login.clone())
            .or_else(|| source_login.clone());
        let target_password = self
            .target_password
            .or_else(|| config.target.password.clone())
            .or_else(|| source_password.clone());

        if source_url == target_url && source_component == target_component {
            return Err(ConfigError::SameTarget);
        }

        let explicit = MigrationFlags {
            confirmed: self.migrate_confirmed,
            false_positive: self.migrate_false_positive,
            wont_fix: self.migrate_wont_fix,
            comments: self.migrate_comments,
        };
        let any_status = explicit.confirmed || explicit.false_positive || explicit.wont_fix;
        let issues = if any_status {
            Some(explicit)
        } else if explicit.comments {
            return Err(ConfigError::CommentsOnly);
        } else if self.migrate_project {
            None
        } else {
            info!("No migration options given. Enabling all options.");
            Some(MigrationFlags::ALL)
        };

        Ok(RunConfig {
            source: Endpoint {
                url: source_url,
                component: source_component,
                credentials: credentials(source_login, source_password),
            },
            target: Endpoint {
                url: target_url,
                component: target_component,
                credentials: credentials(target_login, target_password),
            },
            line_delta: self.delta_line,
            dry_run: self.dry_run,
            insecure: self.insecure || config.insecure,
            migrate_project: self.migrate_project,
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["sonar-migrate"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn resolve(args: &[&str]) -> Result<RunConfig, ConfigError> {
        parse(args).resolve(&AppConfig::default())
    }

    #[test]
    fn target_defaults_to_source() {
        let run = resolve(&[
            "-s",
            "https://sonar.test.com",
            "--source-component",
            "com.test:prj1",
            "--source-login",
            "squ_token",
            "--target-component",
            "com.test:prj1-branch",
        ])
        .unwrap();
        assert_eq!(run.target.url, "https://sonar.test.com");
        assert_eq!(run.target.component, "com.test:prj1-branch");
        assert_eq!(
            run.target.credentials,
            Some(Credentials {
                login: "squ_token".into(),
                password: None
            })
        );
        assert_eq!(run.line_delta, 0);
        assert!(!run.dry_run);
    }

    #[test]
    fn no_issue_flags_enable_everything() {
        let run = resolve(&["-s", "http://a", "--source-component", "p1", "--target-component", "p2"]).unwrap();
        assert_eq!(run.issues, Some(MigrationFlags::ALL));
        assert!(!run.migrate_project);
    }

    #[test]
    fn explicit_flags_are_kept() {
        let run = resolve(&[
            "-s",
            "http://a",
            "--source-component",
            "p1",
            "--target-component",
            "p2",
            "--migrate-false-positive",
            "--migrate-comments",
            "--delta-line",
            "3",
            "-d",
        ])
        .unwrap();
        assert_eq!(
            run.issues,
            Some(MigrationFlags {
                confirmed: false,
                false_positive: true,
                wont_fix: false,
                comments: true,
            })
        );
        assert_eq!(run.line_delta, 3);
        assert!(run.dry_run);
    }

    #[test]
    fn project_migration_alone_skips_issues() {
        let run = resolve(&["-s", "http://a", "--source-component", "p1", "--target-url", "http://b", "--migrate-project"]).unwrap();
        assert!(run.migrate_project);
        assert_eq!(run.issues, None);
    }

    #[test]
    fn project_and_issue_flags_combine() {
        let run = resolve(&[
            "-s",
            "http://a",
            "--source-component",
            "p1",
            "--target-url",
            "http://b",
            "--migrate-project",
            "--migrate-wont-fix",
        ])
        .unwrap();
        assert!(run.migrate_project);
        assert!(run.issues.unwrap().wont_fix);
    }

    #[test]
    fn comments_alone_are_rejected() {
        let err = resolve(&["-s", "http://a", "--source-component", "p1", "--target-component", "p2", "--migrate-comments"]).unwrap_err();
        assert_eq!(err, ConfigError::CommentsOnly);
    }

    #[test]
    fn identical_target_is_rejected() {
        let err = resolve(&["-s", "http://a", "--source-component", "p1"]).unwrap_err();
        assert_eq!(err, ConfigError::SameTarget);
    }

    #[test]
    fn missing_source_is_rejected() {
        assert_eq!(resolve(&["--source-component", "p1"]).unwrap_err(), ConfigError::MissingSource);
        assert_eq!(resolve(&["-s", "http://a", "--source-component", " "]).unwrap_err(), ConfigError::MissingSource);
    }

    #[test]
    fn negative_delta_does_not_parse() {
        let result = Cli::try_parse_from(["sonar-migrate", "-s", "http://a", "--delta-line", "-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_file_fills_gaps_but_flags_win() {
        let config = AppConfig {
            source: ServerConfig {
                url: Some("http://from-file".into()),
                component: Some("p1".into()),
                login: Some("file-user".into()),
                password: Some("file-pass".into()),
            },
            target: ServerConfig {
                url: Some("http://target-from-file".into()),
                ..Default::default()
            },
            insecure: true,
        };
        let run = parse(&["--source-login", "cli-user"]).resolve(&config).unwrap();
        assert_eq!(run.source.url, "http://from-file");
        assert_eq!(
            run.source.credentials,
            Some(Credentials {
                login: "cli-user".into(),
                password: Some("file-pass".into())
            })
        );
        assert_eq!(run.target.url, "http://target-from-file");
        assert_eq!(run.target.component, "p1");
        assert!(run.insecure);
    }

    #[test]
    fn blank_login_means_anonymous() {
        let run = resolve(&[
            "-s",
            "http://a",
            "--source-component",
            "p1",
            "--target-component",
            "p2",
            "--source-login",
            "",
            "--source-password",
            "secret",
        ])
        .unwrap();
        assert_eq!(run.source.credentials, None);
    }
}
