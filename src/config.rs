use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Defaults read from `~/.sonar-migrate/config.toml`. Command-line flags win.
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub source: ServerConfig,
    #[serde(default)]
    pub target: ServerConfig,
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub component: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sonar-migrate")
        .join("config.toml")
}

/// Loads the config file. A missing default file yields defaults; a missing
/// explicitly requested file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(AppConfig::default());
            }
            path
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_source_and_target_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
insecure = true

[source]
url = "https://sonar1.test.com"
component = "com.test:prj1"
login = "squ_abc"

[target]
url = "https://sonar2.test.com"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert!(config.insecure);
        assert_eq!(config.source.url.as_deref(), Some("https://sonar1.test.com"));
        assert_eq!(config.source.login.as_deref(), Some("squ_abc"));
        assert_eq!(config.source.password, None);
        assert_eq!(config.target.url.as_deref(), Some("https://sonar2.test.com"));
        assert_eq!(config.target.component, None);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(!config.insecure);
        assert!(config.source.url.is_none());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn invalid_toml_reports_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[source\nurl = ").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
