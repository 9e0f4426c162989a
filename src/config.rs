//! Configuration loader and validator for the field-sync client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub server: Server,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Seconds between connectivity probes of the server health endpoint.
    pub probe_interval_secs: u64,
    /// Per-item submission timeout; exceeding it counts as a failure.
    pub submit_timeout_secs: u64,
}

/// Remote clinic API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub base_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.app.probe_interval_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.app.submit_timeout_secs)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.probe_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.probe_interval_secs must be > 0"));
    }
    if cfg.app.submit_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.submit_timeout_secs must be > 0"));
    }

    if cfg.server.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("server.base_url must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.server.base_url).is_err() {
        return Err(ConfigError::Invalid(
            "server.base_url must be a valid absolute URL",
        ));
    }
    if let Some(token) = &cfg.server.auth_token {
        if token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.auth_token must be non-empty when set",
            ));
        }
    }

    Ok(())
}

/// Example configuration, shipped as documentation and used by tests.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  probe_interval_secs: 30
  submit_timeout_secs: 15

server:
  base_url: "http://localhost:4000"
  auth_token: null
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.submit_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.server.base_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("server.base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.server.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_intervals() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.probe_interval_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.submit_timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_auth_token_rejected_but_absent_ok() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.server.auth_token = Some("  ".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let yaml = "app:\n  data_dir: \"./data\"\n  probe_interval_secs: 30\n  submit_timeout_secs: 15\nserver:\n  base_url: \"http://localhost:4000\"\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.server.auth_token, None);
        validate(&cfg).unwrap();
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(example().as_bytes()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.server.base_url, "http://localhost:4000");
    }
}
