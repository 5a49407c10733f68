use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostdash/config.yaml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_services")]
    pub services: Vec<String>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub listen: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            output_path: default_output_path(),
            services: default_services(),
            command_timeout_secs: default_command_timeout_secs(),
            listen: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;
        Self::from_yaml(&text, path_display)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool), ConfigError> {
        match Self::load_from_file(path) {
            Ok(cfg) => Ok((cfg, true)),
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok((Self::default(), false))
            }
            Err(err) => Err(err),
        }
    }

    fn from_yaml(text: &str, path: String) -> Result<Self, ConfigError> {
        // comment-only YAML parses as unit
        let blank = text
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        let cfg: Config = if blank {
            Config::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse { path, source })?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.command_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "command_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_path must not be empty".to_string(),
            ));
        }
        if self.output_path.file_name().is_none() {
            return Err(ConfigError::Validation(format!(
                "output_path '{}' must name a file",
                self.output_path.display()
            )));
        }
        if let Some(listen) = &self.listen {
            if SocketAddr::from_str(listen).is_err() {
                return Err(ConfigError::Validation(format!(
                    "listen '{listen}' must be a host:port socket address"
                )));
            }
        }

        validate_services(&self.services)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_services(services: &[String]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for name in services {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "services[*] must not be empty".to_string(),
            ));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "service name '{name}' must not contain whitespace"
            )));
        }
        if !names.insert(name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "service '{name}' is listed twice"
            )));
        }
    }
    Ok(())
}

const fn default_interval_secs() -> u64 {
    5
}

fn default_output_path() -> PathBuf {
    PathBuf::from("/opt/hostdash/www/data.json")
}

fn default_services() -> Vec<String> {
    ["docker", "libvirtd", "smbd"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_command_timeout_secs() -> u64 {
    10
}
