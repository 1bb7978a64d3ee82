use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

const AGENT_SECRET_ENV: &str = "MC_AGENT_SECRET";
const CRON_JOBS_PATH_ENV: &str = "MC_CRON_JOBS_PATH";
const AGENT_STATUS_DIR_ENV: &str = "MC_AGENT_STATUS_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, TS, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessControlMode {
    #[default]
    Disabled,
    Token,
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AccessControlConfig {
    pub mode: AccessControlMode,
    pub token: Option<String>,
    #[serde(alias = "allowLocalhostBypass")]
    pub allow_localhost_bypass: bool,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            mode: AccessControlMode::Disabled,
            token: None,
            allow_localhost_bypass: true,
        }
    }
}

impl AccessControlConfig {
    /// Configured token, with the environment secret as fallback.
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(Self::env_token)
    }

    fn env_token() -> Option<String> {
        std::env::var(AGENT_SECRET_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    /// The token write endpoints must present, if any. `TOKEN` mode enforces
    /// the resolved token; `DISABLED` mode still enforces the environment
    /// secret when one is set, so agent deployments stay protected without a
    /// config file.
    pub fn enforced_token(&self) -> Option<String> {
        match self.mode {
            AccessControlMode::Token => self.resolved_token(),
            AccessControlMode::Disabled => Self::env_token(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "accessControl")]
    pub access_control: AccessControlConfig,
    #[serde(alias = "cronJobsPath")]
    pub cron_jobs_path: Option<PathBuf>,
    #[serde(alias = "agentStatusDir")]
    pub agent_status_dir: Option<PathBuf>,
    #[serde(alias = "lastAppVersion")]
    pub last_app_version: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_control: AccessControlConfig::default(),
            cron_jobs_path: None,
            agent_status_dir: None,
            last_app_version: None,
        }
    }
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Config::default()
            }
        }
    }

    pub fn cron_jobs_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var(CRON_JOBS_PATH_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        self.cron_jobs_path.clone().unwrap_or_else(|| {
            dirs_home()
                .join(".mission-control")
                .join("cron")
                .join("jobs.json")
        })
    }

    pub fn agent_status_dir(&self) -> PathBuf {
        if let Ok(path) = std::env::var(AGENT_STATUS_DIR_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        self.agent_status_dir
            .clone()
            .unwrap_or_else(|| dirs_home().join(".mission-control").join("agents"))
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_empty_config() {
        let config = Config::from_raw("{}");
        assert_eq!(config.access_control.mode, AccessControlMode::Disabled);
        assert!(config.access_control.allow_localhost_bypass);
        assert!(config.cron_jobs_path.is_none());
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let config = Config::from_raw("{not json");
        assert!(config.access_control.token.is_none());
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let config = Config::from_raw(
            r#"{"accessControl": {"mode": "TOKEN", "token": "s3cret", "allowLocalhostBypass": false}}"#,
        );
        assert_eq!(config.access_control.mode, AccessControlMode::Token);
        assert_eq!(config.access_control.token.as_deref(), Some("s3cret"));
        assert!(!config.access_control.allow_localhost_bypass);
    }
}
