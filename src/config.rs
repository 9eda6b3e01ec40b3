use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestration::{CycleStrictness, TriggerConfig};
use crate::{tplog_debug, Error, Result};

/// Tag sent as `trigger_source` when the config does not override it.
pub const DEFAULT_TRIGGER_SOURCE: &str = "taskpilot";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory holding one JSON document per project.
    pub state_dir: Option<String>,
    pub trigger: Option<TriggerSection>,
    #[serde(default)]
    pub readiness: ReadinessSection,
}

/// `[trigger]` table. Timeout, retry count and delay have no defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerSection {
    pub url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub trigger_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReadinessSection {
    #[serde(default)]
    pub strict_cycles: bool,
}

impl Config {
    pub fn home_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskpilot"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("taskpilot.toml"))
    }

    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::home_dir()?.join("projects")),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tplog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tplog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        tplog_debug!(
            "Config loaded: state_dir={:?}, trigger={}, strict_cycles={}",
            config.state_dir,
            config.trigger.is_some(),
            config.readiness.strict_cycles
        );
        Ok(config)
    }

    /// Build the trigger configuration, failing when the `[trigger]` table is absent.
    pub fn trigger_config(&self) -> Result<TriggerConfig> {
        let section = self
            .trigger
            .as_ref()
            .ok_or_else(|| Error::Config("missing [trigger] section".to_string()))?;
        if section.url.trim().is_empty() {
            return Err(Error::Config("trigger.url must not be empty".to_string()));
        }
        if section.max_retries == 0 {
            return Err(Error::Config(
                "trigger.max_retries must be at least 1".to_string(),
            ));
        }
        Ok(TriggerConfig::new(
            Duration::from_secs(section.timeout_secs),
            section.max_retries,
            Duration::from_secs(section.retry_delay_secs),
        ))
    }

    pub fn trigger_url(&self) -> Option<&str> {
        self.trigger.as_ref().map(|t| t.url.as_str())
    }

    pub fn trigger_source(&self) -> &str {
        self.trigger
            .as_ref()
            .and_then(|t| t.trigger_source.as_deref())
            .unwrap_or(DEFAULT_TRIGGER_SOURCE)
    }

    pub fn cycle_strictness(&self) -> CycleStrictness {
        if self.readiness.strict_cycles {
            CycleStrictness::Strict
        } else {
            CycleStrictness::Lenient
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
