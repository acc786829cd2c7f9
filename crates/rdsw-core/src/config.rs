use crate::retry::RetryPolicy;
use crate::wait::PollTiming;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backoff between conflicting attempts (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay in seconds before the second attempt (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// Fails on a negative, NaN or infinite `base_delay_secs`.
    pub fn policy(&self) -> Result<RetryPolicy> {
        let base_delay = Duration::try_from_secs_f64(self.base_delay_secs).with_context(|| {
            format!("invalid retry.base_delay_secs: {}", self.base_delay_secs)
        })?;
        Ok(RetryPolicy {
            base_delay,
            max_delay: Duration::from_secs(self.max_delay_secs),
        })
    }
}

/// Default wait timings for CLI commands (optional section in config.toml).
/// Library calls always pass their own timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    pub timeout_secs: u64,
    pub delay_secs: u64,
    /// 0 = exponential polling.
    pub poll_interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 1800,
            delay_secs: 10,
            poll_interval_secs: 10,
        }
    }
}

impl WaitConfig {
    pub fn timing(&self) -> PollTiming {
        PollTiming {
            timeout: Duration::from_secs(self.timeout_secs),
            delay: Duration::from_secs(self.delay_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/rdsw/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdswConfig {
    /// RDS endpoint, e.g. `https://rds.ap-southeast-1.myhuaweicloud.com`.
    pub endpoint: String,
    /// Project id used in request paths.
    pub project_id: String,
    /// Name of the environment variable holding a pre-issued IAM token.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional wait timings; if missing, built-in defaults are used.
    #[serde(default)]
    pub wait: Option<WaitConfig>,
}

impl Default for RdswConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://rds.ap-southeast-1.myhuaweicloud.com".to_string(),
            project_id: String::new(),
            token_env: Some("HW_AUTH_TOKEN".to_string()),
            retry: None,
            wait: None,
        }
    }
}

impl RdswConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        self.retry.clone().unwrap_or_default().policy()
    }

    pub fn wait_timing(&self) -> PollTiming {
        self.wait.clone().unwrap_or_default().timing()
    }

    /// Token from the configured environment variable, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        let var = self.token_env.as_deref()?;
        std::env::var(var).ok().filter(|t| !t.trim().is_empty())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdsw")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RdswConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<RdswConfig> {
    if !path.exists() {
        let default_cfg = RdswConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: RdswConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
