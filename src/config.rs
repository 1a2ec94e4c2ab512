use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// FSRS desired retention rate 0.0-1.0 (default: 0.9)
    #[serde(default = "default_desired_retention")]
    pub desired_retention: f32,

    /// Maximum interval in days between reviews (default: 365)
    #[serde(default = "default_max_interval_days")]
    pub max_interval_days: f32,

    /// Minutes within which a rated card re-enters the current session (default: 15)
    #[serde(default = "default_requeue_window_mins")]
    pub requeue_window_mins: i64,

    /// Seconds between session timer ticks (default: 5)
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_desired_retention() -> f32 {
    0.9
}

fn default_max_interval_days() -> f32 {
    365.0
}

fn default_requeue_window_mins() -> i64 {
    15
}

fn default_tick_secs() -> u64 {
    5
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("lexsr").join("lexsr.db"))
        .unwrap_or_else(|| PathBuf::from("lexsr.db"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            desired_retention: default_desired_retention(),
            max_interval_days: default_max_interval_days(),
            requeue_window_mins: default_requeue_window_mins(),
            tick_secs: default_tick_secs(),
            db_path: default_db_path(),
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(suffix) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(suffix);
    }
    path.to_path_buf()
}

impl Config {
    /// Load config from file or return defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.db_path = expand_tilde(&config.db_path);
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Path to config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("lexsr").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Ensure required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(())
    }
}
