use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::DEFAULT_THRESHOLD;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("RECOG_CONFIG_PATH").unwrap_or("/usr/local/etc/recog/config.toml"))
});

pub static STORE_PREFIX: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("RECOG_STORE_PREFIX").unwrap_or("/usr/local/var/recog"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub threshold: f32,
    pub store_dir: PathBuf,
    /// Skip unreadable profiles during a match instead of failing it.
    pub skip_corrupt: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            store_dir: default_store_dir(),
            skip_corrupt: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            anyhow::bail!("threshold must lie in [-1, 1], got {}", self.threshold);
        }
        Ok(())
    }
}

pub fn default_store_dir() -> PathBuf {
    ProjectDirs::from("", "", "recog")
        .map(|dirs| dirs.data_dir().join("users"))
        .unwrap_or_else(|| STORE_PREFIX.join("users"))
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
