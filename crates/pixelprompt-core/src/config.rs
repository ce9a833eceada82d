use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_MODEL_REPO: &str = "stable-diffusion-v1-5/stable-diffusion-v1-5";
pub const DEFAULT_STEPS: usize = 50;
pub const DEFAULT_FILE_NAME: &str = "generated_image.png";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model_repo: Option<String>,
    pub steps: Option<usize>,
    pub seed: Option<u64>,
    pub force_cpu: bool,
    pub last_save_dir: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Remember the directory of the last successful save and persist the
    /// whole config to `config_path`.
    pub fn save_last_save_dir(&mut self, dir: &Path, config_path: &Path) -> Result<()> {
        self.last_save_dir = Some(dir.to_path_buf());
        self.save_to(config_path)
    }

    pub fn model_repo(&self) -> &str {
        self.model_repo.as_deref().unwrap_or(DEFAULT_MODEL_REPO)
    }

    pub fn steps(&self) -> usize {
        self.steps.filter(|s| *s > 0).unwrap_or(DEFAULT_STEPS)
    }

    /// Path the save dialog starts from.
    pub fn default_save_path(&self) -> PathBuf {
        let dir = self
            .last_save_dir
            .clone()
            .filter(|d| d.is_dir())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        dir.join(DEFAULT_FILE_NAME)
    }

    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("pixelprompt").join("config.json"))
    }
}
