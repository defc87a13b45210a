use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use parimate_matching::YandexConfig;
use parimate_types::{
    ClassifierConfig, MatchingConfig, MetadataConfig, OrchestratorConfig, PipelineConfig,
    ReflectionConfig, SamplingConfig,
};

/// Top-level configuration for parimate, one TOML table per stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParimateConfig {
    /// Frames sampled for the deepfake check.
    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub reflection: ReflectionConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Speech and translation endpoints. Credentials come from the
    /// environment, never from this file.
    #[serde(default)]
    pub yandex: YandexConfig,
}

impl ParimateConfig {
    pub const DEFAULT_FILE: &'static str = "parimate.toml";

    /// Load config from disk. Returns default if not found.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(Self::DEFAULT_FILE)
    }
}
