use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::Result;
use crate::transcription::DEFAULT_TOLERANCE_MS;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// How far (ms) a segment may end past the audio before it is dropped.
    pub segment_tolerance_ms: u64,
    /// Rate assumed for callers that pass no sample rate.
    pub default_sample_rate: u32,
    /// Fixed whisper thread count; `None` asks the CPU advisor on every call.
    pub threads: Option<usize>,
    pub language: Option<String>,
    pub translate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segment_tolerance_ms: DEFAULT_TOLERANCE_MS,
            default_sample_rate: DEFAULT_SAMPLE_RATE,
            threads: None,
            language: None,
            translate: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ConfigStore {
    file_path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(file_path: P) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Reads the config, writing defaults back when the file is missing or bad.
    pub fn load(&self) -> EngineConfig {
        if self.file_path.exists() {
            match fs::read_to_string(&self.file_path) {
                Ok(content) => match EngineConfig::from_json(&content) {
                    Ok(config) => {
                        info!("Config loaded from {:?}", self.file_path);
                        return config;
                    }
                    Err(e) => error!("Failed to parse config: {}", e),
                },
                Err(e) => error!("Failed to read config file: {}", e),
            }
        }
        info!("Using default config and saving to {:?}", self.file_path);
        let defaults = EngineConfig::default();
        if let Err(e) = self.save(&defaults) {
            error!("Failed to write config: {}", e);
        }
        defaults
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.file_path, config.to_json()?)?;
        info!("Config saved.");
        Ok(())
    }
}
