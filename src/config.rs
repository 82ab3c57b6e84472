use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// Header tokens of the stroke table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnNames {
    pub time: String,
    pub x: String,
    pub y: String,
    pub pressure: String,
    pub contact: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            x: "X".to_string(),
            y: "Y".to_string(),
            pressure: "pressure".to_string(),
            contact: "contact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosisLabels {
    pub positive: String,
    pub negative: String,
}

impl Default for DiagnosisLabels {
    fn default() -> Self {
        Self {
            positive: "suspected dementia".to_string(),
            negative: "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub columns: ColumnNames,
    /// Model name patterns, highest priority first.
    pub model_tiers: Vec<String>,
    pub scaler_patterns: Vec<String>,
    /// Empty means the working directory and all of its ancestors.
    pub search_roots: Vec<PathBuf>,
    pub labels: DiagnosisLabels,
    pub gmrt_offset: usize,
    pub cache_artifacts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            model_tiers: vec![
                "BernoulliNB*.json".to_string(),
                "displacement_prediction_model.json*".to_string(),
                "*.model.json".to_string(),
            ],
            scaler_patterns: vec!["displacement_scaler.json*".to_string()],
            search_roots: Vec::new(),
            labels: DiagnosisLabels::default(),
            gmrt_offset: 1,
            cache_artifacts: true,
        }
    }
}

impl Config {
    /// The configured search roots, or the ancestors of `cwd` when none are set.
    pub fn resolved_search_roots(&self, cwd: &Path) -> Vec<PathBuf> {
        if self.search_roots.is_empty() {
            AppDirs::ancestors(cwd)
        } else {
            self.search_roots.clone()
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("pentrace_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed config");
                Config::default()
            }
        }
    }
}
