use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::level::Level;
use crate::utils::error_chain_fmt;

/// Tips and learning resources grouped by level, loaded once at startup.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct LearningCatalog {
    #[serde(default)]
    tips: HashMap<Level, Vec<String>>,
    #[serde(default)]
    resources: HashMap<Level, Vec<String>>,
}

#[derive(thiserror::Error)]
pub enum LearningCatalogError {
    #[error("Failed to read the learning data file.")]
    Read(#[from] std::io::Error),
    #[error("The learning data file is not valid.")]
    Invalid(#[from] serde_json::Error),
}

impl std::fmt::Debug for LearningCatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl LearningCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<LearningCatalog, LearningCatalogError> {
        let raw = std::fs::read_to_string(path)?;
        LearningCatalog::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<LearningCatalog, LearningCatalogError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn random_tip(&self, level: Level) -> Option<&str> {
        self.tips
            .get(&level)
            .and_then(|tips| tips.choose(&mut rand::thread_rng()))
            .map(String::as_str)
    }

    pub fn resources(&self, level: Level) -> &[String] {
        self.resources
            .get(&level)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
