//! Model Registry (C1): loads the model catalog from a YAML document via
//! figment, validating every entry before the process starts serving
//! requests. Validation failure here is fatal at startup, not a silent
//! fallback.

use anyhow::{Context, Result};
use figment::providers::{Format, Yaml};
use figment::Figment;
use serde::Deserialize;

use crate::domain::models::{ModelDefinition, TaskPreferences};

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    models: Vec<ModelDefinition>,
    #[serde(default)]
    task_preferences: TaskPreferences,
}

/// The validated model catalog plus task-type preference table.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub models: Vec<ModelDefinition>,
    pub task_preferences: TaskPreferences,
}

impl ModelCatalog {
    /// Loads and validates the catalog document at `path`. Returns the first
    /// validation failure encountered, wrapping `ConfigError`.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let doc: CatalogDocument = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load model catalog from {}", path.as_ref().display()))?;

        for model in &doc.models {
            model.validate().with_context(|| format!("model catalog entry {:?} failed validation", model.id))?;
        }

        Ok(Self {
            models: doc.models,
            task_preferences: doc.task_preferences,
        })
    }

    /// Models with `enabled = true`, the only candidates the MoE Router ever
    /// considers.
    pub fn enabled_models(&self) -> Vec<ModelDefinition> {
        self.models.iter().filter(|m| m.enabled).cloned().collect()
    }
}
