//! Compiler configuration

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::rdf::NamespaceManager;
use crate::sparql::TriplestoreDialect;
use crate::transform::TransformSettings;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Gravsearch compiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravsearchConfig {
    /// Main resources per prequery page
    pub results_per_page: u64,
    /// Target triplestore
    pub dialect: TriplestoreDialect,
    /// Name of the VALUES placeholder in main query templates
    pub main_resource_placeholder: String,
    /// Expand class and property statements to their subtypes
    pub expand_inference: bool,
    /// Prefixes queries may use without declaring them
    pub extra_prefixes: IndexMap<String, String>,
}

impl Default for GravsearchConfig {
    fn default() -> Self {
        Self {
            results_per_page: 25,
            dialect: TriplestoreDialect::Standard,
            main_resource_placeholder: "main_resource_iris".to_string(),
            expand_inference: true,
            extra_prefixes: IndexMap::new(),
        }
    }
}

impl GravsearchConfig {
    /// Parse YAML (or JSON) configuration
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.results_per_page == 0 {
            return Err(ConfigError::Invalid("results_per_page must be positive".to_string()));
        }
        let placeholder = &self.main_resource_placeholder;
        if placeholder.is_empty() || !placeholder.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Invalid(format!(
                "main_resource_placeholder must be a non-empty identifier, got {:?}",
                placeholder
            )));
        }
        Ok(())
    }

    /// Default prefixes plus the configured ones
    pub fn namespaces(&self) -> NamespaceManager {
        let mut namespaces = NamespaceManager::new();
        for (prefix, iri) in &self.extra_prefixes {
            namespaces.add_prefix(prefix.clone(), iri.clone());
        }
        namespaces
    }

    pub fn transform_settings(&self) -> TransformSettings {
        TransformSettings {
            page_size: self.results_per_page,
            expand_inference: self.expand_inference,
            main_resource_placeholder: self.main_resource_placeholder.clone(),
        }
    }
}
