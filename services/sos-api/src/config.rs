//! SOS configuration loading and types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sos_common::{FaultPhrases, Operation, OperationKey, PhraseError};
use sos_protocol::RestVocabulary;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::backend::ServiceInfo;
use crate::pipeline::PipelineSettings;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid operation key '{0}', expected service/version/operation")]
    InvalidOperationKey(String),

    #[error("unknown operation '{0}' in formats.defaults")]
    UnknownOperation(String),

    #[error("rest.url_pattern must start with '/' and must not end with it: '{0}'")]
    InvalidUrlPattern(String),

    #[error("rest resource segment names must be unique and non-empty")]
    InvalidResourceNames,

    #[error(transparent)]
    Phrases(#[from] PhraseError),
}

/// SOS configuration loaded from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SosConfig {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub operations: OperationsSection,

    #[serde(default)]
    pub formats: FormatsSection,

    /// Message fragments used to build and classify faults.
    #[serde(default)]
    pub faults: FaultPhrases,

    #[serde(default)]
    pub rest: RestVocabulary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Public URL of this service, used in links and capabilities.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_title() -> String {
    "Sensor Observation Service".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            abstract_text: None,
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationsSection {
    /// Keys of the form `SOS/2.0.0/DeleteSensor`.
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatsSection {
    /// Response format per operation name for the KVP, POX and SOAP bindings.
    #[serde(default = "default_formats")]
    pub defaults: BTreeMap<String, String>,
}

fn default_formats() -> BTreeMap<String, String> {
    crate::pipeline::default_response_formats()
        .into_iter()
        .map(|(op, format)| (op.as_str().to_string(), format))
        .collect()
}

impl Default for FormatsSection {
    fn default() -> Self {
        Self {
            defaults: default_formats(),
        }
    }
}

impl SosConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                "SOS config file {:?} does not exist, using defaults",
                path
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to load config: {:?}", path))?;

        tracing::info!(
            path = ?path,
            disabled = config.operations.disabled.len(),
            "Loaded SOS configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: SosConfig = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.disabled_keys()?;
        self.default_formats()?;

        let pattern = &self.rest.url_pattern;
        if !pattern.starts_with('/') || pattern.ends_with('/') || pattern.len() < 2 {
            return Err(ConfigError::InvalidUrlPattern(pattern.clone()));
        }

        let names = &self.rest.resources;
        let segments = [
            &names.capabilities,
            &names.sensors,
            &names.observations,
            &names.features,
            &names.offerings,
        ];
        let unique: std::collections::HashSet<&String> = segments.iter().copied().collect();
        if unique.len() != segments.len() || segments.iter().any(|s| s.is_empty() || s.contains('/')) {
            return Err(ConfigError::InvalidResourceNames);
        }

        self.faults.validate()?;
        Ok(())
    }

    /// Disabled operation keys.
    pub fn disabled_keys(&self) -> Result<Vec<OperationKey>, ConfigError> {
        self.operations
            .disabled
            .iter()
            .map(|s| OperationKey::parse(s).ok_or_else(|| ConfigError::InvalidOperationKey(s.clone())))
            .collect()
    }

    fn default_formats(&self) -> Result<HashMap<Operation, String>, ConfigError> {
        self.formats
            .defaults
            .iter()
            .map(|(name, format)| {
                name.parse::<Operation>()
                    .map(|op| (op, format.clone()))
                    .map_err(|_| ConfigError::UnknownOperation(name.clone()))
            })
            .collect()
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        Ok(PipelineSettings {
            phrases: self.faults.clone(),
            default_formats: self.default_formats()?,
            rest: self.rest.clone(),
            base_url: self.service.base_url.clone(),
        })
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            title: self.service.title.clone(),
            abstract_text: self.service.abstract_text.clone(),
            base_url: self.service.base_url.clone(),
        }
    }
}
