//! Serializable pipeline configuration.

use std::path::{Path, PathBuf};

use calcpipe_core::components::{ComponentArgs, ComponentKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content hash identifying a pipeline configuration.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse pipeline TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("[{section}] has an empty `type`")]
    EmptyType { section: &'static str },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One component section: the registered type name plus its constructor
/// arguments, passed through to the registry unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub args: ComponentArgs,
}

impl ComponentSpec {
    pub fn new(type_name: impl Into<String>, args: ComponentArgs) -> Self {
        Self {
            type_name: type_name.into(),
            args,
        }
    }
}

/// Everything needed to assemble and run one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Restrict runs to these identifiers; `None` processes everything the
    /// source lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<Vec<String>>,

    /// Probe every component before a run and refuse to start if any is down.
    #[serde(default = "default_probe_before_run")]
    pub probe_before_run: bool,

    pub source: ComponentSpec,
    pub saver: ComponentSpec,
    pub backup: ComponentSpec,
    pub calculator: ComponentSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraper: Option<ComponentSpec>,
}

fn default_probe_before_run() -> bool {
    true
}

impl PipelineConfig {
    /// Load and validate a pipeline from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a pipeline from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, spec) in self.sections() {
            if spec.type_name.trim().is_empty() {
                return Err(ConfigError::EmptyType {
                    section: kind.as_str(),
                });
            }
        }
        Ok(())
    }

    /// Present component sections, in assembly order.
    pub fn sections(&self) -> Vec<(ComponentKind, &ComponentSpec)> {
        let mut sections = vec![
            (ComponentKind::Source, &self.source),
            (ComponentKind::Saver, &self.saver),
            (ComponentKind::Backup, &self.backup),
            (ComponentKind::Calculator, &self.calculator),
        ];
        if let Some(scraper) = &self.scraper {
            sections.push((ComponentKind::Scraper, scraper));
        }
        sections
    }

    /// Deterministic hash of this configuration.
    ///
    /// Two runs of an identical config share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
