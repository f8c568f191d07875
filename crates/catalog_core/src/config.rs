//! Import engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use crate::import::pipeline::{DocumentUpdatePolicy, PipelineOptions};
use crate::import::slug::{SlugGenerator, DEFAULT_MAX_ATTEMPTS, DEFAULT_SUFFIX_LENGTH};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Engine settings loaded from `catalog.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Default cap on new documents per batch; `None` means uncapped.
    pub document_limit: Option<usize>,
    pub document_update_policy: DocumentUpdatePolicy,
    pub slug_suffix_length: usize,
    pub slug_max_attempts: u32,
    /// Root of the filesystem audit store.
    pub audit_dir: PathBuf,
    pub log_level: Option<String>,
    /// Rolling log directory; logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            document_limit: None,
            document_update_policy: DocumentUpdatePolicy::default(),
            slug_suffix_length: DEFAULT_SUFFIX_LENGTH,
            slug_max_attempts: DEFAULT_MAX_ATTEMPTS,
            audit_dir: PathBuf::from("audit"),
            log_level: None,
            log_dir: None,
        }
    }
}

impl ImportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Pipeline options, with an optional per-batch document limit override.
    pub fn pipeline_options(&self, document_limit: Option<usize>) -> PipelineOptions {
        PipelineOptions {
            document_limit: document_limit.or(self.document_limit),
            document_update_policy: self.document_update_policy,
            slugs: SlugGenerator::new(self.slug_suffix_length, self.slug_max_attempts),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.slug_suffix_length == 0 || self.slug_suffix_length > 32 {
            return Err(ConfigError::Invalid(format!(
                "slug_suffix_length must be within 1..=32, got {}",
                self.slug_suffix_length
            )));
        }
        if self.slug_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "slug_max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
