//! Configuration for the anonymization pipeline
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a working configuration.

use crate::error::MaskError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaskConfig {
    /// Value written to the document's `/Author` entry
    #[serde(default = "default_author_attribution")]
    pub author_attribution: String,
    /// Replacement used when the oracle supplies none
    #[serde(default = "default_placeholder_replacement")]
    pub placeholder_replacement: String,
    /// Entity type assumed when the oracle omits one
    #[serde(default = "default_record_type")]
    pub default_record_type: String,
    /// Maximum number of characters handed to the oracle
    #[serde(default = "default_text_budget")]
    pub text_budget: usize,
    /// Covered-area ratio above which a line counts as an overlay duplicate
    #[serde(default = "default_overlay_threshold")]
    pub overlay_threshold: f32,
    /// Entity types whose values are also searched token by token
    #[serde(default = "default_name_split_types")]
    pub name_split_types: Vec<String>,
    /// Directories scanned for standalone TrueType faces
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
    /// Process pages on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_author_attribution() -> String {
    "holomask https://holofin.ai".to_string()
}

fn default_placeholder_replacement() -> String {
    "XXXXX".to_string()
}

fn default_record_type() -> String {
    "Unknown".to_string()
}

fn default_text_budget() -> usize {
    8000
}

fn default_overlay_threshold() -> f32 {
    0.5
}

fn default_name_split_types() -> Vec<String> {
    vec!["Person Name".to_string(), "Client Name".to_string()]
}

fn default_parallel() -> bool {
    true
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            author_attribution: default_author_attribution(),
            placeholder_replacement: default_placeholder_replacement(),
            default_record_type: default_record_type(),
            text_budget: default_text_budget(),
            overlay_threshold: default_overlay_threshold(),
            name_split_types: default_name_split_types(),
            font_dirs: Vec::new(),
            parallel: default_parallel(),
        }
    }
}

impl MaskConfig {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `MaskError::Io` if the file cannot be read and
    /// `MaskError::Config` if it is malformed or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MaskError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
            .map_err(|e| MaskError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use pdfmask_core::MaskConfig;
    ///
    /// let config = MaskConfig::from_str("text_budget = 4000").unwrap();
    /// assert_eq!(config.text_budget, 4000);
    /// assert_eq!(config.placeholder_replacement, "XXXXX");
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, MaskError> {
        let config: MaskConfig =
            toml::from_str(s).map_err(|e| MaskError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MaskError> {
        if self.text_budget == 0 {
            return Err(MaskError::Config(
                "text_budget must be greater than zero".to_string(),
            ));
        }
        if !(self.overlay_threshold > 0.0 && self.overlay_threshold <= 1.0) {
            return Err(MaskError::Config(format!(
                "overlay_threshold must be in (0, 1], got {}",
                self.overlay_threshold
            )));
        }
        if self.placeholder_replacement.trim().is_empty() {
            return Err(MaskError::Config(
                "placeholder_replacement must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether values of this entity type are also searched token by token.
    pub fn splits_names_for(&self, record_type: &str) -> bool {
        let wanted = record_type.trim();
        self.name_split_types
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(wanted))
    }
}
