use crate::error::{LoomError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_structural_patterns() -> Vec<String> {
    [
        "package.json",
        "requirements.txt",
        "go.mod",
        "Cargo.toml",
        "setup.py",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_request_bytes() -> usize {
    256 * 1024
}

/// Tool configuration, stored as JSON under the git dir.
///
/// Every field is optional in the file; defaults apply when the file is
/// absent or a field is omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Manifest filenames auto-added to context as structural entries.
    #[serde(default = "default_structural_patterns")]
    pub structural_patterns: Vec<String>,

    /// Model identifier sent to the generation backend.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Ceiling on the structured prompt size; exceeding it fails fast
    /// instead of truncating.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            structural_patterns: default_structural_patterns(),
            model: default_model(),
            temperature: default_temperature(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults if the file does not
    /// exist. Malformed JSON or an invalid field value is a fatal error.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data).map_err(|e| LoomError::Config {
            field: "config".to_string(),
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.structural_patterns.is_empty() {
            return Err(invalid("structural_patterns", "must not be empty"));
        }
        if self.structural_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid(
                "structural_patterns",
                "patterns must be non-empty filenames",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0 and 2"));
        }
        if self.max_request_bytes == 0 {
            return Err(invalid("max_request_bytes", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, detail: &str) -> LoomError {
    LoomError::Config {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}
