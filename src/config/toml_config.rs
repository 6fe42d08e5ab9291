use crate::config::OutputFormat;
use crate::utils::error::{Result, ScorerError};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `churn-scorer.toml`. Every section and key is optional; absent
/// values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub artifacts: Option<ArtifactsConfig>,
    pub output: Option<OutputConfig>,
    pub logging: Option<LoggingConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub model_path: Option<String>,
    pub explainer_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: Option<String>,
    pub format: Option<OutputFormat>,
    pub summary_chart: Option<String>,
    pub contributions_chart: Option<String>,
    pub contributions_csv: Option<String>,
    pub chart_width: Option<u32>,
    pub chart_height: Option<u32>,
    pub write_csv: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<LogFormat>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScorerError::MissingConfigError {
                    field: path.display().to_string(),
                }
            } else {
                ScorerError::IoError(e)
            }
        })?;
        let content = String::from_utf8(bytes).map_err(|e| ScorerError::ConfigValidationError {
            field: path.display().to_string(),
            message: format!("configuration file is not valid UTF-8: {}", e),
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScorerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScorerError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(artifacts) = &self.artifacts {
            if let Some(model_path) = &artifacts.model_path {
                validation::validate_path("artifacts.model_path", model_path)?;
                validation::validate_file_extension("artifacts.model_path", model_path, &["json"])?;
            }
            if let Some(explainer_path) = &artifacts.explainer_path {
                validation::validate_path("artifacts.explainer_path", explainer_path)?;
                validation::validate_file_extension(
                    "artifacts.explainer_path",
                    explainer_path,
                    &["json"],
                )?;
            }
        }

        if let Some(output) = &self.output {
            if let Some(directory) = &output.directory {
                validation::validate_path("output.directory", directory)?;
            }
            if let Some(width) = output.chart_width {
                validation::validate_positive_number("output.chart_width", width, 1)?;
            }
            if let Some(height) = output.chart_height {
                validation::validate_positive_number("output.chart_height", height, 1)?;
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if !LOG_LEVELS.contains(&level) {
                return Err(ScorerError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
