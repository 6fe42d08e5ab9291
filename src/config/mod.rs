#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::TomlConfig;

use crate::core::artifacts::ArtifactPaths;
use crate::core::charts::ChartSize;
use crate::utils::error::{Result, ScorerError};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "churn-scorer.toml";

pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_SUMMARY_CHART: &str = "shap_summary.svg";
pub const DEFAULT_CONTRIBUTIONS_CHART: &str = "shap_contributions.svg";
pub const DEFAULT_CONTRIBUTIONS_CSV: &str = "contributions.csv";

const CHART_MIN: u32 = 200;
const CHART_MAX: u32 = 4000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub model_path: Option<PathBuf>,
    pub explainer_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub log_format: Option<LogFormat>,
    pub no_charts: bool,
    pub no_csv: bool,
    pub monitor: bool,
}

/// Effective settings for one run: command line over config file over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub artifacts: ArtifactPaths,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub summary_chart: String,
    pub contributions_chart: String,
    pub contributions_csv: String,
    pub chart_size: ChartSize,
    pub render_charts: bool,
    pub write_csv: bool,
    pub log_format: LogFormat,
    pub log_level: Option<String>,
    pub monitor: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifacts: ArtifactPaths::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            format: OutputFormat::default(),
            summary_chart: DEFAULT_SUMMARY_CHART.to_string(),
            contributions_chart: DEFAULT_CONTRIBUTIONS_CHART.to_string(),
            contributions_csv: DEFAULT_CONTRIBUTIONS_CSV.to_string(),
            chart_size: ChartSize::default(),
            render_charts: true,
            write_csv: true,
            log_format: LogFormat::default(),
            log_level: None,
            monitor: false,
        }
    }
}

impl Settings {
    /// Reads the config file (the explicit one, or `churn-scorer.toml` if it
    /// exists) and applies `overrides` on top.
    pub fn load(config_path: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => Some(TomlConfig::from_file(path)?),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Some(TomlConfig::from_file(DEFAULT_CONFIG_FILE)?)
            }
            None => None,
        };

        if let Some(file) = &file {
            file.validate()?;
        }

        let settings = Self::resolve(file.as_ref(), overrides);
        settings.validate()?;
        Ok(settings)
    }

    pub fn resolve(file: Option<&TomlConfig>, overrides: &SettingsOverrides) -> Self {
        let mut settings = Self::default();

        if let Some(file) = file {
            if let Some(artifacts) = &file.artifacts {
                if let Some(model_path) = &artifacts.model_path {
                    settings.artifacts.model = PathBuf::from(model_path);
                }
                if let Some(explainer_path) = &artifacts.explainer_path {
                    settings.artifacts.explainer = PathBuf::from(explainer_path);
                }
            }
            if let Some(output) = &file.output {
                if let Some(directory) = &output.directory {
                    settings.output_dir = PathBuf::from(directory);
                }
                if let Some(format) = output.format {
                    settings.format = format;
                }
                if let Some(name) = &output.summary_chart {
                    settings.summary_chart = name.clone();
                }
                if let Some(name) = &output.contributions_chart {
                    settings.contributions_chart = name.clone();
                }
                if let Some(name) = &output.contributions_csv {
                    settings.contributions_csv = name.clone();
                }
                if let Some(width) = output.chart_width {
                    settings.chart_size.width = width;
                }
                if let Some(height) = output.chart_height {
                    settings.chart_size.height = height;
                }
                if let Some(write_csv) = output.write_csv {
                    settings.write_csv = write_csv;
                }
            }
            if let Some(logging) = &file.logging {
                if let Some(format) = logging.format {
                    settings.log_format = format;
                }
                settings.log_level = logging.level.clone();
            }
            settings.monitor = file.monitoring_enabled();
        }

        if let Some(model_path) = &overrides.model_path {
            settings.artifacts.model = model_path.clone();
        }
        if let Some(explainer_path) = &overrides.explainer_path {
            settings.artifacts.explainer = explainer_path.clone();
        }
        if let Some(output_dir) = &overrides.output_dir {
            settings.output_dir = output_dir.clone();
        }
        if let Some(format) = overrides.format {
            settings.format = format;
        }
        if let Some(log_format) = overrides.log_format {
            settings.log_format = log_format;
        }
        if overrides.no_charts {
            settings.render_charts = false;
        }
        if overrides.no_csv {
            settings.write_csv = false;
        }
        settings.monitor |= overrides.monitor;

        settings
    }

    pub fn contributions_csv_path(&self) -> PathBuf {
        self.output_dir.join(&self.contributions_csv)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_path("artifacts.model_path", &self.artifacts.model.to_string_lossy())?;
        validation::validate_path(
            "artifacts.explainer_path",
            &self.artifacts.explainer.to_string_lossy(),
        )?;
        validation::validate_path("output.directory", &self.output_dir.to_string_lossy())?;
        validation::validate_file_extension("output.summary_chart", &self.summary_chart, &["svg"])?;
        validation::validate_file_extension(
            "output.contributions_chart",
            &self.contributions_chart,
            &["svg"],
        )?;
        validation::validate_file_extension(
            "output.contributions_csv",
            &self.contributions_csv,
            &["csv"],
        )?;
        validation::validate_range("output.chart_width", self.chart_size.width, CHART_MIN, CHART_MAX)?;
        validation::validate_range(
            "output.chart_height",
            self.chart_size.height,
            CHART_MIN,
            CHART_MAX,
        )?;
        if self.summary_chart == self.contributions_chart {
            return Err(ScorerError::InvalidConfigValueError {
                field: "output.contributions_chart".to_string(),
                value: self.contributions_chart.clone(),
                reason: "Must differ from output.summary_chart".to_string(),
            });
        }
        Ok(())
    }
}
