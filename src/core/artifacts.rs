//! Loading the model and explainer artifacts into the process-wide context.

use crate::core::features::{FeatureSchema, ENGINEERED_COLUMNS};
use crate::core::model::ChurnModel;
use crate::core::shap::{ExplainerArtifact, ShapExplainer};
use crate::utils::error::{Result, ScorerError};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_MODEL_PATH: &str = "churn_model.json";
pub const DEFAULT_EXPLAINER_PATH: &str = "shap_explainer.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub explainer: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            explainer: PathBuf::from(DEFAULT_EXPLAINER_PATH),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let display = path.display().to_string();
    // raw bytes, so non-UTF-8 content surfaces as a format error
    let content = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScorerError::ArtifactNotFound { path: display.clone() }
        } else {
            ScorerError::IoError(e)
        }
    })?;

    serde_json::from_slice(&content).map_err(|e| ScorerError::ArtifactFormatError {
        path: display,
        message: e.to_string(),
    })
}

fn check_format_version(path: &Path, version: u32) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(ScorerError::ArtifactFormatError {
            path: path.display().to_string(),
            message: format!(
                "unsupported format_version {} (expected {})",
                version, FORMAT_VERSION
            ),
        });
    }
    Ok(())
}

pub fn load_model(path: &Path) -> Result<ChurnModel> {
    let model: ChurnModel = read_json(path)?;
    check_format_version(path, model.format_version)?;
    model.check(&path.display().to_string())?;
    tracing::debug!(
        "Loaded {} model with {} features from {}",
        model.estimator.kind(),
        model.feature_names.len(),
        path.display()
    );
    Ok(model)
}

pub fn load_explainer(path: &Path) -> Result<ExplainerArtifact> {
    let artifact: ExplainerArtifact = read_json(path)?;
    check_format_version(path, artifact.format_version)?;
    tracing::debug!(
        "Loaded {} explainer from {}",
        artifact.algorithm.as_str(),
        path.display()
    );
    Ok(artifact)
}

/// Immutable state shared by every scoring pass of the process: the model,
/// its explainer and the feature schema fetched from the model once.
#[derive(Debug, Clone)]
pub struct AppContext {
    model: ChurnModel,
    explainer: ShapExplainer,
    schema: FeatureSchema,
}

impl AppContext {
    /// Loads both artifacts. Any missing, malformed or mismatched artifact
    /// is an error; there is no degraded mode.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        tracing::info!(
            "Loading artifacts: model={}, explainer={}",
            paths.model.display(),
            paths.explainer.display()
        );
        let model = load_model(&paths.model)?;
        let explainer = load_explainer(&paths.explainer)?;
        Self::from_parts(model, explainer)
    }

    pub fn from_parts(model: ChurnModel, explainer: ExplainerArtifact) -> Result<Self> {
        let schema = model.schema()?;
        let explainer = ShapExplainer::bind(explainer, &model)?;

        let unproduced = schema.unproduced(&ENGINEERED_COLUMNS);
        if !unproduced.is_empty() {
            tracing::warn!(
                "Model declares features the input builder never sets; they are always zero: {:?}",
                unproduced
            );
        }

        Ok(Self {
            model,
            explainer,
            schema,
        })
    }

    pub fn model(&self) -> &ChurnModel {
        &self.model
    }

    pub fn explainer(&self) -> &ShapExplainer {
        &self.explainer
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Schema features no customer input can set.
    pub fn zero_filled_features(&self) -> Vec<&str> {
        self.schema.unproduced(&ENGINEERED_COLUMNS)
    }
}
