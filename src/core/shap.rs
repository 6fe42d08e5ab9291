//! SHAP attributions for the churn model.
//!
//! Tree ensembles use exact path-dependent Tree SHAP; logistic regression
//! uses Linear SHAP against per-feature training means. Both attribute the
//! raw score (log-odds), so `base_value + Σ shap_values` reproduces the
//! model's margin for the explained row.

use crate::core::features::FeatureRow;
use crate::core::model::{ChurnModel, Estimator, Node, Tree};
use crate::domain::ports::Attributor;
use crate::utils::error::{Result, ScorerError};
use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing a declared expected value with the
/// one implied by the model.
const EXPECTED_VALUE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapAlgorithm {
    Tree,
    Linear,
}

impl ShapAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapAlgorithm::Tree => "tree",
            ShapAlgorithm::Linear => "linear",
        }
    }
}

/// Serialized explainer as exported next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerArtifact {
    pub format_version: u32,
    pub algorithm: ShapAlgorithm,
    pub feature_names: Vec<String>,
    pub expected_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_means: Option<Vec<f64>>,
}

impl ExplainerArtifact {
    /// Derives the tree explainer for a tree-ensemble model.
    pub fn for_tree_model(model: &ChurnModel) -> Result<Self> {
        let expected_value =
            model
                .tree_expected_margin()
                .ok_or_else(|| ScorerError::IncompatibleArtifacts {
                    message: format!(
                        "tree explainer requires a tree ensemble, got {}",
                        model.estimator.kind()
                    ),
                })?;
        Ok(Self {
            format_version: model.format_version,
            algorithm: ShapAlgorithm::Tree,
            feature_names: model.feature_names.clone(),
            expected_value,
            feature_means: None,
        })
    }

    /// Derives the linear explainer for a logistic-regression model given
    /// the background feature means.
    pub fn for_linear_model(model: &ChurnModel, feature_means: Vec<f64>) -> Result<Self> {
        match &model.estimator {
            Estimator::LogisticRegression {
                intercept,
                coefficients,
            } => Ok(Self {
                format_version: model.format_version,
                algorithm: ShapAlgorithm::Linear,
                feature_names: model.feature_names.clone(),
                expected_value: linear_expected_value(*intercept, coefficients, &feature_means),
                feature_means: Some(feature_means),
            }),
            other => Err(ScorerError::IncompatibleArtifacts {
                message: format!(
                    "linear explainer requires logistic regression, got {}",
                    other.kind()
                ),
            }),
        }
    }
}

fn linear_expected_value(intercept: f64, coefficients: &[f64], means: &[f64]) -> f64 {
    intercept
        + coefficients
            .iter()
            .zip(means)
            .map(|(w, mu)| w * mu)
            .sum::<f64>()
}

/// Per-feature attribution of one row's raw score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub base_value: f64,
    pub feature_names: Vec<String>,
    pub feature_values: Vec<f64>,
    pub shap_values: Vec<f64>,
}

/// One feature's share of an attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: String,
    pub value: f64,
    pub shap_value: f64,
}

impl Attribution {
    /// `base_value + Σ shap_values`, the raw score being explained.
    pub fn output_value(&self) -> f64 {
        self.base_value + self.shap_values.iter().sum::<f64>()
    }

    /// Contributions in schema order.
    pub fn contributions(&self) -> Vec<Contribution> {
        self.feature_names
            .iter()
            .zip(&self.feature_values)
            .zip(&self.shap_values)
            .map(|((feature, value), shap_value)| Contribution {
                feature: feature.clone(),
                value: *value,
                shap_value: *shap_value,
            })
            .collect()
    }

    /// Contributions ordered by decreasing magnitude; ties keep schema order.
    pub fn ranked_contributions(&self) -> Vec<Contribution> {
        let mut contributions = self.contributions();
        contributions.sort_by(|a, b| b.shap_value.abs().total_cmp(&a.shap_value.abs()));
        contributions
    }
}

/// Mean |SHAP| per feature over a set of attributions, largest first.
pub fn global_importance(attributions: &[Attribution]) -> Vec<(String, f64)> {
    let Some(first) = attributions.first() else {
        return Vec::new();
    };

    let mut totals = vec![0.0; first.feature_names.len()];
    for attribution in attributions {
        for (total, value) in totals.iter_mut().zip(&attribution.shap_values) {
            *total += value.abs();
        }
    }

    let count = attributions.len() as f64;
    let mut importance: Vec<(String, f64)> = first
        .feature_names
        .iter()
        .cloned()
        .zip(totals.into_iter().map(|total| total / count))
        .collect();
    importance.sort_by(|a, b| b.1.total_cmp(&a.1));
    importance
}

#[derive(Debug, Clone)]
enum ExplainerKind {
    Tree {
        trees: Vec<Tree>,
    },
    Linear {
        coefficients: Vec<f64>,
        means: Vec<f64>,
    },
}

/// An explainer bound to the model it explains.
#[derive(Debug, Clone)]
pub struct ShapExplainer {
    feature_names: Vec<String>,
    expected_value: f64,
    kind: ExplainerKind,
}

impl ShapExplainer {
    /// Pairs an explainer artifact with its model, rejecting any mismatch.
    pub fn bind(artifact: ExplainerArtifact, model: &ChurnModel) -> Result<Self> {
        let incompatible = |message: String| ScorerError::IncompatibleArtifacts { message };

        if artifact.feature_names != model.feature_names {
            return Err(incompatible(format!(
                "explainer features {:?} differ from model features {:?}",
                artifact.feature_names, model.feature_names
            )));
        }

        let (implied, kind) = match (&artifact.algorithm, &model.estimator) {
            (ShapAlgorithm::Tree, Estimator::GradientBoostedTrees { base_score, trees }) => {
                if artifact.feature_means.is_some() {
                    return Err(incompatible(
                        "tree explainer carries feature_means; is it a linear explainer?".to_string(),
                    ));
                }
                let implied = base_score + trees.iter().map(Tree::expected_value).sum::<f64>();
                (
                    implied,
                    ExplainerKind::Tree {
                        trees: trees.clone(),
                    },
                )
            }
            (
                ShapAlgorithm::Linear,
                Estimator::LogisticRegression {
                    intercept,
                    coefficients,
                },
            ) => {
                let means = artifact.feature_means.clone().ok_or_else(|| {
                    incompatible("linear explainer carries no feature_means".to_string())
                })?;
                if means.len() != coefficients.len() {
                    return Err(incompatible(format!(
                        "linear explainer has {} feature means for {} features",
                        means.len(),
                        coefficients.len()
                    )));
                }
                let implied = linear_expected_value(*intercept, coefficients, &means);
                (
                    implied,
                    ExplainerKind::Linear {
                        coefficients: coefficients.clone(),
                        means,
                    },
                )
            }
            (algorithm, estimator) => {
                return Err(incompatible(format!(
                    "{} explainer cannot explain a {} model",
                    algorithm.as_str(),
                    estimator.kind()
                )));
            }
        };

        let tolerance = EXPECTED_VALUE_TOLERANCE * implied.abs().max(1.0);
        if (artifact.expected_value - implied).abs() > tolerance {
            return Err(incompatible(format!(
                "explainer expected value {} does not match the model's {}",
                artifact.expected_value, implied
            )));
        }

        Ok(Self {
            feature_names: artifact.feature_names,
            expected_value: artifact.expected_value,
            kind,
        })
    }

    pub fn algorithm(&self) -> ShapAlgorithm {
        match self.kind {
            ExplainerKind::Tree { .. } => ShapAlgorithm::Tree,
            ExplainerKind::Linear { .. } => ShapAlgorithm::Linear,
        }
    }

    fn phi(&self, x: &[f64]) -> Vec<f64> {
        match &self.kind {
            ExplainerKind::Tree { trees } => {
                let mut phi = vec![0.0; x.len()];
                for tree in trees {
                    tree_shap(tree, x, &mut phi);
                }
                phi
            }
            ExplainerKind::Linear {
                coefficients,
                means,
            } => coefficients
                .iter()
                .zip(means)
                .zip(x)
                .map(|((w, mu), v)| w * (v - mu))
                .collect(),
        }
    }
}

impl Attributor for ShapExplainer {
    fn expected_value(&self) -> f64 {
        self.expected_value
    }

    fn shap_values(&self, row: &FeatureRow) -> Result<Attribution> {
        if row.names() != self.feature_names.as_slice() {
            return Err(ScorerError::SchemaMismatch {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }

        Ok(Attribution {
            base_value: self.expected_value,
            feature_names: self.feature_names.clone(),
            feature_values: row.values().to_vec(),
            shap_values: self.phi(row.values()),
        })
    }
}

/// One entry of the feature path tracked while descending a tree.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let scale = (depth + 1) as f64;

    let mut next = path[depth].weight;
    for j in (0..depth).rev() {
        if one_fraction != 0.0 {
            let current = path[j].weight;
            path[j].weight = next * scale / ((j + 1) as f64 * one_fraction);
            next = current - path[j].weight * zero_fraction * (depth - j) as f64 / scale;
        } else {
            path[j].weight = path[j].weight * scale / (zero_fraction * (depth - j) as f64);
        }
    }

    for j in index..depth {
        path[j].feature = path[j + 1].feature;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction = path[j + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let scale = (depth + 1) as f64;

    let mut total = 0.0;
    if one_fraction != 0.0 {
        let mut next = path[depth].weight;
        for j in (0..depth).rev() {
            let share = next * scale / ((j + 1) as f64 * one_fraction);
            total += share;
            next = path[j].weight - share * zero_fraction * (depth - j) as f64 / scale;
        }
    } else {
        for j in (0..depth).rev() {
            total += path[j].weight * scale / (zero_fraction * (depth - j) as f64);
        }
    }
    total
}

/// Adds the Tree SHAP values of `tree` at `x` into `phi`.
pub fn tree_shap(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    recurse(tree, x, phi, 0, Vec::new(), 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    x: &[f64],
    phi: &mut [f64],
    node: usize,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_path_sum(&path, i);
                let element = path[i];
                if let Some(f) = element.feature {
                    phi[f] += weight * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature: split,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if x[*split] < *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };

            // a feature seen earlier on the path is folded into this split
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            let hot_zero = incoming_zero * tree.nodes[hot].cover() / cover;
            let cold_zero = incoming_zero * tree.nodes[cold].cover() / cover;
            recurse(
                tree,
                x,
                phi,
                hot,
                path.clone(),
                hot_zero,
                incoming_one,
                Some(*split),
            );
            recurse(tree, x, phi, cold, path, cold_zero, 0.0, Some(*split));
        }
    }
}
