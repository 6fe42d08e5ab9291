//! The churn classifier artifact and its inference.

use crate::core::features::{FeatureRow, FeatureSchema};
use crate::domain::ports::Classifier;
use crate::utils::error::{Result, ScorerError};
use serde::{Deserialize, Serialize};

/// Relative tolerance for cover bookkeeping inside a tree.
const COVER_TOLERANCE: f64 = 1e-6;

/// One node of a regression tree. Node 0 is the root; a row goes to `left`
/// when `x[feature] < threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn check(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !(cover > 0.0 && cover.is_finite()) {
                return Err(format!("node {} has non-positive cover {}", index, cover));
            }

            if let Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!(
                        "node {} splits on feature {} but the model has {} features",
                        index, feature, n_features
                    ));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has a non-finite threshold", index));
                }
                for child in [*left, *right] {
                    // children after their parent keeps every path finite
                    if child <= index || child >= self.nodes.len() {
                        return Err(format!(
                            "node {} points at invalid child {}",
                            index, child
                        ));
                    }
                }
                let children = self.nodes[*left].cover() + self.nodes[*right].cover();
                if (children - cover).abs() > COVER_TOLERANCE * cover.max(1.0) {
                    return Err(format!(
                        "node {} has cover {} but its children cover {}",
                        index, cover, children
                    ));
                }
            }
        }

        Ok(())
    }

    /// Leaf value reached by `x`.
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    index = if x[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Cover-weighted mean of the leaf values.
    pub fn expected_value(&self) -> f64 {
        // children always follow their parent, so a reverse sweep sees them first
        let mut expectations = vec![0.0; self.nodes.len()];
        for index in (0..self.nodes.len()).rev() {
            expectations[index] = match &self.nodes[index] {
                Node::Leaf { value, .. } => *value,
                Node::Split {
                    left, right, cover, ..
                } => {
                    (self.nodes[*left].cover() * expectations[*left]
                        + self.nodes[*right].cover() * expectations[*right])
                        / cover
                }
            };
        }
        expectations[0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    GradientBoostedTrees {
        base_score: f64,
        trees: Vec<Tree>,
    },
}

impl Estimator {
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression { .. } => "logistic_regression",
            Estimator::GradientBoostedTrees { .. } => "gradient_boosted_trees",
        }
    }
}

/// A trained binary churn classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnModel {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub estimator: Estimator,
}

impl ChurnModel {
    /// Checks the structure a deserialized artifact cannot express in types.
    pub fn check(&self, source: &str) -> Result<()> {
        let malformed = |message: String| ScorerError::ArtifactFormatError {
            path: source.to_string(),
            message,
        };

        let n_features = self.feature_names.len();
        match &self.estimator {
            Estimator::LogisticRegression { coefficients, .. } => {
                if coefficients.len() != n_features {
                    return Err(malformed(format!(
                        "{} coefficients for {} features",
                        coefficients.len(),
                        n_features
                    )));
                }
            }
            Estimator::GradientBoostedTrees { trees, .. } => {
                if trees.is_empty() {
                    return Err(malformed("ensemble has no trees".to_string()));
                }
                for (index, tree) in trees.iter().enumerate() {
                    tree.check(n_features)
                        .map_err(|message| malformed(format!("tree {}: {}", index, message)))?;
                }
            }
        }

        Ok(())
    }

    /// The model's ordered feature list.
    pub fn schema(&self) -> Result<FeatureSchema> {
        FeatureSchema::new(self.feature_names.clone())
    }

    /// Mean raw score over the training distribution the covers describe.
    /// Only defined for tree ensembles.
    pub fn tree_expected_margin(&self) -> Option<f64> {
        match &self.estimator {
            Estimator::GradientBoostedTrees { base_score, trees } => {
                Some(base_score + trees.iter().map(Tree::expected_value).sum::<f64>())
            }
            Estimator::LogisticRegression { .. } => None,
        }
    }

    fn margin(&self, x: &[f64]) -> f64 {
        match &self.estimator {
            Estimator::LogisticRegression {
                intercept,
                coefficients,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .zip(x)
                        .map(|(w, v)| w * v)
                        .sum::<f64>()
            }
            Estimator::GradientBoostedTrees { base_score, trees } => {
                base_score + trees.iter().map(|tree| tree.evaluate(x)).sum::<f64>()
            }
        }
    }
}

impl Classifier for ChurnModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn decision_function(&self, row: &FeatureRow) -> Result<f64> {
        if row.names() != self.feature_names.as_slice() {
            return Err(ScorerError::SchemaMismatch {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }
        Ok(self.margin(row.values()))
    }
}
