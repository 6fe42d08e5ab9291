use crate::core::features::FeatureRow;
use crate::core::shap::Attribution;
use crate::domain::model::Prediction;
use crate::utils::error::Result;

/// A binary churn classifier over a fixed feature schema.
pub trait Classifier {
    /// Feature names in training order.
    fn feature_names(&self) -> &[String];

    /// Raw score (log-odds) for one row laid out in `feature_names` order.
    fn decision_function(&self, row: &FeatureRow) -> Result<f64>;

    fn predict(&self, row: &FeatureRow) -> Result<Prediction> {
        Ok(Prediction::from_margin(self.decision_function(row)?))
    }
}

/// Additive per-feature attribution of a classifier's raw score.
pub trait Attributor {
    fn expected_value(&self) -> f64;

    fn shap_values(&self, row: &FeatureRow) -> Result<Attribution>;
}
