use crate::core::artifacts::AppContext;
use crate::core::features::{build_feature_row, FeatureRow, FeatureSchema};
use crate::core::model::ChurnModel;
use crate::core::shap::{Attribution, ShapExplainer};
use crate::domain::model::{CustomerRecord, Prediction};
use crate::domain::ports::{Attributor, Classifier};
use crate::utils::error::Result;
use crate::utils::monitor::ProcessMonitor;
use crate::utils::validation::Validate;
use serde::Serialize;

/// Absolute slack allowed between the model's raw score and the explainer's
/// additive reconstruction before a warning is logged.
const ADDITIVITY_TOLERANCE: f64 = 1e-6;

/// Everything one scoring pass produces.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringOutcome {
    pub record: CustomerRecord,
    pub row: FeatureRow,
    pub prediction: Prediction,
    pub attribution: Attribution,
}

pub struct ScoringEngine<'a, C: Classifier, A: Attributor> {
    schema: &'a FeatureSchema,
    classifier: &'a C,
    attributor: &'a A,
    monitor: ProcessMonitor,
}

impl<'a> ScoringEngine<'a, ChurnModel, ShapExplainer> {
    pub fn from_context(context: &'a AppContext) -> Self {
        Self::new(context.schema(), context.model(), context.explainer())
    }
}

impl<'a, C: Classifier, A: Attributor> ScoringEngine<'a, C, A> {
    pub fn new(schema: &'a FeatureSchema, classifier: &'a C, attributor: &'a A) -> Self {
        Self {
            schema,
            classifier,
            attributor,
            monitor: ProcessMonitor::default(),
        }
    }

    pub fn with_monitor(mut self, monitor: ProcessMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn monitor_mut(&mut self) -> &mut ProcessMonitor {
        &mut self.monitor
    }

    /// The model-ready row for `record`, without scoring it.
    pub fn build_row(&self, record: &CustomerRecord) -> Result<FeatureRow> {
        record.validate()?;
        Ok(build_feature_row(record, self.schema))
    }

    /// Builds the row, predicts, and explains the prediction.
    pub fn score(&mut self, record: &CustomerRecord) -> Result<ScoringOutcome> {
        tracing::info!(
            "Scoring customer: tenure={}, contract={}, monthly_charges={:.2}, payment_method={}",
            record.tenure,
            record.contract,
            record.monthly_charges,
            record.payment_method
        );

        let row = self.build_row(record)?;
        tracing::debug!("Feature row: {:?}", row.iter().collect::<Vec<_>>());

        let prediction = self.classifier.predict(&row)?;
        tracing::info!(
            "Prediction: risk={}, probability={:.4}, margin={:.4}",
            prediction.risk_level(),
            prediction.probability,
            prediction.margin
        );
        self.monitor.log_stats("predict");

        let attribution = self.attributor.shap_values(&row)?;
        let residual = (attribution.output_value() - prediction.margin).abs();
        if residual > ADDITIVITY_TOLERANCE {
            tracing::warn!(
                "SHAP values do not add up to the model output (off by {:.3e})",
                residual
            );
        } else {
            tracing::debug!("SHAP additivity residual {:.3e}", residual);
        }
        self.monitor.log_stats("explain");

        Ok(ScoringOutcome {
            record: *record,
            row,
            prediction,
            attribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Contract, PaymentMethod};
    use crate::utils::error::ScorerError;
    use std::cell::Cell;

    struct FixedClassifier {
        names: Vec<String>,
        margin: f64,
        calls: Cell<usize>,
    }

    impl Classifier for FixedClassifier {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn decision_function(&self, _row: &FeatureRow) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.margin)
        }
    }

    struct SplitEvenly {
        base: f64,
        target: f64,
    }

    impl Attributor for SplitEvenly {
        fn expected_value(&self) -> f64 {
            self.base
        }

        fn shap_values(&self, row: &FeatureRow) -> Result<Attribution> {
            let share = (self.target - self.base) / row.len() as f64;
            Ok(Attribution {
                base_value: self.base,
                feature_names: row.names().to_vec(),
                feature_values: row.values().to_vec(),
                shap_values: vec![share; row.len()],
            })
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            "tenure".to_string(),
            "Contract_Two year".to_string(),
            "PaymentMethod_Mailed check".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_score_runs_both_ports_on_the_same_row() {
        let schema = schema();
        let classifier = FixedClassifier {
            names: schema.names().to_vec(),
            margin: -0.4,
            calls: Cell::new(0),
        };
        let attributor = SplitEvenly {
            base: -1.0,
            target: -0.4,
        };
        let mut engine = ScoringEngine::new(&schema, &classifier, &attributor);

        let record = CustomerRecord::new(30, Contract::TwoYear, 55.0, PaymentMethod::MailedCheck).unwrap();
        let outcome = engine.score(&record).unwrap();

        assert_eq!(classifier.calls.get(), 1);
        assert!(!outcome.prediction.churn);
        assert_eq!(outcome.row.values(), &[30.0, 1.0, 1.0]);
        assert_eq!(outcome.attribution.feature_values, outcome.row.values());
        assert!((outcome.attribution.output_value() - outcome.prediction.margin).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_record_never_reaches_the_classifier() {
        let schema = schema();
        let classifier = FixedClassifier {
            names: schema.names().to_vec(),
            margin: 1.0,
            calls: Cell::new(0),
        };
        let attributor = SplitEvenly {
            base: 0.0,
            target: 1.0,
        };
        let mut engine = ScoringEngine::new(&schema, &classifier, &attributor);

        let mut record = CustomerRecord::default();
        record.tenure = 100;
        let err = engine.score(&record).unwrap_err();
        assert!(matches!(err, ScorerError::InvalidInput { .. }));
        assert_eq!(classifier.calls.get(), 0);
    }

    #[test]
    fn test_non_additive_attribution_is_still_returned() {
        let schema = schema();
        let classifier = FixedClassifier {
            names: schema.names().to_vec(),
            margin: 2.0,
            calls: Cell::new(0),
        };
        let attributor = SplitEvenly {
            base: 0.0,
            target: 1.0,
        };
        let mut engine = ScoringEngine::new(&schema, &classifier, &attributor);
        let outcome = engine.score(&CustomerRecord::default()).unwrap();
        assert!(outcome.prediction.churn);
        assert!((outcome.attribution.output_value() - 1.0).abs() < 1e-12);
    }
}
