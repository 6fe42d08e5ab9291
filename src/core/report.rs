//! What a scoring pass shows the user: the verdict line, the JSON report and
//! the contribution table.

use crate::core::artifacts::AppContext;
use crate::core::charts::RenderedCharts;
use crate::core::engine::ScoringOutcome;
use crate::core::features::FeatureRow;
use crate::core::shap::Contribution;
use crate::domain::model::{CustomerRecord, Prediction, RiskLevel};
use crate::domain::ports::Attributor;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// `Churn Risk: **High** (Probability: 83.21%)`
pub fn verdict_line(prediction: &Prediction) -> String {
    format!(
        "Churn Risk: **{}** (Probability: {:.2}%)",
        prediction.risk_level(),
        prediction.probability * 100.0
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionSummary {
    pub risk: RiskLevel,
    pub churn: bool,
    pub probability: f64,
    pub margin: f64,
    pub verdict: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub base_value: f64,
    pub output_value: f64,
    pub contributions: Vec<Contribution>,
}

/// Machine-readable result of `predict --format json`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringReport {
    pub scored_at: DateTime<Utc>,
    pub customer: CustomerRecord,
    pub features: Vec<FeatureEntry>,
    pub prediction: PredictionSummary,
    pub explanation: Explanation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<RenderedCharts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributions_csv: Option<PathBuf>,
}

impl ScoringReport {
    pub fn new(outcome: &ScoringOutcome) -> Self {
        Self {
            scored_at: Utc::now(),
            customer: outcome.record,
            features: feature_entries(&outcome.row),
            prediction: PredictionSummary {
                risk: outcome.prediction.risk_level(),
                churn: outcome.prediction.churn,
                probability: outcome.prediction.probability,
                margin: outcome.prediction.margin,
                verdict: verdict_line(&outcome.prediction),
            },
            explanation: Explanation {
                base_value: outcome.attribution.base_value,
                output_value: outcome.attribution.output_value(),
                contributions: outcome.attribution.ranked_contributions(),
            },
            charts: None,
            contributions_csv: None,
        }
    }

    pub fn with_charts(mut self, charts: RenderedCharts) -> Self {
        self.charts = Some(charts);
        self
    }

    pub fn with_contributions_csv(mut self, path: PathBuf) -> Self {
        self.contributions_csv = Some(path);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable rendition: the verdict, then the strongest drivers.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.prediction.verdict);
        let _ = writeln!(
            out,
            "\nBase value {:+.4} -> model output {:+.4} (log-odds)",
            self.explanation.base_value, self.explanation.output_value
        );
        let width = name_width(self.explanation.contributions.iter().map(|c| c.feature.as_str()));
        for c in &self.explanation.contributions {
            let _ = writeln!(
                out,
                "  {:<width$}  {:>10}  {:+.4}",
                c.feature,
                format_value(c.value),
                c.shap_value,
                width = width
            );
        }
        if let Some(charts) = &self.charts {
            let _ = writeln!(out, "\nSummary plot:      {}", charts.summary.display());
            let _ = writeln!(out, "Contribution plot: {}", charts.contributions.display());
        }
        if let Some(csv) = &self.contributions_csv {
            let _ = writeln!(out, "Contributions CSV: {}", csv.display());
        }
        out
    }
}

fn feature_entries(row: &FeatureRow) -> Vec<FeatureEntry> {
    row.iter()
        .map(|(name, value)| FeatureEntry {
            name: name.to_string(),
            value,
        })
        .collect()
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|n| n.chars().count()).max().unwrap_or(0)
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Writes `feature,value,shap_value` rows in schema order.
pub fn write_contributions_csv(contributions: &[Contribution], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for contribution in contributions {
        writer.serialize(contribution)?;
    }
    writer.flush()?;
    tracing::debug!("Wrote {} contributions to {}", contributions.len(), path.display());
    Ok(())
}

/// Output of the `row` command.
pub fn format_row(record: &CustomerRecord, row: &FeatureRow) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "tenure={} contract=\"{}\" monthly_charges={:.2} payment_method=\"{}\"",
        record.tenure, record.contract, record.monthly_charges, record.payment_method
    );
    let width = name_width(row.names().iter().map(String::as_str));
    for (name, value) in row.iter() {
        let _ = writeln!(out, "  {:<width$}  {}", name, format_value(value), width = width);
    }
    out
}

pub fn row_json(record: &CustomerRecord, row: &FeatureRow) -> Result<String> {
    #[derive(Serialize)]
    struct RowReport<'a> {
        customer: &'a CustomerRecord,
        features: Vec<FeatureEntry>,
    }

    Ok(serde_json::to_string_pretty(&RowReport {
        customer: record,
        features: feature_entries(row),
    })?)
}

/// Output of the `schema` command.
pub fn format_schema(context: &AppContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Estimator: {}", context.model().estimator.kind());
    let _ = writeln!(
        out,
        "Explainer: {} (expected value {:+.6})",
        context.explainer().algorithm().as_str(),
        context.explainer().expected_value()
    );
    let _ = writeln!(out, "Features ({}):", context.schema().len());
    let zero_filled = context.zero_filled_features();
    for (index, name) in context.schema().names().iter().enumerate() {
        let marker = if zero_filled.contains(&name.as_str()) {
            "  (always 0)"
        } else {
            ""
        };
        let _ = writeln!(out, "  {:>2}. {}{}", index, name, marker);
    }
    if !zero_filled.is_empty() {
        let _ = writeln!(
            out,
            "\n{} feature(s) are never set by the customer inputs and are zero-filled.",
            zero_filled.len()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FeatureSchema;
    use crate::core::shap::Attribution;
    use tempfile::tempdir;

    fn outcome() -> ScoringOutcome {
        let schema = FeatureSchema::new(vec!["tenure".to_string(), "MonthlyCharges".to_string()]).unwrap();
        let row = FeatureRow::new(&schema, vec![3.0, 89.5]).unwrap();
        ScoringOutcome {
            record: CustomerRecord::default(),
            row,
            prediction: Prediction::from_margin(1.6),
            attribution: Attribution {
                base_value: -1.0,
                feature_names: vec!["tenure".to_string(), "MonthlyCharges".to_string()],
                feature_values: vec![3.0, 89.5],
                shap_values: vec![2.1, 0.5],
            },
        }
    }

    #[test]
    fn test_verdict_line() {
        let high = Prediction::from_margin(1.6);
        assert_eq!(verdict_line(&high), "Churn Risk: **High** (Probability: 83.20%)");

        let low = Prediction::from_margin(-2.0);
        assert_eq!(verdict_line(&low), "Churn Risk: **Low** (Probability: 11.92%)");
    }

    #[test]
    fn test_report_json_shape() {
        let json = ScoringReport::new(&outcome()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["prediction"]["risk"], "High");
        assert_eq!(value["customer"]["contract"], "month-to-month");
        assert_eq!(value["features"][1]["name"], "MonthlyCharges");
        assert_eq!(value["explanation"]["contributions"][0]["feature"], "tenure");
        assert!(value["scored_at"].is_string());
        assert!(value.get("charts").is_none());
    }

    #[test]
    fn test_text_report_lists_drivers() {
        let text = ScoringReport::new(&outcome()).to_text();
        assert!(text.starts_with("Churn Risk: **High**"));
        assert!(text.contains("+2.1000"));
        assert!(text.contains("89.50"));
    }

    #[test]
    fn test_contributions_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("contributions.csv");
        write_contributions_csv(&outcome().attribution.contributions(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("feature,value,shap_value"));
        assert_eq!(lines.next(), Some("tenure,3.0,2.1"));
        assert_eq!(lines.next(), Some("MonthlyCharges,89.5,0.5"));
    }

    #[test]
    fn test_format_row() {
        let o = outcome();
        let text = format_row(&o.record, &o.row);
        assert!(text.contains("contract=\"Month-to-month\""));
        assert!(text.contains("MonthlyCharges  89.50"));
    }
}
