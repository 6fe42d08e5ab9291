use churn_scorer::config::{OutputFormat, Settings, SettingsOverrides};
use churn_scorer::core::charts::render_charts;
use churn_scorer::core::report::{self, ScoringReport};
use churn_scorer::{AppContext, Contract, CustomerRecord, PaymentMethod, ScorerError, ScoringEngine};
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

fn artifacts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts")
}

fn config_file(output_dir: &std::path::Path, extra: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[artifacts]
model_path = "{}"
explainer_path = "{}"

[output]
directory = "{}"
{}
"#,
        artifacts_dir().join("churn_model.json").display(),
        artifacts_dir().join("shap_explainer.json").display(),
        output_dir.display(),
        extra
    )
    .unwrap();
    file
}

#[test]
fn test_end_to_end_prediction_with_charts_and_csv() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_file(temp_dir.path(), "");
    let settings = Settings::load(Some(config.path()), &SettingsOverrides::default()).unwrap();

    let context = AppContext::load(&settings.artifacts).unwrap();
    let mut engine = ScoringEngine::from_context(&context);
    let record = CustomerRecord::new(2, Contract::MonthToMonth, 95.0, PaymentMethod::ElectronicCheck).unwrap();
    let outcome = engine.score(&record).unwrap();

    let charts = render_charts(
        &outcome.attribution,
        &settings.output_dir,
        &settings.summary_chart,
        &settings.contributions_chart,
        settings.chart_size,
    )
    .unwrap();
    assert_eq!(charts.summary, temp_dir.path().join("shap_summary.svg"));
    assert_eq!(charts.contributions, temp_dir.path().join("shap_contributions.svg"));

    let summary = std::fs::read_to_string(&charts.summary).unwrap();
    assert!(summary.contains("Overall Feature Impact"));
    let waterfall = std::fs::read_to_string(&charts.contributions).unwrap();
    assert!(waterfall.contains("tenure = 2"));

    let csv_path = settings.contributions_csv_path();
    report::write_contributions_csv(&outcome.attribution.contributions(), &csv_path).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 1 + context.schema().len());
    assert!(csv.starts_with("feature,value,shap_value"));

    let scoring_report = ScoringReport::new(&outcome)
        .with_charts(charts)
        .with_contributions_csv(csv_path);
    let json: serde_json::Value = serde_json::from_str(&scoring_report.to_json().unwrap()).unwrap();
    assert_eq!(json["prediction"]["risk"], "High");
    assert_eq!(json["customer"]["payment_method"], "electronic-check");
    assert_eq!(json["features"].as_array().unwrap().len(), 8);
    assert!(json["charts"]["summary"].as_str().unwrap().ends_with("shap_summary.svg"));

    let text = scoring_report.to_text();
    assert!(text.starts_with("Churn Risk: **High** (Probability: "));
    assert!(text.contains("Contributions CSV:"));
}

#[test]
fn test_loyal_customer_is_low_risk() {
    let context = AppContext::load(&churn_scorer::core::artifacts::ArtifactPaths {
        model: artifacts_dir().join("churn_model.json"),
        explainer: artifacts_dir().join("shap_explainer.json"),
    })
    .unwrap();
    let mut engine = ScoringEngine::from_context(&context);
    let record = CustomerRecord::new(60, Contract::TwoYear, 45.0, PaymentMethod::CreditCard).unwrap();
    let outcome = engine.score(&record).unwrap();

    assert!(!outcome.prediction.churn);
    assert!(outcome.prediction.probability < 0.5);
    assert!(report::verdict_line(&outcome.prediction).starts_with("Churn Risk: **Low**"));
}

#[test]
fn test_command_line_overrides_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_file(temp_dir.path(), "format = \"json\"\nwrite_csv = false\nchart_width = 1200");

    let from_file = Settings::load(Some(config.path()), &SettingsOverrides::default()).unwrap();
    assert_eq!(from_file.format, OutputFormat::Json);
    assert!(!from_file.write_csv);
    assert_eq!(from_file.chart_size.width, 1200);
    assert_eq!(from_file.output_dir, temp_dir.path());

    let overrides = SettingsOverrides {
        output_dir: Some(PathBuf::from("elsewhere")),
        format: Some(OutputFormat::Text),
        no_charts: true,
        ..Default::default()
    };
    let resolved = Settings::load(Some(config.path()), &overrides).unwrap();
    assert_eq!(resolved.format, OutputFormat::Text);
    assert_eq!(resolved.output_dir, PathBuf::from("elsewhere"));
    assert!(!resolved.render_charts);
    assert_eq!(resolved.artifacts.model, artifacts_dir().join("churn_model.json"));
}

#[test]
fn test_invalid_config_is_a_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_file(temp_dir.path(), "summary_chart = \"summary.png\"");
    let err = Settings::load(Some(config.path()), &SettingsOverrides::default()).unwrap_err();
    assert!(matches!(err, ScorerError::InvalidConfigValueError { .. }));
    assert_eq!(err.exit_code(), 2);

    let err = Settings::load(
        Some(temp_dir.path().join("missing.toml").as_path()),
        &SettingsOverrides::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ScorerError::MissingConfigError { .. }));
}

#[test]
fn test_missing_artifacts_from_config_are_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let overrides = SettingsOverrides {
        model_path: Some(temp_dir.path().join("absent.json")),
        ..Default::default()
    };
    let config = config_file(temp_dir.path(), "");
    let settings = Settings::load(Some(config.path()), &overrides).unwrap();
    let err = AppContext::load(&settings.artifacts).unwrap_err();
    assert!(matches!(err, ScorerError::ArtifactNotFound { .. }));
}
