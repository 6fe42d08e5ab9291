use churn_scorer::core::artifacts::ArtifactPaths;
use churn_scorer::core::features::{FeatureRow, FeatureSchema};
use churn_scorer::core::model::{ChurnModel, Estimator, Node, Tree};
use churn_scorer::core::shap::{tree_shap, ExplainerArtifact, ShapAlgorithm, ShapExplainer};
use churn_scorer::domain::ports::{Attributor, Classifier};
use churn_scorer::{AppContext, Contract, CustomerRecord, PaymentMethod, ScoringEngine};
use std::path::PathBuf;

fn sample_context() -> AppContext {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts");
    AppContext::load(&ArtifactPaths {
        model: root.join("churn_model.json"),
        explainer: root.join("shap_explainer.json"),
    })
    .unwrap()
}

/// Expected tree output when only the features in `known` are fixed to `x`
/// and the rest follow the training covers.
fn conditional_expectation(tree: &Tree, index: usize, x: &[f64], known: &[bool]) -> f64 {
    match &tree.nodes[index] {
        Node::Leaf { value, .. } => *value,
        Node::Split {
            feature,
            threshold,
            left,
            right,
            cover,
        } => {
            if known[*feature] {
                let next = if x[*feature] < *threshold { *left } else { *right };
                conditional_expectation(tree, next, x, known)
            } else {
                let l = tree.nodes[*left].cover();
                let r = tree.nodes[*right].cover();
                (l * conditional_expectation(tree, *left, x, known)
                    + r * conditional_expectation(tree, *right, x, known))
                    / cover
            }
        }
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn brute_force_shapley(tree: &Tree, x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut phi = vec![0.0; n];
    for i in 0..n {
        for mask in 0u32..(1 << n) {
            if mask & (1 << i) != 0 {
                continue;
            }
            let mut known: Vec<bool> = (0..n).map(|j| mask & (1 << j) != 0).collect();
            let size = mask.count_ones() as usize;
            let weight = factorial(size) * factorial(n - size - 1) / factorial(n);
            let without = conditional_expectation(tree, 0, x, &known);
            known[i] = true;
            let with = conditional_expectation(tree, 0, x, &known);
            phi[i] += weight * (with - without);
        }
    }
    phi
}

fn sample_trees(model: &ChurnModel) -> &[Tree] {
    match &model.estimator {
        Estimator::GradientBoostedTrees { trees, .. } => trees,
        Estimator::LogisticRegression { .. } => panic!("sample model is a tree ensemble"),
    }
}

#[test]
fn test_additivity_for_every_input() {
    let context = sample_context();
    let mut engine = ScoringEngine::from_context(&context);

    for contract in Contract::ALL {
        for payment_method in PaymentMethod::ALL {
            for (tenure, charges) in [(0, 0.0), (12, 70.0), (40, 99.9), (72, 200.0)] {
                let record = CustomerRecord::new(tenure, contract, charges, payment_method).unwrap();
                let outcome = engine.score(&record).unwrap();
                let reconstructed = outcome.attribution.output_value();
                assert!(
                    (reconstructed - outcome.prediction.margin).abs() < 1e-9,
                    "{:?}: {} vs {}",
                    record,
                    reconstructed,
                    outcome.prediction.margin
                );
                assert!((0.0..=1.0).contains(&outcome.prediction.probability));
                assert_eq!(outcome.prediction.churn, outcome.prediction.margin > 0.0);
            }
        }
    }
}

#[test]
fn test_tree_shap_matches_brute_force_shapley() {
    let context = sample_context();
    let engine = ScoringEngine::from_context(&context);
    let trees = sample_trees(context.model());

    let records = [
        CustomerRecord::default(),
        CustomerRecord::new(0, Contract::MonthToMonth, 0.0, PaymentMethod::MailedCheck).unwrap(),
        CustomerRecord::new(72, Contract::TwoYear, 200.0, PaymentMethod::CreditCard).unwrap(),
        CustomerRecord::new(40, Contract::OneYear, 85.0, PaymentMethod::BankTransfer).unwrap(),
    ];

    for record in records {
        let row = engine.build_row(&record).unwrap();
        let x = row.values();

        let mut expected = vec![0.0; x.len()];
        for tree in trees {
            for (total, value) in expected.iter_mut().zip(brute_force_shapley(tree, x)) {
                *total += value;
            }
        }

        let attribution = context.explainer().shap_values(&row).unwrap();
        for (actual, expected) in attribution.shap_values.iter().zip(&expected) {
            assert!((actual - expected).abs() < 1e-9, "{:?}: {} vs {}", record, actual, expected);
        }
    }
}

#[test]
fn test_single_tree_shap_accumulates_into_phi() {
    let context = sample_context();
    let trees = sample_trees(context.model());
    let row = ScoringEngine::from_context(&context)
        .build_row(&CustomerRecord::default())
        .unwrap();

    let mut phi = vec![0.0; row.len()];
    tree_shap(&trees[0], row.values(), &mut phi);
    let once = phi.clone();
    tree_shap(&trees[0], row.values(), &mut phi);

    for (twice, once) in phi.iter().zip(&once) {
        assert!((twice - 2.0 * once).abs() < 1e-12);
    }
    // the first tree only splits on tenure and the two-year contract
    assert_eq!(once[0], 0.0);
    assert_eq!(once[2], 0.0);
}

#[test]
fn test_unused_feature_gets_zero_attribution() {
    let context = sample_context();
    let mut engine = ScoringEngine::from_context(&context);
    let outcome = engine.score(&CustomerRecord::default()).unwrap();
    let senior = outcome
        .attribution
        .contributions()
        .into_iter()
        .find(|c| c.feature == "SeniorCitizen")
        .unwrap();
    assert_eq!(senior.shap_value, 0.0);
}

#[test]
fn test_default_customer_is_high_risk_with_the_sample_model() {
    let context = sample_context();
    let mut engine = ScoringEngine::from_context(&context);
    let outcome = engine.score(&CustomerRecord::default()).unwrap();

    // -1.0 + 0.9 + 0.6 + 0.2 + 0.05
    assert!((outcome.prediction.margin - 0.75).abs() < 1e-12);
    assert!(outcome.prediction.churn);
    assert!((outcome.attribution.base_value - (-0.9775)).abs() < 1e-12);
}

#[test]
fn test_linear_explainer_end_to_end() {
    let model = ChurnModel {
        format_version: 1,
        feature_names: vec![
            "tenure".to_string(),
            "MonthlyCharges".to_string(),
            "Contract_Two year".to_string(),
        ],
        estimator: Estimator::LogisticRegression {
            intercept: -0.5,
            coefficients: vec![-0.04, 0.015, -1.2],
        },
    };
    let artifact = ExplainerArtifact::for_linear_model(&model, vec![32.0, 64.0, 0.25]).unwrap();
    let explainer = ShapExplainer::bind(artifact, &model).unwrap();
    assert_eq!(explainer.algorithm(), ShapAlgorithm::Linear);

    let schema = FeatureSchema::new(model.feature_names.clone()).unwrap();
    let row = FeatureRow::new(&schema, vec![2.0, 95.0, 0.0]).unwrap();
    let attribution = explainer.shap_values(&row).unwrap();

    assert!((attribution.shap_values[0] - (-0.04 * (2.0 - 32.0))).abs() < 1e-12);
    assert!((attribution.shap_values[2] - (-1.2 * (0.0 - 0.25))).abs() < 1e-12);
    let margin = model.decision_function(&row).unwrap();
    assert!((attribution.output_value() - margin).abs() < 1e-12);
}
