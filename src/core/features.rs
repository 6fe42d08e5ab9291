//! Feature schema and feature-row construction.
//!
//! The model declares an ordered list of column names at training time. A
//! scoring pass engineers a handful of named columns from the customer
//! record and then projects them onto that list: absent names are filled with
//! zero, names the model does not know are dropped, and the result is laid
//! out in the model's order.

use crate::domain::model::{Contract, CustomerRecord, PaymentMethod};
use crate::utils::error::{Result, ScorerError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const TENURE: &str = "tenure";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const CONTRACT_ONE_YEAR: &str = "Contract_One year";
pub const CONTRACT_TWO_YEAR: &str = "Contract_Two year";
pub const PAYMENT_CREDIT_CARD: &str = "PaymentMethod_Credit card (automatic)";
pub const PAYMENT_ELECTRONIC_CHECK: &str = "PaymentMethod_Electronic check";
pub const PAYMENT_MAILED_CHECK: &str = "PaymentMethod_Mailed check";

/// Columns produced by [`engineer_features`], in production order.
pub const ENGINEERED_COLUMNS: [&str; 7] = [
    TENURE,
    MONTHLY_CHARGES,
    CONTRACT_ONE_YEAR,
    CONTRACT_TWO_YEAR,
    PAYMENT_CREDIT_CARD,
    PAYMENT_ELECTRONIC_CHECK,
    PAYMENT_MAILED_CHECK,
];

/// Ordered, duplicate-free list of the columns a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(ScorerError::InvalidSchema {
                message: "schema declares no features".to_string(),
            });
        }

        let mut positions = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ScorerError::InvalidSchema {
                    message: format!("feature #{} has an empty name", position),
                });
            }
            if positions.insert(name.clone(), position).is_some() {
                return Err(ScorerError::InvalidSchema {
                    message: format!("feature '{}' is declared more than once", name),
                });
            }
        }

        Ok(Self { names, positions })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Schema columns that `produced` never supplies; these are always zero.
    pub fn unproduced<'a>(&'a self, produced: &[&str]) -> Vec<&'a str> {
        let produced: HashSet<&str> = produced.iter().copied().collect();
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| !produced.contains(name))
            .collect()
    }
}

/// One numeric row laid out in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureRow {
    pub fn new(schema: &FeatureSchema, values: Vec<f64>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(ScorerError::SchemaMismatch {
                expected: schema.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            names: schema.names().to_vec(),
            values,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|position| self.values[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Result of projecting named values onto a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub row: FeatureRow,
    /// Schema columns with no supplied value.
    pub zero_filled: Vec<String>,
    /// Supplied names the schema does not declare.
    pub dropped: Vec<String>,
}

/// Projects named values onto `schema`, defaulting absent fields to zero.
///
/// When a name is supplied more than once the last value wins.
pub fn project<I, K>(fields: I, schema: &FeatureSchema) -> Projection
where
    I: IntoIterator<Item = (K, f64)>,
    K: AsRef<str>,
{
    let mut values = vec![0.0; schema.len()];
    let mut supplied = vec![false; schema.len()];
    let mut dropped = Vec::new();

    for (name, value) in fields {
        let name = name.as_ref();
        match schema.position(name) {
            Some(position) => {
                values[position] = value;
                supplied[position] = true;
            }
            None => dropped.push(name.to_string()),
        }
    }

    let zero_filled = schema
        .names()
        .iter()
        .zip(&supplied)
        .filter(|(_, supplied)| !**supplied)
        .map(|(name, _)| name.clone())
        .collect();

    Projection {
        row: FeatureRow {
            names: schema.names().to_vec(),
            values,
        },
        zero_filled,
        dropped,
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// The engineered columns for one record. "Month-to-month" and "Bank
/// transfer" are baseline categories with no dummy column of their own.
pub fn engineer_features(record: &CustomerRecord) -> [(&'static str, f64); 7] {
    [
        (TENURE, f64::from(record.tenure)),
        (MONTHLY_CHARGES, record.monthly_charges),
        (CONTRACT_ONE_YEAR, indicator(record.contract == Contract::OneYear)),
        (CONTRACT_TWO_YEAR, indicator(record.contract == Contract::TwoYear)),
        (
            PAYMENT_CREDIT_CARD,
            indicator(record.payment_method == PaymentMethod::CreditCard),
        ),
        (
            PAYMENT_ELECTRONIC_CHECK,
            indicator(record.payment_method == PaymentMethod::ElectronicCheck),
        ),
        (
            PAYMENT_MAILED_CHECK,
            indicator(record.payment_method == PaymentMethod::MailedCheck),
        ),
    ]
}

/// Builds the model-ready row for `record`.
pub fn build_feature_row(record: &CustomerRecord, schema: &FeatureSchema) -> FeatureRow {
    let projection = project(engineer_features(record), schema);
    if !projection.dropped.is_empty() {
        tracing::debug!(
            "Dropped engineered columns unknown to the model: {:?}",
            projection.dropped
        );
    }
    projection.row
}
