use crate::utils::error::Result;
use crate::utils::validation::{validate_input_range, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TENURE_MIN: u32 = 0;
pub const TENURE_MAX: u32 = 72;
pub const TENURE_DEFAULT: u32 = 12;
pub const MONTHLY_CHARGES_MIN: f64 = 0.0;
pub const MONTHLY_CHARGES_MAX: f64 = 200.0;
pub const MONTHLY_CHARGES_DEFAULT: f64 = 70.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Contract {
    #[default]
    MonthToMonth,
    OneYear,
    TwoYear,
}

impl Contract {
    pub const ALL: [Contract; 3] = [Contract::MonthToMonth, Contract::OneYear, Contract::TwoYear];

    pub fn label(&self) -> &'static str {
        match self {
            Contract::MonthToMonth => "Month-to-month",
            Contract::OneYear => "One year",
            Contract::TwoYear => "Two year",
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    #[default]
    ElectronicCheck,
    MailedCheck,
    BankTransfer,
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::ElectronicCheck,
        PaymentMethod::MailedCheck,
        PaymentMethod::BankTransfer,
        PaymentMethod::CreditCard,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::ElectronicCheck => "Electronic check",
            PaymentMethod::MailedCheck => "Mailed check",
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::CreditCard => "Credit card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four customer attributes collected for one scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub tenure: u32,
    pub contract: Contract,
    pub monthly_charges: f64,
    pub payment_method: PaymentMethod,
}

impl CustomerRecord {
    /// Builds a record, rejecting values outside the form's ranges.
    pub fn new(
        tenure: u32,
        contract: Contract,
        monthly_charges: f64,
        payment_method: PaymentMethod,
    ) -> Result<Self> {
        let record = Self {
            tenure,
            contract,
            monthly_charges,
            payment_method,
        };
        record.validate()?;
        Ok(record)
    }
}

impl Default for CustomerRecord {
    fn default() -> Self {
        Self {
            tenure: TENURE_DEFAULT,
            contract: Contract::default(),
            monthly_charges: MONTHLY_CHARGES_DEFAULT,
            payment_method: PaymentMethod::default(),
        }
    }
}

impl Validate for CustomerRecord {
    fn validate(&self) -> Result<()> {
        validate_input_range("tenure", self.tenure, TENURE_MIN, TENURE_MAX)?;
        validate_input_range(
            "monthly_charges",
            self.monthly_charges,
            MONTHLY_CHARGES_MIN,
            MONTHLY_CHARGES_MAX,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Low,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::High => f.write_str("High"),
            RiskLevel::Low => f.write_str("Low"),
        }
    }
}

/// Outcome of the classifier for one feature row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Discrete classifier output: `true` is the churn class.
    pub churn: bool,
    /// Positive-class probability.
    pub probability: f64,
    /// Raw log-odds score the probability is derived from.
    pub margin: f64,
}

impl Prediction {
    pub fn from_margin(margin: f64) -> Self {
        Self {
            churn: margin > 0.0,
            probability: logistic(margin),
            margin,
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        if self.churn {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

/// Numerically stable logistic function.
pub fn logistic(margin: f64) -> f64 {
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let e = margin.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_matches_form_defaults() {
        let record = CustomerRecord::default();
        assert_eq!(record.tenure, 12);
        assert_eq!(record.contract, Contract::MonthToMonth);
        assert_eq!(record.monthly_charges, 70.0);
        assert_eq!(record.payment_method, PaymentMethod::ElectronicCheck);
    }

    #[test]
    fn test_record_rejects_out_of_range_values() {
        assert!(CustomerRecord::new(72, Contract::TwoYear, 200.0, PaymentMethod::CreditCard).is_ok());
        assert!(CustomerRecord::new(73, Contract::TwoYear, 70.0, PaymentMethod::CreditCard).is_err());
        assert!(CustomerRecord::new(12, Contract::OneYear, -0.01, PaymentMethod::MailedCheck).is_err());
        assert!(CustomerRecord::new(12, Contract::OneYear, f64::NAN, PaymentMethod::MailedCheck).is_err());
    }

    #[test]
    fn test_prediction_label_follows_margin_sign() {
        let high = Prediction::from_margin(1.2);
        assert!(high.churn);
        assert_eq!(high.risk_level(), RiskLevel::High);
        assert!(high.probability > 0.5);

        let low = Prediction::from_margin(-0.3);
        assert_eq!(low.risk_level(), RiskLevel::Low);
        assert!(low.probability < 0.5);

        // exact tie stays in the negative class
        assert!(!Prediction::from_margin(0.0).churn);
    }

    #[test]
    fn test_logistic_stays_in_unit_interval() {
        for margin in [-1000.0, -30.0, -1.0, 0.0, 1.0, 30.0, 1000.0] {
            let p = logistic(margin);
            assert!((0.0..=1.0).contains(&p), "p = {}", p);
        }
        assert!((logistic(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_labels_match_form_options() {
        assert_eq!(Contract::OneYear.to_string(), "One year");
        assert_eq!(PaymentMethod::CreditCard.to_string(), "Credit card");
    }
}
