use crate::config::{OutputFormat, SettingsOverrides};
use crate::domain::model::{
    Contract, CustomerRecord, PaymentMethod, MONTHLY_CHARGES_DEFAULT, MONTHLY_CHARGES_MAX,
    MONTHLY_CHARGES_MIN, TENURE_DEFAULT, TENURE_MAX, TENURE_MIN,
};
use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "churn-scorer")]
#[command(version, about = "Predict customer churn risk and explain the prediction with SHAP")]
pub struct CliConfig {
    /// TOML configuration file (defaults to ./churn-scorer.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model artifact (JSON)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// SHAP explainer artifact (JSON)
    #[arg(long, global = true)]
    pub explainer: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log process CPU and memory after each phase")]
    pub monitor: bool,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Score one customer, print the verdict and render the SHAP plots
    Predict(PredictArgs),
    /// Print the feature row the model would receive, without scoring it
    Row(RowArgs),
    /// Print the model's feature order and the explainer it is paired with
    Schema,
}

/// The four customer inputs.
#[derive(Debug, Clone, Args)]
pub struct CustomerArgs {
    /// Months the customer has been with the company
    #[arg(long, default_value_t = TENURE_DEFAULT, value_parser = clap::value_parser!(u32).range(TENURE_MIN as i64..=TENURE_MAX as i64))]
    pub tenure: u32,

    #[arg(long, value_enum, default_value_t = Contract::MonthToMonth)]
    pub contract: Contract,

    /// Monthly charges in dollars
    #[arg(long, default_value_t = MONTHLY_CHARGES_DEFAULT, value_parser = parse_monthly_charges)]
    pub monthly_charges: f64,

    #[arg(long, value_enum, default_value_t = PaymentMethod::ElectronicCheck)]
    pub payment_method: PaymentMethod,
}

impl CustomerArgs {
    pub fn to_record(&self) -> Result<CustomerRecord> {
        CustomerRecord::new(
            self.tenure,
            self.contract,
            self.monthly_charges,
            self.payment_method,
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub customer: CustomerArgs,

    /// Directory for the plots and the contributions CSV
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    #[arg(long, help = "Skip rendering the SHAP plots")]
    pub no_charts: bool,

    #[arg(long, help = "Skip writing the contributions CSV")]
    pub no_csv: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RowArgs {
    #[command(flatten)]
    pub customer: CustomerArgs,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

fn parse_monthly_charges(value: &str) -> std::result::Result<f64, String> {
    let charges: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !(MONTHLY_CHARGES_MIN..=MONTHLY_CHARGES_MAX).contains(&charges) {
        return Err(format!(
            "{} is not in {:.1}..={:.1}",
            value, MONTHLY_CHARGES_MIN, MONTHLY_CHARGES_MAX
        ));
    }
    Ok(charges)
}

impl CliConfig {
    pub fn overrides(&self) -> SettingsOverrides {
        let mut overrides = SettingsOverrides {
            model_path: self.model.clone(),
            explainer_path: self.explainer.clone(),
            log_format: self.log_format,
            monitor: self.monitor,
            ..Default::default()
        };

        match &self.command {
            Command::Predict(args) => {
                overrides.output_dir = args.output_dir.clone();
                overrides.format = args.format;
                overrides.no_charts = args.no_charts;
                overrides.no_csv = args.no_csv;
            }
            Command::Row(args) => overrides.format = args.format,
            Command::Schema => {}
        }

        overrides
    }
}
