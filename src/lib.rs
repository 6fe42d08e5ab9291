pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{Settings, SettingsOverrides};

pub use core::{artifacts::AppContext, engine::ScoringEngine};
pub use domain::model::{Contract, CustomerRecord, PaymentMethod, Prediction};
pub use utils::error::{Result, ScorerError};
