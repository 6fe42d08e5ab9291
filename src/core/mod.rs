pub mod artifacts;
pub mod charts;
pub mod engine;
pub mod features;
pub mod model;
pub mod report;
pub mod shap;

pub use crate::domain::model::{CustomerRecord, Prediction};
pub use crate::domain::ports::{Attributor, Classifier};
pub use crate::utils::error::Result;
