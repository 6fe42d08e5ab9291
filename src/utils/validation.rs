use crate::utils::error::{Result, ScorerError};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ScorerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ScorerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u32, min_value: u32) -> Result<()> {
    if value < min_value {
        return Err(ScorerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    match std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(extension) if allowed_set.contains(extension) => Ok(()),
        Some(extension) => Err(ScorerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(ScorerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

fn in_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    // NaN fails both comparisons and is rejected
    value >= min && value <= max
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if !in_range(value, min, max) {
        return Err(ScorerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Same check as [`validate_range`], reported as a customer input error.
pub fn validate_input_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if !in_range(value, min, max) {
        return Err(ScorerError::InvalidInput {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("artifacts.model_path", "churn_model.json").is_ok());
        assert!(validate_path("artifacts.model_path", "").is_err());
        assert!(validate_path("artifacts.model_path", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("output.chart_width", 800, 200).is_ok());
        assert!(validate_positive_number("output.chart_width", 10, 200).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("output.summary_chart", "summary.svg", &["svg"]).is_ok());
        assert!(validate_file_extension("output.summary_chart", "summary.png", &["svg"]).is_err());
        assert!(validate_file_extension("output.summary_chart", "summary", &["svg"]).is_err());
    }

    #[test]
    fn test_validate_input_range_rejects_nan() {
        assert!(validate_input_range("monthly_charges", 70.0, 0.0, 200.0).is_ok());
        assert!(validate_input_range("monthly_charges", 200.0, 0.0, 200.0).is_ok());
        assert!(validate_input_range("monthly_charges", 200.5, 0.0, 200.0).is_err());
        assert!(validate_input_range("monthly_charges", f64::NAN, 0.0, 200.0).is_err());
    }

    #[test]
    fn test_validate_range_reports_config_error() {
        let err = validate_range("output.chart_height", 5000u32, 200, 4000).unwrap_err();
        assert!(matches!(err, ScorerError::InvalidConfigValueError { .. }));
    }
}
