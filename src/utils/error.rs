use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: String },

    #[error("Artifact '{path}' is malformed: {message}")]
    ArtifactFormatError { path: String, message: String },

    #[error("Model and explainer are incompatible: {message}")]
    IncompatibleArtifacts { message: String },

    #[error("Invalid feature schema: {message}")]
    InvalidSchema { message: String },

    #[error("Feature row has {actual} columns but the model expects {expected}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid configuration value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Chart rendering failed: {message}")]
    RenderError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Artifact,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScorerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScorerError::InvalidInput { .. } => ErrorCategory::Input,
            ScorerError::ConfigValidationError { .. }
            | ScorerError::InvalidConfigValueError { .. }
            | ScorerError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ScorerError::ArtifactNotFound { .. }
            | ScorerError::ArtifactFormatError { .. }
            | ScorerError::IncompatibleArtifacts { .. }
            | ScorerError::InvalidSchema { .. } => ErrorCategory::Artifact,
            ScorerError::SchemaMismatch { .. }
            | ScorerError::SerializationError(_)
            | ScorerError::CsvError(_)
            | ScorerError::RenderError { .. } => ErrorCategory::Processing,
            ScorerError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Artifact | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Process exit code the binary reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ScorerError::ArtifactNotFound { .. } => {
                "Check --model/--explainer or [artifacts] in the config file point at existing files"
            }
            ScorerError::ArtifactFormatError { .. }
            | ScorerError::InvalidSchema { .. }
            | ScorerError::SerializationError(_) => {
                "Re-export the artifact; it must be a format_version 1 JSON document"
            }
            ScorerError::IncompatibleArtifacts { .. } => {
                "Export the model and the explainer together from the same training run"
            }
            ScorerError::SchemaMismatch { .. } => {
                "Update the feature builder's column list to match the retrained model"
            }
            ScorerError::InvalidInput { .. } => "Run with --help to see the accepted ranges and options",
            ScorerError::ConfigValidationError { .. }
            | ScorerError::InvalidConfigValueError { .. }
            | ScorerError::MissingConfigError { .. } => "Fix the configuration file and try again",
            ScorerError::RenderError { .. } => "Check that the output directory is writable",
            ScorerError::CsvError(_) | ScorerError::IoError(_) => {
                "Check file permissions and available disk space"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Invalid customer details: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Artifact => format!("Could not load the scoring artifacts: {}", self),
            ErrorCategory::Processing => format!("Scoring failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScorerError>;
