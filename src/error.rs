//! Unified error hierarchy for HabitRS
//!
//! Every engine operation reports failures through [`HabitError`]. Normal
//! outcomes such as "no burnout events observed" are never errors.

use thiserror::Error;

/// Top-level error type for all HabitRS operations
#[derive(Debug, Error)]
pub enum HabitError {
    /// Malformed or out-of-range input parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Too few rows remain to fit a model reliably
    #[error("Insufficient data for {model}: need at least {required}, got {actual}")]
    DataInsufficient {
        model: String,
        required: usize,
        actual: usize,
    },

    /// Prediction requested before any successful training
    #[error("Models are not trained yet")]
    NotTrained,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON reading/writing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for HabitRS operations
pub type Result<T> = std::result::Result<T, HabitError>;

impl HabitError {
    /// Shorthand for a [`HabitError::DataInsufficient`] error
    pub fn insufficient(model: impl Into<String>, required: usize, actual: usize) -> Self {
        HabitError::DataInsufficient {
            model: model.into(),
            required,
            actual,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HabitError::Validation(_) => ErrorSeverity::Warning,
            HabitError::DataInsufficient { .. } => ErrorSeverity::Warning,
            HabitError::NotTrained => ErrorSeverity::Warning,
            HabitError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HabitError::DataInsufficient { model, required, .. } => format!(
                "Not enough history to train the {} model. Provide at least {} usable days.",
                model, required
            ),
            HabitError::NotTrained => {
                "No trained models yet. Run a training step (simulate or custom history) first."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
