//! Unified error hierarchy for WeightRS
//!
//! Validation failures, missing records and import problems each get their own
//! enum; [`TrackerError`] ties them together and carries severity information
//! used by the logging layer.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all WeightRS operations
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Record or settings validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Edit or delete targeted a date with no record
    #[error("No record exists for {date}")]
    NotFound { date: NaiveDate },

    /// Insert targeted an occupied date without an overwrite
    #[error("A record already exists for {date}")]
    Duplicate { date: NaiveDate },

    /// Import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of persisted state failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Validation errors for records and settings
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Weight outside the accepted kg range
    #[error("Weight {value}kg is outside {min}-{max}kg")]
    WeightOutOfRange {
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// Body fat outside the accepted percentage range
    #[error("Body fat {value}% is outside {min}-{max}%")]
    FatOutOfRange {
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// Date missing or not a real calendar date
    #[error("Invalid date: {input}")]
    InvalidDate { input: String },

    /// Required field absent
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Setting value outside its accepted range
    #[error("Invalid setting {field}={value}")]
    InvalidSetting { field: String, value: String },
}

/// Import errors that abort a whole file
///
/// Bad rows inside an otherwise readable file are skipped and counted instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// File could not be read
    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// JSON document is malformed
    #[error("Malformed JSON: {0}")]
    Json(String),

    /// CSV stream is malformed
    #[error("Malformed CSV: {0}")]
    Csv(String),

    /// JSON backup has no records array
    #[error("Backup contains no records array")]
    MissingRecords,

    /// File extension not recognised
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },
}

/// Result type alias for WeightRS operations
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization(err.to_string())
    }
}

impl TrackerError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::Validation(_) => ErrorSeverity::Warning,
            TrackerError::NotFound { .. } => ErrorSeverity::Warning,
            TrackerError::Duplicate { .. } => ErrorSeverity::Info,
            TrackerError::Import(_) => ErrorSeverity::Warning,
            TrackerError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::Validation(ValidationError::WeightOutOfRange { min, max, .. }) => {
                format!("Please enter a weight between {}kg and {}kg.", min, max)
            }
            TrackerError::Validation(ValidationError::FatOutOfRange { min, max, .. }) => {
                format!("Please enter a body fat between {}% and {}%.", min, max)
            }
            TrackerError::NotFound { date } => {
                format!("There is no entry for {}.", date)
            }
            TrackerError::Duplicate { date } => {
                format!(
                    "An entry for {} already exists. Use --overwrite to replace it.",
                    date
                )
            }
            TrackerError::Import(ImportError::MissingRecords) => {
                "The backup file does not contain any records.".to_string()
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
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Prefix shown in front of a message on the command line
    pub fn label(&self) -> &'static str {
        match self {
            ErrorSeverity::Critical => "Internal error:",
            ErrorSeverity::Error => "Error:",
            ErrorSeverity::Warning => "Warning:",
            ErrorSeverity::Info => "Note:",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_severity() {
        let err = TrackerError::NotFound {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = TrackerError::Internal("test".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().label(), "Internal error:");
    }

    #[test]
    fn test_error_retryable() {
        let err = TrackerError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(err.is_retryable());

        let err = TrackerError::Configuration("bad".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = TrackerError::from(ValidationError::WeightOutOfRange {
            value: dec!(310),
            min: dec!(30),
            max: dec!(300),
        });
        assert!(err.user_message().contains("between 30kg and 300kg"));

        let err = TrackerError::Duplicate {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert!(err.user_message().contains("2024-03-01"));
    }
}
