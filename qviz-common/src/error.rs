//! Common error types for the QVIZ service
//!
//! Every failure in the visualization pipeline is terminal for its request
//! and maps onto one machine-readable code. The HTTP layer turns these into
//! the structured error envelope; nothing here knows about status codes.

use thiserror::Error;

/// Common result type for QVIZ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors of the visualization pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Upload extension is neither CSV-like nor a known spreadsheet type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Parsed dataset exceeds the configured row/column limits
    #[error("Dataset too large: rows={rows}, cols={columns}, limits rows<={max_rows}, cols<={max_columns}")]
    DatasetTooLarge {
        rows: usize,
        columns: usize,
        max_rows: usize,
        max_columns: usize,
    },

    /// One of the datasets lacks mandatory columns (or survey-shaped data
    /// was required but unavailable; `details` then carries remediation
    /// hints rather than column names)
    #[error("Missing required {role} columns")]
    MissingColumns { role: String, details: Vec<String> },

    /// Likert responses outside the 1-5 scale
    #[error("Likert responses must be between 1 and 5")]
    ValueRange(Vec<String>),

    /// Chart key not present in the strategy registry
    #[error("Unsupported chart key: {0}")]
    UnknownChartKey(String),

    /// Malformed request envelope (bad JSON, missing upload) or a strategy
    /// failure already translated at the service boundary
    #[error("{message}")]
    Payload {
        message: String,
        details: Vec<String>,
    },

    /// Value-level failure raised inside a strategy: insufficient data,
    /// unknown field reference, degenerate statistic. Translated into
    /// `Payload` by the orchestrator so the original message survives in
    /// the envelope's details.
    #[error("{0}")]
    Chart(String),

    /// Unanticipated failure outside the declared taxonomy
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a payload error without detail lines
    pub fn payload(message: impl Into<String>) -> Self {
        Error::Payload {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Machine-readable error code used in the API error envelope
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedFileType(_) => "invalid_file_type",
            Error::DatasetTooLarge { .. } => "dataset_too_large",
            Error::MissingColumns { .. } => "missing_required_columns",
            Error::ValueRange(_) => "invalid_value_range",
            Error::UnknownChartKey(_) => "invalid_chart_key",
            Error::Payload { .. } | Error::Chart(_) => "payload_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Detail lines for the API error envelope
    pub fn details(&self) -> Vec<String> {
        match self {
            Error::MissingColumns { details, .. } => details.clone(),
            Error::ValueRange(issues) => issues.clone(),
            Error::Payload { details, .. } => details.clone(),
            Error::DatasetTooLarge { .. } => vec![self.to_string()],
            Error::UnsupportedFileType(ext) => vec![ext.clone()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(Error::UnknownChartKey("x".into()).code(), "invalid_chart_key");
        assert_eq!(
            Error::MissingColumns {
                role: "HR".into(),
                details: vec!["Age".into()],
            }
            .code(),
            "missing_required_columns"
        );
        assert_eq!(Error::ValueRange(vec![]).code(), "invalid_value_range");
        assert_eq!(Error::Chart("bad field".into()).code(), "payload_error");
        assert_eq!(Error::payload("bad json").code(), "payload_error");
    }

    #[test]
    fn missing_columns_details_are_preserved() {
        let err = Error::MissingColumns {
            role: "HR".into(),
            details: vec!["Age".into(), "Sexe".into()],
        };
        assert_eq!(err.details(), vec!["Age".to_string(), "Sexe".to_string()]);
    }
}
