use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifiers for every failure the splitter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoAmounts,
    InvalidAmount,
    InvalidDate,
    EndBeforeStart,
    ZeroDuration,
    InvalidFiscalYearEnd,
    InvalidSettings,
    RoundingReconciliationFailed,
    UnexpectedError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoAmounts => "NO_AMOUNTS",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InvalidDate => "INVALID_DATE",
            ErrorCode::EndBeforeStart => "END_BEFORE_START",
            ErrorCode::ZeroDuration => "ZERO_DURATION",
            ErrorCode::InvalidFiscalYearEnd => "INVALID_FISCAL_YEAR_END",
            ErrorCode::InvalidSettings => "INVALID_SETTINGS",
            ErrorCode::RoundingReconciliationFailed => "ROUNDING_RECONCILIATION_FAILED",
            ErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category used by callers to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Bad or missing user input; recoverable by the user.
    Input,
    /// The computation itself failed to reconcile.
    Calculation,
    /// Anything unclassified.
    System,
}

#[derive(Error, Debug)]
pub enum SplitterError {
    #[error("{message}")]
    InputValidation {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Calculation failed: {message}")]
    CalculationProcessing { code: ErrorCode, message: String },

    #[error("Unexpected error: {message}")]
    System { code: ErrorCode, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SplitterError {
    pub fn input(code: ErrorCode, message: impl Into<String>) -> Self {
        SplitterError::InputValidation {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn calculation(message: impl Into<String>) -> Self {
        SplitterError::CalculationProcessing {
            code: ErrorCode::RoundingReconciliationFailed,
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        SplitterError::System {
            code: ErrorCode::UnexpectedError,
            message: message.into(),
        }
    }

    /// Attaches a structured payload to an input error. Other variants are returned unchanged.
    pub fn with_details(self, payload: serde_json::Value) -> Self {
        match self {
            SplitterError::InputValidation { code, message, .. } => {
                SplitterError::InputValidation {
                    code,
                    message,
                    details: Some(payload),
                }
            }
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitterError::InputValidation { .. } => ErrorKind::Input,
            SplitterError::CalculationProcessing { .. } => ErrorKind::Calculation,
            SplitterError::System { .. }
            | SplitterError::SerializationError(_)
            | SplitterError::IoError(_) => ErrorKind::System,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SplitterError::InputValidation { code, .. }
            | SplitterError::CalculationProcessing { code, .. }
            | SplitterError::System { code, .. } => *code,
            SplitterError::SerializationError(_) | SplitterError::IoError(_) => {
                ErrorCode::UnexpectedError
            }
        }
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            SplitterError::InputValidation { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SplitterError>;
