//! The boundary between raw form fields and the calculation engine.

use crate::engine::calculate;
use crate::error::{ErrorCode, ErrorKind, Result, SplitterError};
use crate::schema::{
    default_fiscal_year_end_month, CalculationInput, CalculationResult, MonetaryAmount,
    PeriodGranularity,
};
use crate::settings::{AppSettings, ThousandsSeparator};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const GENERIC_FAILURE_MESSAGE: &str =
    "The calculation could not be completed. Please try again.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceForm {
    pub start_date: String,
    pub end_date: String,
    pub include_end_date: bool,
    /// One entry per amount row, exactly as typed.
    pub amounts: Vec<String>,
    #[serde(default)]
    pub granularity: PeriodGranularity,
    #[serde(default = "default_fiscal_year_end_month")]
    pub fiscal_year_end_month: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Success(CalculationResult),
    Failure { code: ErrorCode, message: String },
}

impl FormOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FormOutcome::Success(_))
    }
}

/// Actionable text for input errors.
pub fn user_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::NoAmounts => "Enter at least one amount.",
        ErrorCode::InvalidAmount => "Amounts must be numbers of zero or more.",
        ErrorCode::InvalidDate => "Enter dates in the format YYYY-MM-DD.",
        ErrorCode::EndBeforeStart => "The end date must not be before the start date.",
        ErrorCode::ZeroDuration => {
            "The date range has no days to split. Include the end date or pick a later end date."
        }
        ErrorCode::InvalidFiscalYearEnd => "Choose a fiscal year end month between 1 and 12.",
        ErrorCode::InvalidSettings => "The display settings are invalid.",
        ErrorCode::RoundingReconciliationFailed | ErrorCode::UnexpectedError => {
            GENERIC_FAILURE_MESSAGE
        }
    }
}

/// Drops grouping separators from a well-formed integer part such as `1.234.567`.
fn strip_grouping(integer: &str, separator: char) -> Option<String> {
    let groups: Vec<&str> = integer.split(separator).collect();
    let well_formed = groups.len() > 1
        && (1..=3).contains(&groups[0].trim_start_matches('-').len())
        && groups[1..].iter().all(|g| g.len() == 3);
    well_formed.then(|| groups.concat())
}

/// Reads a typed amount. Text grouped with the saved separator (`1.234,50` when the separator
/// is `.`) is read the way it is displayed. Otherwise a decimal comma is accepted when the
/// text has no period.
pub fn parse_amount(raw: &str, separator: ThousandsSeparator) -> Option<f64> {
    let trimmed = raw.trim();

    let (integer, fraction) = match trimmed.rsplit_once(separator.decimal_mark()) {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (trimmed, None),
    };
    if let Some(digits) = strip_grouping(integer, separator.as_char()) {
        let normalized = match fraction {
            Some(fraction) => format!("{}.{}", digits, fraction),
            None => digits,
        };
        if let Ok(value) = normalized.parse::<f64>() {
            return Some(value);
        }
    }

    let normalized = if !trimmed.contains('.') && trimmed.matches(',').count() == 1 {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<f64>().ok()
}

impl InvoiceForm {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        include_end_date: bool,
        amounts: Vec<String>,
    ) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            include_end_date,
            amounts,
            granularity: PeriodGranularity::default(),
            fiscal_year_end_month: default_fiscal_year_end_month(),
        }
    }

    /// Builds the engine input, reading amounts with the given thousands separator.
    pub fn to_input(&self, separator: ThousandsSeparator) -> Result<CalculationInput> {
        let mut amounts = Vec::new();

        for (idx, raw) in self.amounts.iter().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let value = parse_amount(raw, separator).ok_or_else(|| {
                SplitterError::input(
                    ErrorCode::InvalidAmount,
                    format!("Amount #{} ('{}') is not a number", idx + 1, raw),
                )
                .with_details(json!({ "index": idx, "value": raw }))
            })?;
            amounts.push(MonetaryAmount::new(value));
        }

        Ok(CalculationInput {
            start_date: self.start_date.trim().to_string(),
            end_date: self.end_date.trim().to_string(),
            include_end_date: self.include_end_date,
            amounts,
            granularity: self.granularity,
            fiscal_year_end_month: self.fiscal_year_end_month,
        })
    }

    pub fn submit(&self, settings: &AppSettings) -> FormOutcome {
        let outcome = self
            .to_input(settings.thousands_separator)
            .and_then(|input| calculate(&input, settings.rounding()));

        match outcome {
            Ok(result) => FormOutcome::Success(result),
            Err(e) => failure_from(&e),
        }
    }
}

fn failure_from(e: &SplitterError) -> FormOutcome {
    let code = e.code();
    match e.kind() {
        ErrorKind::Input => FormOutcome::Failure {
            code,
            message: user_message(code).to_string(),
        },
        ErrorKind::Calculation | ErrorKind::System => {
            error!("Invoice split failed [{}]: {:?}", code, e);
            FormOutcome::Failure {
                code,
                message: GENERIC_FAILURE_MESSAGE.to_string(),
            }
        }
    }
}
