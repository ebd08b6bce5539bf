use crate::rounding::RoundingPrecision;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub(crate) fn default_fiscal_year_end_month() -> u32 {
    12
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    #[default]
    #[schemars(description = "Calendar months")]
    Month,

    #[schemars(description = "Fiscal quarters (three-month blocks from the fiscal year start)")]
    Quarter,

    #[schemars(description = "Fiscal years (calendar years when the fiscal year ends in December)")]
    Year,
}

impl PeriodGranularity {
    pub fn months(&self) -> u32 {
        match self {
            PeriodGranularity::Month => 1,
            PeriodGranularity::Quarter => 3,
            PeriodGranularity::Year => 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonetaryAmount {
    #[schemars(description = "The invoice amount to split. Must be finite and not negative.")]
    pub value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional line label (e.g. 'Hosting', 'Support contract')")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional ISO 4217 currency code. Carried through untouched.")]
    pub currency: Option<String>,
}

impl MonetaryAmount {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            label: None,
            currency: None,
        }
    }

    pub fn labeled(value: f64, label: impl Into<String>) -> Self {
        Self {
            value,
            label: Some(label.into()),
            currency: None,
        }
    }
}

impl From<f64> for MonetaryAmount {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculationInput {
    #[schemars(description = "First day of the invoiced service range, YYYY-MM-DD")]
    pub start_date: String,

    #[schemars(description = "Last day of the invoiced service range, YYYY-MM-DD")]
    pub end_date: String,

    #[schemars(description = "Whether the end date itself is an allocable day")]
    pub include_end_date: bool,

    #[schemars(description = "Amounts to split, in display order. At least one is required.")]
    pub amounts: Vec<MonetaryAmount>,

    #[serde(default)]
    #[schemars(description = "Size of the allocation buckets. Defaults to month.")]
    pub granularity: PeriodGranularity,

    #[serde(default = "default_fiscal_year_end_month")]
    #[schemars(
        description = "The month the fiscal year ends in (1 = January, 12 = December). Drives quarter and year boundaries."
    )]
    pub fiscal_year_end_month: u32,
}

impl CalculationInput {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        include_end_date: bool,
        amounts: Vec<MonetaryAmount>,
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

    pub fn with_granularity(mut self, granularity: PeriodGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_fiscal_year_end_month(mut self, month: u32) -> Self {
        self.fiscal_year_end_month = month;
        self
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CalculationInput)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// The resolved denominator of a calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TotalDuration {
    pub days: i64,
    pub start: String,
    pub end: String,
    pub included: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationStepDetails {
    pub total_duration: TotalDuration,
    pub granularity: PeriodGranularity,
    pub rounding_precision: RoundingPrecision,
    pub fiscal_year_end_month: u32,
    /// Unrounded amount per day, one entry per input amount.
    pub daily_rates: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAllocation {
    pub label: String,
    /// First allocable day of the range inside this period.
    pub start: NaiveDate,
    /// Last allocable day of the range inside this period.
    pub end: NaiveDate,
    pub days: i64,
    /// `days / totalDuration.days`
    pub proportion: f64,
    /// Share of each input amount, index-aligned with `CalculationResult::amounts`.
    pub shares: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub periods: Vec<PeriodAllocation>,
    pub amounts: Vec<MonetaryAmount>,
    /// Sum of shares per amount across all periods.
    pub totals: Vec<f64>,
    pub step_details: CalculationStepDetails,
}

impl CalculationResult {
    pub fn total_days(&self) -> i64 {
        self.step_details.total_duration.days
    }

    /// Shares of one amount across every period, in period order.
    pub fn shares_for(&self, amount_index: usize) -> Vec<f64> {
        self.periods
            .iter()
            .filter_map(|p| p.shares.get(amount_index).copied())
            .collect()
    }

    pub fn period(&self, label: &str) -> Option<&PeriodAllocation> {
        self.periods.iter().find(|p| p.label == label)
    }
}
