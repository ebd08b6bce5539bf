//! # Invoice Period Splitter
//!
//! A library for splitting invoice amounts across the months, quarters or years their
//! service range covers, in proportion to the days each period contributes.
//!
//! ## Core Concepts
//!
//! - **Total Duration**: Days from start to end date, counting the end date only when asked to
//! - **Periods**: Calendar months, or fiscal quarters/years anchored on a fiscal year end month
//! - **Proportional Allocation**: Each amount is weighted by `period days / total days`
//! - **Remainder Distribution**: Shares are rounded to a fixed increment and the last period
//!   absorbs the leftover, so shares always add back up to the original amount
//! - **Display Settings**: Decimal places and separators are persisted separately and only
//!   applied when formatting
//!
//! ## Example
//!
//! ```rust
//! use invoice_period_splitter::*;
//!
//! let input = CalculationInput::new("2024-01-01", "2024-12-31", true, vec![1200.0.into()])
//!     .with_granularity(PeriodGranularity::Quarter);
//!
//! let result = calculate(&input, RoundingSettings::new(RoundingPrecision::Cent)).unwrap();
//!
//! assert_eq!(result.total_days(), 366);
//! assert_eq!(result.periods.len(), 4);
//!
//! let table = format_result(&result, &AppSettings::default());
//! assert_eq!(table.totals.shares, vec!["1,200.00".to_string()]);
//! ```

pub mod balancer;
pub mod engine;
pub mod error;
pub mod form;
pub mod format;
pub mod periods;
pub mod rounding;
pub mod schema;
pub mod settings;
pub mod utils;

pub use balancer::{verify_conservation, RemainderBalancer};
pub use engine::{calculate, resolve_input, Apportioner, ResolvedRange};
pub use error::{ErrorCode, ErrorKind, Result, SplitterError};
pub use form::{FormOutcome, InvoiceForm};
pub use format::{format_amount, format_result, FormatConfig, FormattedResult, FormattedRow};
pub use periods::{period_bounds, split_range, PeriodSlice};
pub use rounding::{RoundingPrecision, RoundingSettings};
pub use schema::*;
pub use settings::{
    AppSettings, FileBackend, MemoryBackend, SettingsBackend, SettingsStore, SettingsUpdate,
    ThousandsSeparator,
};

use log::debug;

pub struct InvoiceSplitter;

impl InvoiceSplitter {
    pub fn calculate(
        input: &CalculationInput,
        settings: RoundingSettings,
    ) -> Result<CalculationResult> {
        debug!(
            "Splitting {} amount(s) from {} to {} ({:?}, end included: {})",
            input.amounts.len(),
            input.start_date,
            input.end_date,
            input.granularity,
            input.include_end_date
        );

        engine::calculate(input, settings)
    }

    /// Calculates and re-checks conservation with a caller-supplied tolerance.
    pub fn calculate_with_verification(
        input: &CalculationInput,
        settings: RoundingSettings,
        tolerance: f64,
    ) -> Result<CalculationResult> {
        let result = Self::calculate(input, settings)?;

        verify_conservation(&result, tolerance)?;

        Ok(result)
    }

    /// Runs a calculation with the precision from a settings store.
    pub fn calculate_with_store<B: SettingsBackend>(
        input: &CalculationInput,
        store: &SettingsStore<B>,
    ) -> Result<CalculationResult> {
        Self::calculate(input, store.rounding())
    }
}
