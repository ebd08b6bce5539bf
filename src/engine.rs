use crate::balancer::{verify_conservation, RemainderBalancer};
use crate::error::{ErrorCode, Result, SplitterError};
use crate::periods::split_range;
use crate::rounding::RoundingSettings;
use crate::schema::*;
use crate::utils::{
    days_in_range, format_date, parse_date_string, prev_day, validate_fiscal_year_end_month,
};
use chrono::NaiveDate;
use log::{debug, info};
use serde_json::json;

/// Relative tolerance for the post-allocation conservation check.
pub const CONSERVATION_TOLERANCE: f64 = 1e-9;

/// A validated calculation range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Last allocable day; equals `end` when the end date is included.
    pub last_day: NaiveDate,
    pub total_days: i64,
    pub include_end_date: bool,
}

pub struct Apportioner {
    granularity: PeriodGranularity,
    fiscal_year_end_month: u32,
    settings: RoundingSettings,
}

impl Apportioner {
    pub fn new(
        granularity: PeriodGranularity,
        fiscal_year_end_month: u32,
        settings: RoundingSettings,
    ) -> Self {
        Self {
            granularity,
            fiscal_year_end_month,
            settings,
        }
    }

    pub fn apportion(
        &self,
        range: &ResolvedRange,
        amounts: &[MonetaryAmount],
    ) -> Result<CalculationResult> {
        let slices = split_range(
            range.start,
            range.last_day,
            self.granularity,
            self.fiscal_year_end_month,
        )?;

        debug!(
            "Resolved {} .. {} ({} days) into {} {:?} periods",
            range.start,
            range.last_day,
            range.total_days,
            slices.len(),
            self.granularity
        );

        let day_weights: Vec<i64> = slices.iter().map(|s| s.days).collect();
        let balancer = RemainderBalancer::new(self.settings.precision);

        // per_amount[i][p] = share of amount i in period p
        let mut per_amount = Vec::with_capacity(amounts.len());
        for amount in amounts {
            per_amount.push(balancer.distribute(amount.value, &day_weights, range.total_days)?);
        }

        let periods: Vec<PeriodAllocation> = slices
            .into_iter()
            .enumerate()
            .map(|(p, slice)| PeriodAllocation {
                label: slice.label,
                start: slice.start,
                end: slice.end,
                days: slice.days,
                proportion: slice.days as f64 / range.total_days as f64,
                shares: per_amount.iter().map(|shares| shares[p]).collect(),
            })
            .collect();

        // Reconciled against the shares by verify_conservation below
        let totals: Vec<f64> = amounts.iter().map(|a| a.value).collect();

        let daily_rates: Vec<f64> = amounts
            .iter()
            .map(|a| a.value / range.total_days as f64)
            .collect();

        let result = CalculationResult {
            periods,
            amounts: amounts.to_vec(),
            totals,
            step_details: CalculationStepDetails {
                total_duration: TotalDuration {
                    days: range.total_days,
                    start: format_date(range.start),
                    end: format_date(range.end),
                    included: range.include_end_date,
                },
                granularity: self.granularity,
                rounding_precision: self.settings.precision,
                fiscal_year_end_month: self.fiscal_year_end_month,
                daily_rates,
            },
        };

        verify_conservation(&result, CONSERVATION_TOLERANCE)?;

        Ok(result)
    }
}

/// Validates an input and resolves its day range. Checks run in a fixed order so the
/// first reported problem is stable.
pub fn resolve_input(input: &CalculationInput) -> Result<ResolvedRange> {
    if input.amounts.is_empty() {
        return Err(SplitterError::input(
            ErrorCode::NoAmounts,
            "At least one amount is required",
        ));
    }

    for (idx, amount) in input.amounts.iter().enumerate() {
        if !amount.value.is_finite() || amount.value < 0.0 {
            return Err(SplitterError::input(
                ErrorCode::InvalidAmount,
                format!(
                    "Amount #{} ({}) must be a finite, non-negative number",
                    idx + 1,
                    amount.value
                ),
            )
            .with_details(json!({ "index": idx })));
        }
    }

    let start = parse_date_string(&input.start_date)?;
    let end = parse_date_string(&input.end_date)?;
    validate_fiscal_year_end_month(input.fiscal_year_end_month)?;

    if end < start {
        return Err(SplitterError::input(
            ErrorCode::EndBeforeStart,
            format!("End date {} is before start date {}", end, start),
        )
        .with_details(json!({ "start": input.start_date, "end": input.end_date })));
    }

    let total_days = days_in_range(start, end, input.include_end_date);
    if total_days < 1 {
        return Err(SplitterError::input(
            ErrorCode::ZeroDuration,
            "The selected range contains no allocable days",
        ));
    }

    let last_day = if input.include_end_date {
        end
    } else {
        prev_day(end)?
    };

    Ok(ResolvedRange {
        start,
        end,
        last_day,
        total_days,
        include_end_date: input.include_end_date,
    })
}

pub fn calculate(input: &CalculationInput, settings: RoundingSettings) -> Result<CalculationResult> {
    let range = resolve_input(input)?;
    let apportioner = Apportioner::new(input.granularity, input.fiscal_year_end_month, settings);
    let result = apportioner.apportion(&range, &input.amounts)?;

    info!(
        "Allocated {} amount(s) over {} days into {} period(s) at precision {}",
        result.amounts.len(),
        result.total_days(),
        result.periods.len(),
        settings.precision
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingPrecision;

    fn cents() -> RoundingSettings {
        RoundingSettings::new(RoundingPrecision::Cent)
    }

    #[test]
    fn test_leap_year_single_yearly_period() {
        let input = CalculationInput::new("2024-01-01", "2024-12-31", true, vec![1200.0.into()])
            .with_granularity(PeriodGranularity::Year);

        let result = calculate(&input, cents()).unwrap();
        assert_eq!(result.total_days(), 366);
        assert_eq!(result.periods.len(), 1);
        assert_eq!(result.periods[0].shares, vec![1200.0]);
        assert_eq!(result.periods[0].label, "2024");
    }

    #[test]
    fn test_single_month_range() {
        let input = CalculationInput::new("2024-01-01", "2024-01-31", true, vec![100.0.into()]);

        let result = calculate(&input, cents()).unwrap();
        assert_eq!(result.periods.len(), 1);
        assert_eq!(result.periods[0].shares, vec![100.0]);
        assert_eq!(result.periods[0].days, 31);
    }

    #[test]
    fn test_exclusive_end_drops_last_day() {
        let input = CalculationInput::new("2024-01-01", "2024-02-01", false, vec![310.0.into()]);

        let result = calculate(&input, cents()).unwrap();
        assert_eq!(result.total_days(), 31);
        assert_eq!(result.periods.len(), 1);
        assert_eq!(result.periods[0].end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(result.step_details.total_duration.end, "2024-02-01");
        assert!(!result.step_details.total_duration.included);
    }

    #[test]
    fn test_multi_month_split() {
        let input = CalculationInput::new(
            "2024-01-15",
            "2024-03-10",
            true,
            vec![560.0.into(), MonetaryAmount::labeled(99.99, "Support")],
        );

        let result = calculate(&input, cents()).unwrap();
        assert_eq!(result.total_days(), 56);
        assert_eq!(result.periods.len(), 3);

        // 17 / 29 / 10 days of 56 at 10 per day
        assert_eq!(result.shares_for(0), vec![170.0, 290.0, 100.0]);
        assert_eq!(result.shares_for(1), vec![30.35, 51.78, 17.86]);

        assert_eq!(result.totals, vec![560.0, 99.99]);
        assert!((result.step_details.daily_rates[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_error_order_and_codes() {
        let empty = CalculationInput::new("bad", "2024-01-01", true, vec![]);
        assert_eq!(calculate(&empty, cents()).unwrap_err().code(), ErrorCode::NoAmounts);

        let negative = CalculationInput::new("2024-01-01", "2024-01-02", true, vec![(-1.0).into()]);
        let err = calculate(&negative, cents()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
        assert_eq!(err.details(), Some(&json!({ "index": 0 })));

        let nan = CalculationInput::new("2024-01-01", "2024-01-02", true, vec![f64::NAN.into()]);
        assert_eq!(calculate(&nan, cents()).unwrap_err().code(), ErrorCode::InvalidAmount);

        let bad_date = CalculationInput::new("2024-13-01", "2024-01-02", true, vec![1.0.into()]);
        assert_eq!(calculate(&bad_date, cents()).unwrap_err().code(), ErrorCode::InvalidDate);

        let reversed = CalculationInput::new("2024-02-01", "2024-01-01", true, vec![1.0.into()]);
        assert_eq!(calculate(&reversed, cents()).unwrap_err().code(), ErrorCode::EndBeforeStart);

        let same_day = CalculationInput::new("2024-02-01", "2024-02-01", false, vec![1.0.into()]);
        assert_eq!(calculate(&same_day, cents()).unwrap_err().code(), ErrorCode::ZeroDuration);

        let bad_fye = CalculationInput::new("2024-01-01", "2024-02-01", true, vec![1.0.into()])
            .with_fiscal_year_end_month(0);
        assert_eq!(
            calculate(&bad_fye, cents()).unwrap_err().code(),
            ErrorCode::InvalidFiscalYearEnd
        );
    }

    #[test]
    fn test_shares_serialize_as_rounded_decimals() {
        let input =
            CalculationInput::new("2024-01-01", "2024-03-31", true, vec![100.0.into(), 0.3.into()]);
        let result = calculate(&input, cents()).unwrap();

        let shares: Vec<&Vec<f64>> = result.periods.iter().map(|p| &p.shares).collect();
        assert_eq!(
            serde_json::to_value(&shares).unwrap(),
            json!([[34.07, 0.1], [31.86, 0.1], [34.07, 0.1]])
        );
        assert_eq!(serde_json::to_value(&result.totals).unwrap(), json!([100.0, 0.3]));

        for period in &result.periods {
            for share in &period.shares {
                assert_eq!(RoundingPrecision::Cent.round_to(*share), *share);
            }
        }
    }

    #[test]
    fn test_largest_amounts_are_split() {
        let input = CalculationInput::new("2024-01-01", "2024-12-31", true, vec![1e308.into()]);
        let result = calculate(&input, RoundingSettings::default()).unwrap();

        assert_eq!(result.periods.len(), 12);
        assert!(result.shares_for(0).iter().all(|s| s.is_finite() && *s > 0.0));
        assert_eq!(result.totals, vec![1e308]);
    }

    #[test]
    fn test_zero_amount_allowed() {
        let input = CalculationInput::new("2024-01-20", "2024-02-10", true, vec![0.0.into()]);
        let result = calculate(&input, cents()).unwrap();
        assert!(result.periods.iter().all(|p| p.shares[0] == 0.0));
    }

    #[test]
    fn test_proportions_sum_to_one() {
        let input = CalculationInput::new("2023-11-11", "2024-04-04", true, vec![1.0.into()])
            .with_granularity(PeriodGranularity::Quarter);
        let result = calculate(&input, cents()).unwrap();
        let total: f64 = result.periods.iter().map(|p| p.proportion).sum();
        assert!((total - 1.0).abs() < 1e-12);
        let labels: Vec<&str> = result.periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2023-Q4", "2024-Q1", "2024-Q2"]);
    }
}
