//! Enumeration of the month, quarter and year buckets a date range touches.

use crate::error::Result;
use crate::schema::PeriodGranularity;
use crate::utils::{
    add_months, first_day_of_month, get_fiscal_month_index, get_fiscal_year_end_for_date,
    next_day, prev_day, sub_months,
};
use chrono::{Datelike, NaiveDate};

/// One bucket clipped to the allocable range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSlice {
    pub label: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

/// Full bounds of the period containing `date`.
pub fn period_bounds(
    date: NaiveDate,
    granularity: PeriodGranularity,
    fiscal_year_end_month: u32,
) -> Result<(NaiveDate, NaiveDate)> {
    let span = granularity.months();
    let month_start = first_day_of_month(date);

    // Months are always calendar months; quarters and years are counted from the fiscal year start
    let offset = get_fiscal_month_index(date.month(), fiscal_year_end_month) % span;

    let start = sub_months(month_start, offset)?;
    let end = prev_day(add_months(start, span)?)?;
    Ok((start, end))
}

pub fn period_label(
    period_start: NaiveDate,
    granularity: PeriodGranularity,
    fiscal_year_end_month: u32,
) -> Result<String> {
    let fiscal_year = |date: NaiveDate| -> Result<String> {
        let year = get_fiscal_year_end_for_date(date, fiscal_year_end_month)?.year();
        Ok(if fiscal_year_end_month == 12 {
            format!("{}", year)
        } else {
            format!("FY{}", year)
        })
    };

    match granularity {
        PeriodGranularity::Month => Ok(period_start.format("%Y-%m").to_string()),
        PeriodGranularity::Quarter => {
            let quarter = get_fiscal_month_index(period_start.month(), fiscal_year_end_month) / 3 + 1;
            Ok(format!("{}-Q{}", fiscal_year(period_start)?, quarter))
        }
        PeriodGranularity::Year => fiscal_year(period_start),
    }
}

/// Splits `[start, last_day]` (both inclusive) into clipped period slices.
pub fn split_range(
    start: NaiveDate,
    last_day: NaiveDate,
    granularity: PeriodGranularity,
    fiscal_year_end_month: u32,
) -> Result<Vec<PeriodSlice>> {
    let mut slices = Vec::new();
    let mut cursor = start;

    while cursor <= last_day {
        let (period_start, period_end) = period_bounds(cursor, granularity, fiscal_year_end_month)?;
        let slice_end = period_end.min(last_day);

        slices.push(PeriodSlice {
            label: period_label(period_start, granularity, fiscal_year_end_month)?,
            period_start,
            period_end,
            start: cursor,
            end: slice_end,
            days: (slice_end - cursor).num_days() + 1,
        });

        cursor = next_day(period_end)?;
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let (s, e) = period_bounds(d(2024, 2, 14), PeriodGranularity::Month, 12).unwrap();
        assert_eq!((s, e), (d(2024, 2, 1), d(2024, 2, 29)));

        // Fiscal year end has no effect on months
        let (s, e) = period_bounds(d(2023, 2, 14), PeriodGranularity::Month, 6).unwrap();
        assert_eq!((s, e), (d(2023, 2, 1), d(2023, 2, 28)));
    }

    #[test]
    fn test_quarter_bounds() {
        let (s, e) = period_bounds(d(2024, 5, 20), PeriodGranularity::Quarter, 12).unwrap();
        assert_eq!((s, e), (d(2024, 4, 1), d(2024, 6, 30)));

        // Fiscal year ending in September: Q1 = Oct..Dec
        let (s, e) = period_bounds(d(2024, 11, 3), PeriodGranularity::Quarter, 9).unwrap();
        assert_eq!((s, e), (d(2024, 10, 1), d(2024, 12, 31)));

        // Fiscal year ending in February: quarters start Mar/Jun/Sep/Dec
        let (s, e) = period_bounds(d(2024, 1, 15), PeriodGranularity::Quarter, 2).unwrap();
        assert_eq!((s, e), (d(2023, 12, 1), d(2024, 2, 29)));
    }

    #[test]
    fn test_year_bounds() {
        let (s, e) = period_bounds(d(2024, 8, 8), PeriodGranularity::Year, 12).unwrap();
        assert_eq!((s, e), (d(2024, 1, 1), d(2024, 12, 31)));

        let (s, e) = period_bounds(d(2024, 8, 8), PeriodGranularity::Year, 6).unwrap();
        assert_eq!((s, e), (d(2024, 7, 1), d(2025, 6, 30)));

        let (s, e) = period_bounds(d(2024, 6, 30), PeriodGranularity::Year, 6).unwrap();
        assert_eq!((s, e), (d(2023, 7, 1), d(2024, 6, 30)));
    }

    #[test]
    fn test_labels() {
        assert_eq!(period_label(d(2024, 3, 1), PeriodGranularity::Month, 12).unwrap(), "2024-03");
        assert_eq!(period_label(d(2024, 4, 1), PeriodGranularity::Quarter, 12).unwrap(), "2024-Q2");
        assert_eq!(period_label(d(2024, 10, 1), PeriodGranularity::Quarter, 9).unwrap(), "FY2025-Q1");
        assert_eq!(period_label(d(2024, 1, 1), PeriodGranularity::Year, 12).unwrap(), "2024");
        assert_eq!(period_label(d(2024, 7, 1), PeriodGranularity::Year, 6).unwrap(), "FY2025");
    }

    #[test]
    fn test_split_range_clips_edges() {
        let slices = split_range(d(2024, 1, 15), d(2024, 3, 10), PeriodGranularity::Month, 12).unwrap();
        let days: Vec<i64> = slices.iter().map(|s| s.days).collect();
        assert_eq!(days, vec![17, 29, 10]);
        assert_eq!(slices[0].start, d(2024, 1, 15));
        assert_eq!(slices[0].period_start, d(2024, 1, 1));
        assert_eq!(slices[2].end, d(2024, 3, 10));
        assert_eq!(slices[2].period_end, d(2024, 3, 31));
    }

    #[test]
    fn test_split_range_single_day_and_single_period() {
        let slices = split_range(d(2024, 5, 5), d(2024, 5, 5), PeriodGranularity::Year, 12).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].days, 1);

        let slices = split_range(d(2024, 1, 1), d(2024, 12, 31), PeriodGranularity::Year, 12).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].days, 366);
        assert_eq!(slices[0].label, "2024");
    }

    #[test]
    fn test_split_range_across_fiscal_years() {
        let slices = split_range(d(2024, 1, 1), d(2024, 12, 31), PeriodGranularity::Year, 6).unwrap();
        let labels: Vec<&str> = slices.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["FY2024", "FY2025"]);
        assert_eq!(slices[0].days, 182);
        assert_eq!(slices[1].days, 184);
    }
}
