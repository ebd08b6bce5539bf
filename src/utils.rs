use crate::error::{ErrorCode, Result, SplitterError};
use chrono::{Datelike, Days, Months, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date string.
pub fn parse_date_string(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        SplitterError::input(
            ErrorCode::InvalidDate,
            format!("Invalid date '{}'. Expected YYYY-MM-DD", value),
        )
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| SplitterError::system(format!("No last day for {}-{:02}", year, month)))
}

pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| SplitterError::system(format!("Date overflow adding {} months to {}", months, date)))
}

pub fn sub_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| SplitterError::system(format!("Date overflow subtracting {} months from {}", months, date)))
}

pub fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| SplitterError::system(format!("No day after {}", date)))
}

pub fn prev_day(date: NaiveDate) -> Result<NaiveDate> {
    date.pred_opt()
        .ok_or_else(|| SplitterError::system(format!("No day before {}", date)))
}

/// Number of allocable days between two dates. `end` counts only when `include_end` is set.
pub fn days_in_range(start: NaiveDate, end: NaiveDate, include_end: bool) -> i64 {
    let span = (end - start).num_days();
    if include_end {
        span + 1
    } else {
        span
    }
}

pub fn validate_fiscal_year_end_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(SplitterError::input(
            ErrorCode::InvalidFiscalYearEnd,
            format!("Invalid fiscal year end month {}: must be between 1 and 12", month),
        ));
    }
    Ok(())
}

/// Get the fiscal year end date for a given date
/// Returns the fiscal year end date that this date belongs to
pub fn get_fiscal_year_end_for_date(date: NaiveDate, fiscal_month: u32) -> Result<NaiveDate> {
    if date.month() <= fiscal_month {
        last_day_of_month(date.year(), fiscal_month)
    } else {
        last_day_of_month(date.year() + 1, fiscal_month)
    }
}

/// Returns the 0-based index of the month within the fiscal year.
///
/// # Examples
/// - If FY ends in Dec (12): Jan=0, Feb=1, ..., Dec=11
/// - If FY ends in June (6): July=0, Aug=1, ..., June=11
pub fn get_fiscal_month_index(calendar_month: u32, fiscal_year_end_month: u32) -> u32 {
    let fy_start_month = if fiscal_year_end_month == 12 {
        1
    } else {
        fiscal_year_end_month + 1
    };

    if calendar_month >= fy_start_month {
        calendar_month - fy_start_month
    } else {
        calendar_month + 12 - fy_start_month
    }
}
