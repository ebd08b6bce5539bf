use crate::schema::CalculationResult;
use crate::settings::{AppSettings, ThousandsSeparator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConfig {
    pub decimal_places: u8,
    pub thousands_separator: ThousandsSeparator,
}

impl From<&AppSettings> for FormatConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            decimal_places: settings.decimal_places,
            thousands_separator: settings.thousands_separator,
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig::from(&AppSettings::default())
    }
}

pub fn format_amount(value: f64, config: &FormatConfig) -> String {
    let places = config.decimal_places as usize;
    let fixed = format!("{:.*}", places, value.abs());

    let (integer, fraction) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let separator = config.thousands_separator.as_char();
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }

    // "-0.00" reads as noise
    let is_zero = integer.chars().all(|c| c == '0')
        && fraction.map_or(true, |f| f.chars().all(|c| c == '0'));
    let mut out = String::new();
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(fraction) = fraction {
        out.push(config.thousands_separator.decimal_mark());
        out.push_str(fraction);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRow {
    pub label: String,
    pub start: String,
    pub end: String,
    pub days: i64,
    pub shares: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedResult {
    /// Column headings for the share columns, one per input amount.
    pub headings: Vec<String>,
    pub rows: Vec<FormattedRow>,
    pub totals: FormattedRow,
}

pub fn format_result(result: &CalculationResult, settings: &AppSettings) -> FormattedResult {
    let config = FormatConfig::from(settings);
    let duration = &result.step_details.total_duration;

    let headings = result
        .amounts
        .iter()
        .enumerate()
        .map(|(idx, amount)| match &amount.label {
            Some(label) => label.clone(),
            None => format!("Amount {}", idx + 1),
        })
        .collect();

    let rows = result
        .periods
        .iter()
        .map(|p| FormattedRow {
            label: p.label.clone(),
            start: p.start.format("%Y-%m-%d").to_string(),
            end: p.end.format("%Y-%m-%d").to_string(),
            days: p.days,
            shares: p.shares.iter().map(|s| format_amount(*s, &config)).collect(),
        })
        .collect();

    let totals = FormattedRow {
        label: "Total".to_string(),
        start: duration.start.clone(),
        end: duration.end.clone(),
        days: duration.days,
        shares: result
            .totals
            .iter()
            .map(|t| format_amount(*t, &config))
            .collect(),
    };

    FormattedResult {
        headings,
        rows,
        totals,
    }
}
