use crate::error::{ErrorCode, SplitterError};
use serde::{Deserialize, Serialize};

/// Snaps float noise such as `100.49999999999999` before half-rounding.
const SNAP_FACTOR: f64 = 1e9;

/// Scaled values at or above 2^52 are already whole numbers.
const SNAP_LIMIT: f64 = 4_503_599_627_370_496.0;

/// Step counts below 2^53 convert between `i64` and `f64` exactly.
const MAX_EXACT_STEPS: f64 = 9_007_199_254_740_992.0;

/// The increments a result may be rounded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "f64", into = "f64")]
pub enum RoundingPrecision {
    #[default]
    Cent,
    FiveCents,
    TenCents,
    Quarter,
    Half,
    One,
    Five,
    Ten,
}

impl RoundingPrecision {
    pub const ALL: [RoundingPrecision; 8] = [
        RoundingPrecision::Cent,
        RoundingPrecision::FiveCents,
        RoundingPrecision::TenCents,
        RoundingPrecision::Quarter,
        RoundingPrecision::Half,
        RoundingPrecision::One,
        RoundingPrecision::Five,
        RoundingPrecision::Ten,
    ];

    /// The increment as `numerator / denominator`.
    fn ratio(&self) -> (f64, f64) {
        match self {
            RoundingPrecision::Cent => (1.0, 100.0),
            RoundingPrecision::FiveCents => (5.0, 100.0),
            RoundingPrecision::TenCents => (1.0, 10.0),
            RoundingPrecision::Quarter => (25.0, 100.0),
            RoundingPrecision::Half => (5.0, 10.0),
            RoundingPrecision::One => (1.0, 1.0),
            RoundingPrecision::Five => (5.0, 1.0),
            RoundingPrecision::Ten => (10.0, 1.0),
        }
    }

    pub fn value(&self) -> f64 {
        let (num, den) = self.ratio();
        num / den
    }

    /// `value` measured in increments, with float noise snapped away.
    fn scaled(&self, value: f64) -> f64 {
        let (num, den) = self.ratio();
        let scaled = value * den / num;
        if scaled.abs() < SNAP_LIMIT {
            (scaled * SNAP_FACTOR).round() / SNAP_FACTOR
        } else {
            scaled
        }
    }

    fn rescale(&self, steps: f64, value: f64) -> f64 {
        let (num, den) = self.ratio();
        let rounded = steps * num / den;
        if rounded.is_finite() {
            rounded
        } else {
            // Too large to measure in increments
            value
        }
    }

    /// Rounds to the nearest increment, halves away from zero.
    pub fn round_to(&self, value: f64) -> f64 {
        self.rescale(self.scaled(value).round(), value)
    }

    /// Rounds down to the increment below.
    pub fn floor_to(&self, value: f64) -> f64 {
        self.rescale(self.scaled(value).floor(), value)
    }

    /// The whole number of increments nearest to `value`, or `None` when that count is too
    /// large to hold exactly.
    pub fn nearest_steps(&self, value: f64) -> Option<i64> {
        Self::exact_steps(self.scaled(value).round())
    }

    /// The whole number of increments at or below `value`.
    pub fn floor_steps(&self, value: f64) -> Option<i64> {
        Self::exact_steps(self.scaled(value).floor())
    }

    fn exact_steps(steps: f64) -> Option<i64> {
        (steps.is_finite() && steps.abs() < MAX_EXACT_STEPS).then_some(steps as i64)
    }

    /// The value of `steps` increments, as the closest `f64` to the decimal amount.
    pub fn from_steps(&self, steps: i64) -> f64 {
        let (num, den) = self.ratio();
        steps as f64 * num / den
    }

    /// Whether `value` lies on the increment grid, within `tolerance` increments.
    pub fn is_multiple(&self, value: f64, tolerance: f64) -> bool {
        let (num, den) = self.ratio();
        let scaled = value * den / num;
        (scaled - scaled.round()).abs() <= tolerance
    }

    pub fn from_value(value: f64) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| (p.value() - value).abs() < 1e-9)
    }
}

impl TryFrom<f64> for RoundingPrecision {
    type Error = SplitterError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| {
            SplitterError::input(
                ErrorCode::InvalidSettings,
                format!(
                    "Unsupported rounding precision {}: expected one of 0.01, 0.05, 0.1, 0.25, 0.5, 1, 5, 10",
                    value
                ),
            )
        })
    }
}

impl From<RoundingPrecision> for f64 {
    fn from(precision: RoundingPrecision) -> Self {
        precision.value()
    }
}

impl std::fmt::Display for RoundingPrecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Rounding parameters handed to a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundingSettings {
    pub precision: RoundingPrecision,
}

impl RoundingSettings {
    pub fn new(precision: RoundingPrecision) -> Self {
        Self { precision }
    }
}
