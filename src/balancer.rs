use crate::error::{Result, SplitterError};
use crate::rounding::RoundingPrecision;
use crate::schema::CalculationResult;
use log::debug;

pub struct RemainderBalancer {
    precision: RoundingPrecision,
}

impl RemainderBalancer {
    pub fn new(precision: RoundingPrecision) -> Self {
        Self { precision }
    }

    /// Splits `amount` across periods weighted by day count.
    ///
    /// Works on rounded running totals: each share is the difference between two consecutive
    /// rounded cumulative values, and the last cumulative value is the exact amount. The final
    /// period therefore absorbs the accumulated rounding remainder. A running total that would
    /// round past the amount is rounded down instead, so no share goes negative.
    ///
    /// Running totals are counted in whole increments so every share is the closest `f64` to
    /// its decimal value. Amounts too large to count exactly fall back to float running totals.
    pub fn distribute(&self, amount: f64, day_weights: &[i64], total_days: i64) -> Result<Vec<f64>> {
        if total_days <= 0 {
            return Err(SplitterError::calculation(format!(
                "Cannot distribute over {} days",
                total_days
            )));
        }

        let covered: i64 = day_weights.iter().sum();
        if covered != total_days {
            return Err(SplitterError::calculation(format!(
                "Period days ({}) do not cover the total duration ({})",
                covered, total_days
            )));
        }

        let shares = match self.distribute_steps(amount, day_weights, total_days) {
            Some(shares) => shares,
            None => {
                debug!("{} exceeds exact step counting, using float running totals", amount);
                self.distribute_float(amount, day_weights, total_days)?
            }
        };

        debug!(
            "Distributed {} over {} periods at precision {}",
            amount,
            shares.len(),
            self.precision
        );

        Ok(shares)
    }

    fn running_total(amount: f64, cumulative_days: i64, total_days: i64) -> Result<f64> {
        let raw = amount * (cumulative_days as f64 / total_days as f64);
        if !raw.is_finite() {
            return Err(SplitterError::calculation(format!(
                "Non-finite running total while splitting {}",
                amount
            )));
        }
        Ok(raw)
    }

    fn distribute_steps(
        &self,
        amount: f64,
        day_weights: &[i64],
        total_days: i64,
    ) -> Option<Vec<f64>> {
        let p = self.precision;
        let amount_steps = p.nearest_steps(amount)?;
        let on_grid = p.from_steps(amount_steps) == amount;

        let mut shares = Vec::with_capacity(day_weights.len());
        let mut cumulative_days = 0i64;
        let mut previous = 0i64;

        for (idx, &days) in day_weights.iter().enumerate() {
            cumulative_days += days;

            if idx + 1 == day_weights.len() {
                let last = if on_grid {
                    p.from_steps(amount_steps - previous)
                } else {
                    amount - p.from_steps(previous)
                };
                shares.push(last);
                break;
            }

            let raw = Self::running_total(amount, cumulative_days, total_days).ok()?;
            let mut steps = p.nearest_steps(raw)?;
            if p.from_steps(steps) > amount {
                steps = p.floor_steps(raw)?;
            }

            shares.push(p.from_steps(steps - previous));
            previous = steps;
        }

        Some(shares)
    }

    fn distribute_float(
        &self,
        amount: f64,
        day_weights: &[i64],
        total_days: i64,
    ) -> Result<Vec<f64>> {
        let mut shares = Vec::with_capacity(day_weights.len());
        let mut cumulative_days = 0i64;
        let mut previous_rounded = 0.0;

        for (idx, &days) in day_weights.iter().enumerate() {
            cumulative_days += days;

            let rounded = if idx + 1 == day_weights.len() {
                amount
            } else {
                let raw = Self::running_total(amount, cumulative_days, total_days)?;
                let nearest = self.precision.round_to(raw);
                if nearest > amount {
                    self.precision.floor_to(raw)
                } else {
                    nearest
                }
            };

            shares.push(rounded - previous_rounded);
            previous_rounded = rounded;
        }

        Ok(shares)
    }
}

/// Checks that a finished result conserves every amount and covers every day.
pub fn verify_conservation(result: &CalculationResult, tolerance: f64) -> Result<()> {
    let covered: i64 = result.periods.iter().map(|p| p.days).sum();
    if covered != result.total_days() {
        return Err(SplitterError::calculation(format!(
            "Period days sum to {} but the total duration is {}",
            covered,
            result.total_days()
        )));
    }

    for (idx, amount) in result.amounts.iter().enumerate() {
        let shares = result.shares_for(idx);
        if shares.len() != result.periods.len() {
            return Err(SplitterError::calculation(format!(
                "Amount #{} is missing shares for some periods",
                idx
            )));
        }

        if let Some(negative) = shares.iter().find(|s| **s < -tolerance) {
            return Err(SplitterError::calculation(format!(
                "Amount #{} received a negative share {}",
                idx, negative
            )));
        }

        let allocated: f64 = shares.iter().sum();
        let difference = (allocated - amount.value).abs();
        if difference > tolerance * amount.value.abs().max(1.0) {
            return Err(SplitterError::calculation(format!(
                "Amount #{} allocates {} instead of {} (difference {})",
                idx, allocated, amount.value, difference
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sum(values: &[f64]) -> f64 {
        values.iter().sum()
    }

    #[test]
    fn test_even_split() {
        let balancer = RemainderBalancer::new(RoundingPrecision::Cent);
        let shares = balancer.distribute(100.0, &[10, 10], 20).unwrap();
        assert_eq!(shares, vec![50.0, 50.0]);
    }

    #[test]
    fn test_remainder_lands_in_last_period() {
        let balancer = RemainderBalancer::new(RoundingPrecision::Cent);
        let shares = balancer.distribute(100.0, &[1, 1, 1], 3).unwrap();
        assert_eq!(shares, vec![33.33, 33.34, 33.33]);
    }

    #[test]
    fn test_coarse_precision_never_goes_negative() {
        // Independently rounding 5.2 up to 10 three times would overshoot 20
        let balancer = RemainderBalancer::new(RoundingPrecision::Ten);
        let shares = balancer.distribute(20.0, &[26, 26, 26, 22], 100).unwrap();
        assert!(shares.iter().all(|s| *s >= 0.0));
        assert_eq!(sum(&shares), 20.0);
    }

    #[test]
    fn test_running_total_never_rounds_past_amount() {
        // 6.3 would round to 10, leaving -3 for the last period
        let balancer = RemainderBalancer::new(RoundingPrecision::Ten);
        let shares = balancer.distribute(7.0, &[9, 1], 10).unwrap();
        assert_eq!(shares, vec![0.0, 7.0]);
    }

    #[test]
    fn test_off_grid_amount_conserved() {
        let balancer = RemainderBalancer::new(RoundingPrecision::FiveCents);
        let shares = balancer.distribute(100.03, &[31, 29, 31], 91).unwrap();
        assert!((sum(&shares) - 100.03).abs() < 1e-9);
        assert!(RoundingPrecision::FiveCents.is_multiple(shares[0], 1e-6));
        assert!(RoundingPrecision::FiveCents.is_multiple(shares[1], 1e-6));
    }

    #[test]
    fn test_shares_are_exact_grid_values() {
        // 31 / 29 / 31 days of 91
        let balancer = RemainderBalancer::new(RoundingPrecision::Cent);
        assert_eq!(
            balancer.distribute(100.0, &[31, 29, 31], 91).unwrap(),
            vec![34.07, 31.86, 34.07]
        );
        assert_eq!(
            balancer.distribute(0.3, &[31, 29, 31], 91).unwrap(),
            vec![0.1, 0.1, 0.1]
        );

        for precision in RoundingPrecision::ALL {
            let balancer = RemainderBalancer::new(precision);
            let shares = balancer.distribute(12_340.0, &[31, 28, 31, 30, 31], 151).unwrap();
            for share in &shares {
                assert_eq!(precision.round_to(*share), *share, "{} at {}", share, precision);
            }
        }
    }

    #[test]
    fn test_huge_amount_is_split() {
        let balancer = RemainderBalancer::new(RoundingPrecision::Cent);
        let shares = balancer.distribute(1e308, &[31, 29, 306], 366).unwrap();
        assert!(shares.iter().all(|s| s.is_finite() && *s >= 0.0));
        assert!((sum(&shares) - 1e308).abs() <= 1e-9 * 1e308);
    }

    #[test]
    fn test_rejects_uncovered_days() {
        let balancer = RemainderBalancer::new(RoundingPrecision::Cent);
        let err = balancer.distribute(10.0, &[3, 3], 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Calculation);

        assert!(balancer.distribute(10.0, &[], 0).is_err());
    }

    #[test]
    fn test_verify_conservation_detects_tampering() {
        use crate::engine::calculate;
        use crate::rounding::RoundingSettings;
        use crate::schema::CalculationInput;

        let input = CalculationInput::new("2024-01-01", "2024-03-31", true, vec![90.0.into()]);
        let mut result = calculate(&input, RoundingSettings::default()).unwrap();
        assert!(verify_conservation(&result, 1e-9).is_ok());

        result.periods[1].shares[0] += 0.01;
        let err = verify_conservation(&result, 1e-9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Calculation);

        result.periods[1].shares[0] -= 0.01;
        result.periods[0].days += 1;
        assert!(verify_conservation(&result, 1e-9).is_err());
    }
}
