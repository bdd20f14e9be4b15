//! Rejection-free (BKL / Gillespie) selection of the next event.
//!
//! Given candidate rates r_i and a time budget Δt:
//! - R = Σ r_i; no event if R = 0
//! - τ = −ln(u₁) / R; no event if τ > Δt
//! - choose the first k with Σ_{i≤k} r_i ≥ u₂·R
//!
//! Ties on the cumulative threshold go to the earliest candidate in list
//! order, and zero-rate candidates are never chosen.

use rand::Rng;

use crate::error::{ensure_finite, KmcError, Result};

/// Outcome of one selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Selection {
    NoEvent,
    /// Candidate `index` fires after `wait` time units.
    Event { index: usize, wait: f64 },
}

/// Sum of the candidate rates, validating each one.
pub fn total_rate(rates: &[f64]) -> Result<f64> {
    let mut total = 0.0;
    for (i, &rate) in rates.iter().enumerate() {
        ensure_finite("candidate rate", rate)?;
        if rate < 0.0 {
            return Err(KmcError::invalid(format!(
                "candidate {} has negative rate {}",
                i, rate
            )));
        }
        total += rate;
    }
    ensure_finite("total rate", total)
}

/// Exponentially distributed waiting time for total rate `total`.
pub fn waiting_time<R: Rng + ?Sized>(total: f64, rng: &mut R) -> f64 {
    // 1 - u lies in (0, 1], keeping the logarithm finite
    let u: f64 = 1.0 - rng.gen::<f64>();
    -u.ln() / total
}

/// Index of the candidate selected by cumulative-rate search.
///
/// `rates` must be non-empty with positive sum `total`.
pub fn choose_index<R: Rng + ?Sized>(rates: &[f64], total: f64, rng: &mut R) -> usize {
    let threshold: f64 = rng.gen::<f64>() * total;
    let mut cumsum = 0.0;
    let mut last_positive = 0;
    for (i, &rate) in rates.iter().enumerate() {
        if rate <= 0.0 {
            continue;
        }
        cumsum += rate;
        last_positive = i;
        if threshold <= cumsum {
            return i;
        }
    }
    // Round-off can leave the threshold a hair above the final partial sum
    last_positive
}

/// Draw the next event within `budget`, or [`Selection::NoEvent`].
pub fn select_event<R: Rng + ?Sized>(rates: &[f64], budget: f64, rng: &mut R) -> Result<Selection> {
    if budget.is_nan() || budget < 0.0 {
        return Err(KmcError::invalid(format!(
            "time budget {} must be non-negative",
            budget
        )));
    }

    let total = total_rate(rates)?;
    if total == 0.0 {
        return Ok(Selection::NoEvent);
    }

    let wait = waiting_time(total, rng);
    if wait > budget {
        return Ok(Selection::NoEvent);
    }

    let index = choose_index(rates, total, rng);
    Ok(Selection::Event { index, wait })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_and_zero_rates() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select_event(&[], 1.0, &mut rng).unwrap(), Selection::NoEvent);
        assert_eq!(select_event(&[0.0, 0.0], 1.0, &mut rng).unwrap(), Selection::NoEvent);
    }

    #[test]
    fn test_negative_or_nan_rate_is_error() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            select_event(&[1.0, -0.5], 1.0, &mut rng),
            Err(KmcError::InvalidParameter(_))
        ));
        assert!(matches!(
            select_event(&[f64::NAN], 1.0, &mut rng),
            Err(KmcError::NumericAnomaly(_))
        ));
        assert!(select_event(&[1.0], -1.0, &mut rng).is_err());
    }

    #[test]
    fn test_zero_rate_candidate_never_chosen() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            match select_event(&[0.0, 1.0, 0.0], f64::INFINITY, &mut rng).unwrap() {
                Selection::Event { index, .. } => assert_eq!(index, 1),
                Selection::NoEvent => panic!("infinite budget must always fire"),
            }
        }
    }

    #[test]
    fn test_selection_frequency_follows_rates() {
        let mut rng = StdRng::seed_from_u64(42);
        let rates = [1.0, 3.0];
        let trials = 200_000;
        let mut second = 0usize;
        for _ in 0..trials {
            if let Selection::Event { index: 1, .. } =
                select_event(&rates, f64::INFINITY, &mut rng).unwrap()
            {
                second += 1;
            }
        }
        let frequency = second as f64 / trials as f64;
        assert!((frequency - 0.75).abs() < 0.01, "frequency {}", frequency);
    }

    #[test]
    fn test_waiting_time_mean() {
        let mut rng = StdRng::seed_from_u64(123);
        let total = 4.0;
        let trials = 200_000;
        let mean: f64 = (0..trials).map(|_| waiting_time(total, &mut rng)).sum::<f64>() / trials as f64;
        assert!((mean - 0.25).abs() < 0.005, "mean waiting time {}", mean);
    }

    #[test]
    fn test_budget_limits_events() {
        let mut rng = StdRng::seed_from_u64(9);
        let rate = 1.0;
        let budget = 0.5;
        let trials = 100_000;
        let mut fired = 0usize;
        for _ in 0..trials {
            match select_event(&[rate], budget, &mut rng).unwrap() {
                Selection::Event { wait, .. } => {
                    assert!(wait <= budget);
                    fired += 1;
                }
                Selection::NoEvent => {}
            }
        }
        let expected = 1.0 - (-rate * budget).exp();
        let frequency = fired as f64 / trials as f64;
        assert!((frequency - expected).abs() < 0.01, "frequency {}", frequency);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let rates = [0.3, 1.2, 0.5, 2.0];
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| select_event(&rates, 10.0, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(5), draw(5));
    }
}
