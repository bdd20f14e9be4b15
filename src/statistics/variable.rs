//! Online running statistic with associative merge.

use super::sample::Sample;
use crate::error::{KmcError, Result};

/// Mean, standard deviation and extremes of a [`Variable`] in one value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimpleStatistics<T> {
    pub mean: f64,
    pub std: f64,
    pub min: T,
    pub max: T,
}

/// Running statistic of a scalar observable.
///
/// Keeps the sample count, the cumulative sum and sum of squares, the
/// current value and the extremes. Two independently accumulated instances
/// merge with [`join`](Variable::join), so per-thread or per-window
/// accumulation can be reduced without replaying samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable<T: Sample = f64> {
    value: T,
    n: u64,
    cumulative: f64,
    sqcumulative: f64,
    min: Option<T>,
    max: Option<T>,
}

impl<T: Sample> Default for Variable<T> {
    fn default() -> Self {
        Self {
            value: T::zero(),
            n: 0,
            cumulative: 0.0,
            sqcumulative: 0.0,
            min: None,
            max: None,
        }
    }
}

impl<T: Sample> Variable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a variable holding `value` as its first sample.
    pub fn with_value(value: T) -> Self {
        let mut variable = Self::default();
        variable.set(value, 1);
        variable
    }

    /// Record `value` with the given `multiplicity`.
    ///
    /// A zero multiplicity only updates the current value.
    pub fn set(&mut self, value: T, multiplicity: u32) {
        self.value = value;
        if multiplicity == 0 {
            return;
        }
        // Sums are kept in f64 so integer samples cannot overflow when squared
        let x = value.to_f64();
        let m = f64::from(multiplicity);
        self.n += u64::from(multiplicity);
        self.cumulative += x * m;
        self.sqcumulative += x * x * m;
        self.min = Some(match self.min {
            Some(min) if min <= value => min,
            _ => value,
        });
        self.max = Some(match self.max {
            Some(max) if max >= value => max,
            _ => value,
        });
    }

    /// Shorthand for `set(value, 1)`.
    #[inline]
    pub fn add(&mut self, value: T) {
        self.set(value, 1);
    }

    /// Zero the value and all statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Merge the statistics of `other` into `self`.
    ///
    /// Count, sums and extremes combine associatively and commutatively.
    /// The current value is kept unless `self` has never been set.
    pub fn join(&mut self, other: &Variable<T>) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            self.value = other.value;
        }
        self.n += other.n;
        self.cumulative += other.cumulative;
        self.sqcumulative += other.sqcumulative;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(if b < a { b } else { a }),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(if b > a { b } else { a }),
            (a, b) => a.or(b),
        };
    }

    #[inline]
    pub fn value(&self) -> T {
        self.value
    }

    /// Number of samples recorded (multiplicities included).
    #[inline]
    pub fn n(&self) -> u64 {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }

    #[inline]
    pub fn sqcumulative(&self) -> f64 {
        self.sqcumulative
    }

    #[inline]
    pub fn min(&self) -> Option<T> {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Option<T> {
        self.max
    }

    /// Arithmetic mean of the recorded samples.
    pub fn mean(&self) -> Result<f64> {
        if self.n == 0 {
            return Err(KmcError::undefined("mean of a variable with no samples"));
        }
        Ok(self.cumulative / self.n as f64)
    }

    /// Population standard deviation.
    ///
    /// Round-off can make `<x²> - <x>²` slightly negative; it is clamped to 0.
    pub fn std(&self) -> Result<f64> {
        let mean = self.mean()?;
        let n = self.n as f64;
        let variance = self.sqcumulative / n - mean * mean;
        Ok(variance.max(0.0).sqrt())
    }

    /// Sample standard deviation (N - 1 denominator).
    pub fn sample_std(&self) -> Result<f64> {
        if self.n < 2 {
            return Err(KmcError::undefined(format!(
                "sample standard deviation needs at least 2 samples, have {}",
                self.n
            )));
        }
        let n = self.n as f64;
        let mean = self.cumulative / n;
        let variance = (self.sqcumulative - n * mean * mean) / (n - 1.0);
        Ok(variance.max(0.0).sqrt())
    }

    /// Mean, population std, min and max together.
    pub fn statistics(&self) -> Result<SimpleStatistics<T>> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Ok(SimpleStatistics {
                mean: self.mean()?,
                std: self.std()?,
                min,
                max,
            }),
            _ => Err(KmcError::undefined("statistics of a variable with no samples")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn accumulate(values: &[f64]) -> Variable<f64> {
        let mut v = Variable::new();
        for &x in values {
            v.add(x);
        }
        v
    }

    #[test]
    fn test_mean_and_population_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let v = accumulate(&values);

        assert_eq!(v.n(), 8);
        assert_relative_eq!(v.mean().unwrap(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(v.std().unwrap(), 2.0, epsilon = 1e-12);
        assert_eq!(v.min(), Some(2.0));
        assert_eq!(v.max(), Some(9.0));
        assert_eq!(v.value(), 9.0);
    }

    #[test]
    fn test_sample_std() {
        let v = accumulate(&[1.0, 2.0, 3.0, 4.0]);
        // Sum of squared deviations 5.0, N - 1 = 3
        assert_relative_eq!(v.sample_std().unwrap(), (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert!(accumulate(&[1.0]).sample_std().is_err());
    }

    #[test]
    fn test_empty_variable_is_undefined() {
        let v: Variable<f64> = Variable::new();
        assert!(matches!(v.mean(), Err(KmcError::UndefinedStatistic(_))));
        assert!(matches!(v.std(), Err(KmcError::UndefinedStatistic(_))));
        assert!(v.statistics().is_err());
        assert_eq!(v.min(), None);
    }

    #[test]
    fn test_multiplicity() {
        let mut weighted = Variable::new();
        weighted.set(3.0, 4);
        weighted.set(1.0, 2);

        let repeated = accumulate(&[3.0, 3.0, 3.0, 3.0, 1.0, 1.0]);
        assert_eq!(weighted.n(), repeated.n());
        assert_relative_eq!(weighted.mean().unwrap(), repeated.mean().unwrap(), epsilon = 1e-12);
        assert_relative_eq!(weighted.std().unwrap(), repeated.std().unwrap(), epsilon = 1e-12);

        weighted.set(100.0, 0);
        assert_eq!(weighted.value(), 100.0);
        assert_eq!(weighted.n(), 6);
        assert_eq!(weighted.max(), Some(3.0));
    }

    #[test]
    fn test_constant_samples_clamp_variance() {
        let v = accumulate(&[0.1; 10]);
        let std = v.std().unwrap();
        assert!(std >= 0.0);
        assert!(std < 1e-7);
    }

    #[test]
    fn test_reset() {
        let mut v = accumulate(&[1.0, 2.0]);
        v.reset();
        assert_eq!(v.n(), 0);
        assert_eq!(v.value(), 0.0);
        assert_eq!(v.cumulative(), 0.0);
        assert!(v.mean().is_err());
    }

    #[test]
    fn test_join_matches_sequential_accumulation() {
        let a = [1.5, -2.0, 3.25, 8.0];
        let b = [0.5, 4.0, -7.5];
        let all: Vec<f64> = a.iter().chain(b.iter()).copied().collect();

        let sequential = accumulate(&all);

        let mut ab = accumulate(&a);
        ab.join(&accumulate(&b));
        let mut ba = accumulate(&b);
        ba.join(&accumulate(&a));

        for joined in [&ab, &ba] {
            assert_eq!(joined.n(), sequential.n());
            assert_relative_eq!(joined.mean().unwrap(), sequential.mean().unwrap(), epsilon = 1e-12);
            assert_relative_eq!(joined.std().unwrap(), sequential.std().unwrap(), epsilon = 1e-12);
            assert_eq!(joined.min(), Some(-7.5));
            assert_eq!(joined.max(), Some(8.0));
        }
    }

    #[test]
    fn test_join_is_associative() {
        let x = accumulate(&[1.0, 2.0]);
        let y = accumulate(&[10.0]);
        let z = accumulate(&[-3.0, 0.0, 6.0]);

        let mut left = x.clone();
        left.join(&y);
        left.join(&z);

        let mut yz = y.clone();
        yz.join(&z);
        let mut right = x.clone();
        right.join(&yz);

        assert_eq!(left.n(), right.n());
        assert_relative_eq!(left.mean().unwrap(), right.mean().unwrap(), epsilon = 1e-12);
        assert_relative_eq!(left.std().unwrap(), right.std().unwrap(), epsilon = 1e-12);
        assert_eq!(left.min(), right.min());
        assert_eq!(left.max(), right.max());
    }

    #[test]
    fn test_join_with_empty() {
        let mut empty: Variable<f64> = Variable::new();
        let full = accumulate(&[4.0, 6.0]);
        empty.join(&full);
        assert_eq!(empty, full);

        let mut full2 = full.clone();
        full2.join(&Variable::new());
        assert_eq!(full2, full);
    }

    #[test]
    fn test_integer_variable() {
        let mut v: Variable<i64> = Variable::new();
        v.set(3, 2);
        v.add(-1);
        assert_eq!(v.n(), 3);
        assert_eq!(v.cumulative(), 5.0);
        assert_eq!(v.sqcumulative(), 19.0);
        assert_relative_eq!(v.mean().unwrap(), 5.0 / 3.0, epsilon = 1e-12);

        let stats = v.statistics().unwrap();
        assert_eq!(stats.min, -1);
        assert_eq!(stats.max, 3);
    }

    #[test]
    fn test_large_integer_samples_do_not_overflow() {
        let mut v: Variable<i32> = Variable::new();
        v.add(50_000);
        v.add(-50_000);
        v.set(i32::MAX, 3);

        assert_eq!(v.n(), 5);
        assert_relative_eq!(
            v.sqcumulative(),
            5.0e9 + 3.0 * (i32::MAX as f64) * (i32::MAX as f64),
            max_relative = 1e-12
        );
        assert_relative_eq!(v.mean().unwrap(), 3.0 * i32::MAX as f64 / 5.0, max_relative = 1e-12);
        // Three samples at M and two symmetric ones near 0: std ≈ M·sqrt(6)/5
        assert_relative_eq!(
            v.std().unwrap(),
            (i32::MAX as f64) * 6.0f64.sqrt() / 5.0,
            max_relative = 1e-6
        );
        assert_eq!(v.max(), Some(i32::MAX));
        assert_eq!(v.min(), Some(-50_000));

        let mut u: Variable<u64> = Variable::new();
        u.add(u64::MAX);
        u.add(u64::MAX);
        assert_relative_eq!(u.mean().unwrap(), u64::MAX as f64, max_relative = 1e-12);
        assert!(u.std().unwrap() >= 0.0);
    }
}
