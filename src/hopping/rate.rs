//! Arrhenius-type hopping rates.
//!
//! rate = ν · exp(−(E_barrier + E_local) / kT)
//!
//! evaluated in log space so that large barriers or low temperatures
//! underflow to 0 instead of producing NaN.

use super::network::Event;
use crate::error::{ensure_finite, KmcError, Result};

/// A candidate event together with its rate. Rebuilt every step.
#[derive(Clone, Debug, PartialEq)]
pub struct RateRecord {
    pub event: Event,
    pub rate: f64,
}

#[derive(Clone, Debug)]
pub struct RateModel {
    /// Attempt frequency ν.
    attempt_frequency: f64,
    /// Activation barrier, in energy units.
    barrier: f64,
    /// Boltzmann constant k.
    boltzmann: f64,
}

impl Default for RateModel {
    fn default() -> Self {
        Self {
            attempt_frequency: 1.0,
            barrier: 0.0,
            boltzmann: 1.0,
        }
    }
}

impl RateModel {
    pub fn new(attempt_frequency: f64, barrier: f64, boltzmann: f64) -> Result<Self> {
        if !(attempt_frequency > 0.0) || !attempt_frequency.is_finite() {
            return Err(KmcError::invalid(format!(
                "attempt frequency {} must be positive",
                attempt_frequency
            )));
        }
        if !(boltzmann > 0.0) || !boltzmann.is_finite() {
            return Err(KmcError::invalid(format!(
                "Boltzmann constant {} must be positive",
                boltzmann
            )));
        }
        ensure_finite("activation barrier", barrier)?;
        Ok(Self {
            attempt_frequency,
            barrier,
            boltzmann,
        })
    }

    #[inline]
    pub fn attempt_frequency(&self) -> f64 {
        self.attempt_frequency
    }

    #[inline]
    pub fn barrier(&self) -> f64 {
        self.barrier
    }

    fn thermal_energy(&self, temperature: f64) -> Result<f64> {
        ensure_finite("temperature", temperature)?;
        if temperature <= 0.0 {
            return Err(KmcError::invalid(format!(
                "temperature {} must be positive",
                temperature
            )));
        }
        Ok(self.boltzmann * temperature)
    }

    /// ν · exp(−E_barrier / kT): the rate of an event with no local energy change.
    pub fn prefactor(&self, temperature: f64) -> Result<f64> {
        self.rate(0.0, temperature)
    }

    /// Rate of an event whose local energy contribution is `local_energy`.
    pub fn rate(&self, local_energy: f64, temperature: f64) -> Result<f64> {
        ensure_finite("local energy", local_energy)?;
        let kt = self.thermal_energy(temperature)?;

        let log_rate = self.attempt_frequency.ln() - (self.barrier + local_energy) / kt;
        if log_rate.is_nan() {
            return Err(KmcError::numeric(format!(
                "log-rate is NaN (local energy {}, kT {})",
                local_energy, kt
            )));
        }
        let rate = log_rate.exp();
        if rate.is_infinite() {
            return Err(KmcError::numeric(format!(
                "rate overflows (local energy {}, kT {})",
                local_energy, kt
            )));
        }
        Ok(rate)
    }

    /// Pair `event` with its rate.
    pub fn rate_record(&self, event: Event, local_energy: f64, temperature: f64) -> Result<RateRecord> {
        let rate = self.rate(local_energy, temperature)?;
        Ok(RateRecord { event, rate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_arrhenius_rate() {
        let model = RateModel::new(2.0, 1.0, 1.0).unwrap();
        assert_relative_eq!(model.rate(0.0, 1.0).unwrap(), 2.0 * (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(model.rate(1.0, 2.0).unwrap(), 2.0 * (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(model.prefactor(0.5).unwrap(), 2.0 * (-2.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_rate_decreases_with_energy() {
        let model = RateModel::default();
        let low = model.rate(0.5, 1.0).unwrap();
        let high = model.rate(3.0, 1.0).unwrap();
        assert!(high < low);
        // Negative local energy speeds the event up
        assert!(model.rate(-1.0, 1.0).unwrap() > 1.0);
    }

    #[test]
    fn test_large_barrier_underflows_to_zero() {
        let model = RateModel::new(1.0e13, 1.0e4, 1.0).unwrap();
        let rate = model.rate(0.0, 1.0e-3).unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_invalid_temperature() {
        let model = RateModel::default();
        assert!(matches!(model.rate(0.0, 0.0), Err(KmcError::InvalidParameter(_))));
        assert!(matches!(model.rate(0.0, -1.0), Err(KmcError::InvalidParameter(_))));
        assert!(matches!(model.rate(0.0, f64::NAN), Err(KmcError::NumericAnomaly(_))));
    }

    #[test]
    fn test_non_finite_energy() {
        let model = RateModel::default();
        assert!(matches!(model.rate(f64::NAN, 1.0), Err(KmcError::NumericAnomaly(_))));
        assert!(matches!(model.rate(f64::INFINITY, 1.0), Err(KmcError::NumericAnomaly(_))));
        assert!(model.rate(-1.0e6, 1.0).is_err());
    }

    #[test]
    fn test_invalid_model_parameters() {
        assert!(RateModel::new(0.0, 0.0, 1.0).is_err());
        assert!(RateModel::new(1.0, 0.0, -1.0).is_err());
        assert!(RateModel::new(1.0, f64::NAN, 1.0).is_err());
    }
}
