//! Error taxonomy and the injectable fatal/warning reporting capability.
//!
//! Library operations return [`KmcError`] through `Result`. Whether an error
//! terminates the simulation is decided by a [`Reporter`]: the default
//! [`ProcessReporter`] exits the process on fatal conditions, while
//! [`CapturingReporter`] only records them so tests can inspect diagnostics.

use std::panic::Location;

use parking_lot::Mutex;
use thiserror::Error;

use crate::hopping::network::SlipSpringId;

/// Unified error type for the hopping engine and the statistics primitives.
#[derive(Error, Debug)]
pub enum KmcError {
    /// A histogram was used before `init` configured it.
    #[error("Histogram '{name}' is not initialized")]
    Uninitialized { name: String },

    /// Two histograms cannot be merged.
    #[error("Incompatible histograms: {0}")]
    Incompatible(String),

    /// A parameter violates its contract (non-positive temperature, bad range, ...).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// NaN or infinity in an energy, rate or value.
    #[error("Numerical anomaly: {0}")]
    NumericAnomaly(String),

    /// A statistic was queried without enough samples.
    #[error("Undefined statistic: {0}")]
    UndefinedStatistic(String),

    /// The topology collaborator refused to apply an event.
    #[error("Mutation of slip-spring {spring} rejected: {reason}")]
    MutationRejected { spring: SlipSpringId, reason: String },

    /// Lifetime/event stream failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KmcError {
    pub fn uninitialized(name: impl Into<String>) -> Self {
        KmcError::Uninitialized { name: name.into() }
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        KmcError::Incompatible(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        KmcError::InvalidParameter(message.into())
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        KmcError::NumericAnomaly(message.into())
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        KmcError::UndefinedStatistic(message.into())
    }

    pub fn rejected(spring: SlipSpringId, reason: impl Into<String>) -> Self {
        KmcError::MutationRejected {
            spring,
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the simulation; the others are recoverable at runtime.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            KmcError::UndefinedStatistic(_) | KmcError::MutationRejected { .. }
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, KmcError>;

/// Reject NaN and infinities, naming the offending quantity.
pub(crate) fn ensure_finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(KmcError::numeric(format!("{} is {}", what, value)))
    }
}

/// Sink for fatal and warning diagnostics.
///
/// `fatal` may not return (the process reporter exits); callers must still
/// propagate the error afterwards for reporters that do return.
pub trait Reporter: Send + Sync {
    fn warning(&self, message: &str, location: &'static Location<'static>);
    fn fatal(&self, error: &KmcError, location: &'static Location<'static>);
}

/// Logs warnings and terminates the process on fatal errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessReporter;

impl Reporter for ProcessReporter {
    fn warning(&self, message: &str, location: &'static Location<'static>) {
        log::warn!("{} | file: {} @ {}", message, location.file(), location.line());
    }

    fn fatal(&self, error: &KmcError, location: &'static Location<'static>) {
        log::error!("{} | file: {} @ {}", error, location.file(), location.line());
        eprintln!("error: {} | file: {} @ {}", error, location.file(), location.line());
        std::process::exit(1);
    }
}

/// Records diagnostics instead of acting on them.
#[derive(Debug, Default)]
pub struct CapturingReporter {
    warnings: Mutex<Vec<String>>,
    fatals: Mutex<Vec<String>>,
}

impl CapturingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    pub fn fatals(&self) -> Vec<String> {
        self.fatals.lock().clone()
    }
}

impl Reporter for CapturingReporter {
    fn warning(&self, message: &str, location: &'static Location<'static>) {
        log::warn!("{} | file: {} @ {}", message, location.file(), location.line());
        self.warnings
            .lock()
            .push(format!("{} @ {}:{}", message, location.file(), location.line()));
    }

    fn fatal(&self, error: &KmcError, location: &'static Location<'static>) {
        log::error!("{} | file: {} @ {}", error, location.file(), location.line());
        self.fatals
            .lock()
            .push(format!("{} @ {}:{}", error, location.file(), location.line()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(KmcError::uninitialized("h").is_fatal());
        assert!(KmcError::incompatible("nbin").is_fatal());
        assert!(KmcError::invalid("T <= 0").is_fatal());
        assert!(KmcError::numeric("NaN").is_fatal());
        assert!(!KmcError::undefined("N = 0").is_fatal());
        assert!(!KmcError::rejected(3, "not adjacent").is_fatal());
    }

    #[test]
    fn test_capturing_reporter_records_location() {
        let reporter = CapturingReporter::new();
        reporter.warning("empty histogram", Location::caller());
        reporter.fatal(&KmcError::invalid("temperature -1"), Location::caller());

        let warnings = reporter.warnings();
        let fatals = reporter.fatals();
        assert_eq!(warnings.len(), 1);
        assert_eq!(fatals.len(), 1);
        assert!(warnings[0].contains("empty histogram"));
        assert!(warnings[0].contains("error.rs"));
        assert!(fatals[0].contains("temperature -1"));
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite("energy", 1.5).unwrap(), 1.5);
        assert!(matches!(
            ensure_finite("energy", f64::NAN),
            Err(KmcError::NumericAnomaly(_))
        ));
        assert!(ensure_finite("energy", f64::INFINITY).is_err());
    }
}
