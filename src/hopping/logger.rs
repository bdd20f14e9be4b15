//! Persisted records of slip-spring lifetimes and applied events.
//!
//! Lifetime stream: `"<id> <created_time> <destroyed_time>"`, one line per
//! destroyed slip-spring.
//! Event stream: `"<time> <id> <kind>"`, one line per applied event.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::network::{EventKind, SlipSpringId};
use crate::error::Result;

/// Lifespan of one destroyed slip-spring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifetimeRecord {
    pub id: SlipSpringId,
    pub created: f64,
    pub destroyed: f64,
}

impl LifetimeRecord {
    #[inline]
    pub fn lifetime(&self) -> f64 {
        self.destroyed - self.created
    }
}

/// Owner of the lifetime and event streams.
///
/// Both streams are buffered; dropping the logger flushes them, and
/// [`finish`](LifetimeLogger::finish) does so while reporting failures.
pub struct LifetimeLogger {
    lifetimes: Box<dyn Write + Send>,
    events: Box<dyn Write + Send>,
    n_lifetimes: u64,
    n_events: u64,
}

impl LifetimeLogger {
    /// Create (truncating) the two files. Failing to open either is an error.
    pub fn create(lifetimes_path: impl AsRef<Path>, events_path: impl AsRef<Path>) -> Result<Self> {
        let lifetimes = File::create(lifetimes_path.as_ref())?;
        let events = File::create(events_path.as_ref())?;
        log::debug!(
            "Writing slip-spring lifetimes to {} and events to {}",
            lifetimes_path.as_ref().display(),
            events_path.as_ref().display()
        );
        Ok(Self::from_writers(BufWriter::new(lifetimes), BufWriter::new(events)))
    }

    /// Log into arbitrary writers.
    pub fn from_writers<L, E>(lifetimes: L, events: E) -> Self
    where
        L: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        Self {
            lifetimes: Box::new(lifetimes),
            events: Box::new(events),
            n_lifetimes: 0,
            n_events: 0,
        }
    }

    pub fn record_lifetime(&mut self, record: &LifetimeRecord) -> Result<()> {
        writeln!(
            self.lifetimes,
            "{} {} {}",
            record.id, record.created, record.destroyed
        )?;
        self.n_lifetimes += 1;
        Ok(())
    }

    pub fn record_event(&mut self, time: f64, id: SlipSpringId, kind: EventKind) -> Result<()> {
        writeln!(self.events, "{} {} {}", time, id, kind)?;
        self.n_events += 1;
        Ok(())
    }

    pub fn n_lifetimes(&self) -> u64 {
        self.n_lifetimes
    }

    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    pub fn flush(&mut self) -> Result<()> {
        self.lifetimes.flush()?;
        self.events.flush()?;
        Ok(())
    }

    /// Flush and close both streams.
    pub fn finish(mut self) -> Result<()> {
        self.flush()?;
        log::info!(
            "Hopping log closed: {} events, {} lifetimes",
            self.n_events,
            self.n_lifetimes
        );
        Ok(())
    }
}

impl Drop for LifetimeLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("Failed to flush hopping logs: {}", e);
        }
    }
}

impl std::fmt::Debug for LifetimeLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeLogger")
            .field("n_lifetimes", &self.n_lifetimes)
            .field("n_events", &self.n_events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KmcError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_formats() {
        let dir = TempDir::new().unwrap();
        let lifetimes = dir.path().join("lifetimes.dat");
        let events = dir.path().join("events.dat");

        let mut logger = LifetimeLogger::create(&lifetimes, &events).unwrap();
        logger.record_event(0.5, 3, EventKind::Hop).unwrap();
        logger.record_event(1.25, 3, EventKind::Destroy).unwrap();
        logger
            .record_lifetime(&LifetimeRecord { id: 3, created: 0.0, destroyed: 1.25 })
            .unwrap();
        assert_eq!(logger.n_events(), 2);
        assert_eq!(logger.n_lifetimes(), 1);
        logger.finish().unwrap();

        assert_eq!(fs::read_to_string(&events).unwrap(), "0.5 3 hop\n1.25 3 destroy\n");
        assert_eq!(fs::read_to_string(&lifetimes).unwrap(), "3 0 1.25\n");
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        let lifetimes = dir.path().join("l.dat");
        let events = dir.path().join("e.dat");
        {
            let mut logger = LifetimeLogger::create(&lifetimes, &events).unwrap();
            logger.record_event(2.0, 0, EventKind::Create).unwrap();
        }
        assert_eq!(fs::read_to_string(&events).unwrap(), "2 0 create\n");
    }

    #[test]
    fn test_unopenable_stream_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("no_such_dir").join("lifetimes.dat");
        let events = dir.path().join("events.dat");
        let result = LifetimeLogger::create(&missing, &events);
        assert!(matches!(result, Err(KmcError::Io(_))));
    }

    #[test]
    fn test_lifetime() {
        let record = LifetimeRecord { id: 1, created: 2.0, destroyed: 5.5 };
        assert_eq!(record.lifetime(), 3.5);
    }
}
