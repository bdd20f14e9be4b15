//! Aggregated observables of a hopping run.
//!
//! Every field merges associatively, so trajectories or domains can be
//! accumulated privately and reduced afterwards.

use rayon::prelude::*;

use super::network::EventKind;
use crate::error::Result;
use crate::statistics::{Histogram, Variable};

/// Number of applied events of each kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub create: u64,
    pub hop: u64,
    pub destroy: u64,
}

impl EventCounts {
    pub fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::Create => self.create += 1,
            EventKind::Hop => self.hop += 1,
            EventKind::Destroy => self.destroy += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.create + self.hop + self.destroy
    }

    pub fn join(&mut self, other: &EventCounts) {
        self.create += other.create;
        self.hop += other.hop;
        self.destroy += other.destroy;
    }
}

#[derive(Clone, Debug)]
pub struct HoppingObservables {
    /// Lifetimes of destroyed slip-springs.
    pub lifetimes: Histogram<f64>,
    /// Waiting times of applied events.
    pub wait_times: Variable<f64>,
    /// Local energy of applied events.
    pub energies: Variable<f64>,
    /// Number of candidate events per step.
    pub candidates: Variable<f64>,
    pub events: EventCounts,
    pub steps: u64,
    /// Steps that ended without an applied event (including rejections).
    pub idle_steps: u64,
    pub rejections: u64,
}

impl HoppingObservables {
    pub fn new(lifetime_bin_width: f64) -> Result<Self> {
        let mut lifetimes = Histogram::new("lifetimes");
        lifetimes.init_free(lifetime_bin_width, 0.0, false)?;
        Ok(Self {
            lifetimes,
            wait_times: Variable::new(),
            energies: Variable::new(),
            candidates: Variable::new(),
            events: EventCounts::default(),
            steps: 0,
            idle_steps: 0,
            rejections: 0,
        })
    }

    /// Fraction of steps that applied an event.
    pub fn event_fraction(&self) -> Option<f64> {
        if self.steps == 0 {
            None
        } else {
            Some((self.steps - self.idle_steps) as f64 / self.steps as f64)
        }
    }

    pub fn join(&mut self, other: &HoppingObservables) -> Result<()> {
        self.lifetimes.join(&other.lifetimes)?;
        self.wait_times.join(&other.wait_times);
        self.energies.join(&other.energies);
        self.candidates.join(&other.candidates);
        self.events.join(&other.events);
        self.steps += other.steps;
        self.idle_steps += other.idle_steps;
        self.rejections += other.rejections;
        Ok(())
    }

    /// Join independently accumulated parts in parallel.
    ///
    /// Returns `None` for an empty input.
    pub fn reduce(parts: Vec<HoppingObservables>) -> Option<Result<HoppingObservables>> {
        parts
            .into_par_iter()
            .map(Ok)
            .reduce_with(|a: Result<HoppingObservables>, b: Result<HoppingObservables>| {
                let mut a = a?;
                a.join(&b?)?;
                Ok(a)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn part(lifetimes: &[f64], hops: u64) -> HoppingObservables {
        let mut obs = HoppingObservables::new(1.0).unwrap();
        for &l in lifetimes {
            obs.lifetimes.add(l, 1).unwrap();
            obs.events.record(EventKind::Destroy);
            obs.wait_times.add(0.1);
            obs.steps += 1;
        }
        for _ in 0..hops {
            obs.events.record(EventKind::Hop);
            obs.steps += 1;
        }
        obs.steps += 1;
        obs.idle_steps += 1;
        obs
    }

    #[test]
    fn test_reduce_matches_sequential_join() {
        let parts = vec![part(&[0.5, 2.5], 3), part(&[], 1), part(&[7.0], 0)];

        let mut sequential = parts[0].clone();
        sequential.join(&parts[1]).unwrap();
        sequential.join(&parts[2]).unwrap();

        let reduced = HoppingObservables::reduce(parts).unwrap().unwrap();
        assert_eq!(reduced.events, sequential.events);
        assert_eq!(reduced.events.total(), 7);
        assert_eq!(reduced.steps, sequential.steps);
        assert_eq!(reduced.lifetimes.number_of_values(), 3);
        assert_eq!(reduced.lifetimes.bin_range(), Some((0, 7)));
        assert_relative_eq!(
            reduced.lifetimes.mean().unwrap(),
            sequential.lifetimes.mean().unwrap(),
            epsilon = 1e-12
        );
        assert_relative_eq!(reduced.event_fraction().unwrap(), 7.0 / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reduce_empty() {
        assert!(HoppingObservables::reduce(Vec::new()).is_none());
    }

    #[test]
    fn test_incompatible_lifetime_bins() {
        let mut a = HoppingObservables::new(1.0).unwrap();
        let b = HoppingObservables::new(0.5).unwrap();
        assert!(a.join(&b).is_err());
        assert!(HoppingObservables::reduce(vec![a, b]).unwrap().is_err());
    }

    #[test]
    fn test_event_fraction_without_steps() {
        let obs = HoppingObservables::new(1.0).unwrap();
        assert_eq!(obs.event_fraction(), None);
    }
}
