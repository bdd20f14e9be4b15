//! Slip-spring kinetic Monte Carlo for Brownian-dynamics simulations of
//! entangled polymer melts.
//!
//! The hopping engine creates, slides and destroys slip-springs with rates
//! derived from their local stretching energy, and aggregates what happens
//! in running statistics and histograms that merge across threads.
//!
//! With the `python` feature the crate also builds the `slipspring_kmc`
//! extension module.

pub mod error;
pub mod statistics;
pub mod hopping;

#[cfg(feature = "python")]
mod python;

pub use error::{CapturingReporter, KmcError, ProcessReporter, Reporter, Result};
pub use statistics::{Histogram, HistogramType, Partition, Sample, SimpleStatistics, Variable};
pub use hopping::{
    simulate_trajectories_parallel, BdFrame, ChainNetwork, Event, EventKind, HoppingConfig,
    HoppingObservables, HoppingScheme, LifetimeLogger, LifetimeRecord, NetworkMutator, RateModel,
    SlipSpring, StepOutcome,
};
