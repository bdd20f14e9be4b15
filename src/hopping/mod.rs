//! Slip-spring hopping kinetic Monte Carlo.
//!
//! This module provides:
//! - BdFrame: per-step view over Brownian-dynamics positions and temperature
//! - RateModel: Arrhenius rates from local stretching energy
//! - select_event: rejection-free event and waiting-time selection
//! - NetworkMutator: contract with the topology collaborator (ChainNetwork reference)
//! - LifetimeLogger: lifetime and event streams
//! - HoppingObservables: mergeable per-run aggregates
//! - HoppingScheme: the per-step driver, plus parallel frozen-configuration runs

pub mod frame;
pub mod rate;
pub mod selector;
pub mod network;
pub mod logger;
pub mod observables;
pub mod scheme;

pub use frame::BdFrame;
pub use rate::{RateModel, RateRecord};
pub use selector::{select_event, Selection};
pub use network::{
    BeadId, ChainNetwork, Event, EventKind, NetworkMutator, SlipSpring, SlipSpringId, SpringEnd,
    SpringState,
};
pub use logger::{LifetimeLogger, LifetimeRecord};
pub use observables::{EventCounts, HoppingObservables};
pub use scheme::{
    simulate_trajectories_parallel,
    HoppingConfig,
    HoppingScheme,
    StepOutcome,
};
