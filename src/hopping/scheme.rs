//! Kinetic Monte Carlo slip-spring hopping scheme.
//!
//! Called once per Brownian-dynamics step. Each call:
//! 1. asks the topology collaborator for candidate events,
//! 2. turns the local stretching energy of each candidate into a rate,
//! 3. selects zero or one event within the step's time budget,
//! 4. has the collaborator apply it and re-checks the result,
//! 5. feeds the outcome to the observables and the lifetime/event logs.
//!
//! Key feature: independent trajectories on a frozen configuration run in
//! parallel with Rayon and are reduced with `join`.

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use super::frame::BdFrame;
use super::logger::{LifetimeLogger, LifetimeRecord};
use super::network::{BeadId, Event, NetworkMutator, SlipSpringId};
use super::observables::HoppingObservables;
use super::rate::{RateModel, RateRecord};
use super::selector::{select_event, Selection};
use crate::error::{KmcError, ProcessReporter, Reporter, Result};
use crate::statistics::Variable;

/// Configuration for the hopping scheme.
#[derive(Clone, Debug)]
pub struct HoppingConfig {
    /// Attempt frequency ν of every event.
    pub attempt_frequency: f64,
    /// Activation barrier added to every event's local energy.
    pub barrier: f64,
    /// Boltzmann constant in the simulation's units.
    pub boltzmann: f64,
    /// Slip-spring stiffness k_s in U = ½·k_s·r².
    pub spring_constant: f64,
    /// Bin width of the lifetime histogram.
    pub lifetime_bin_width: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for HoppingConfig {
    fn default() -> Self {
        Self {
            attempt_frequency: 1.0,
            barrier: 0.0,
            boltzmann: 1.0,
            spring_constant: 1.0,
            lifetime_bin_width: 1.0,
            seed: 42,
        }
    }
}

impl HoppingConfig {
    pub fn validate(&self) -> Result<()> {
        RateModel::new(self.attempt_frequency, self.barrier, self.boltzmann)?;
        if !(self.spring_constant > 0.0) || !self.spring_constant.is_finite() {
            return Err(KmcError::invalid(format!(
                "spring constant {} must be positive",
                self.spring_constant
            )));
        }
        if !(self.lifetime_bin_width > 0.0) || !self.lifetime_bin_width.is_finite() {
            return Err(KmcError::invalid(format!(
                "lifetime bin width {} must be positive",
                self.lifetime_bin_width
            )));
        }
        Ok(())
    }
}

/// Result of one hopping step.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// No candidate fired within the time budget.
    NoEvent,
    /// `event` was applied to slip-spring `spring` at simulation `time`.
    Applied {
        event: Event,
        spring: SlipSpringId,
        time: f64,
        wait: f64,
    },
    /// The collaborator refused `event`; the step counts as idle.
    Rejected { event: Event },
}

/// Kinetic Monte Carlo driver for slip-spring creation, hopping and destruction.
pub struct HoppingScheme {
    config: HoppingConfig,
    rate_model: RateModel,
    rng: StdRng,
    clock: f64,
    observables: HoppingObservables,
    logger: Option<LifetimeLogger>,
    reporter: Arc<dyn Reporter>,
    records: Vec<RateRecord>,
    local_energies: Vec<f64>,
}

impl HoppingScheme {
    /// Create a scheme that terminates the process on fatal errors.
    #[track_caller]
    pub fn new(config: HoppingConfig) -> Result<Self> {
        Self::with_reporter(config, Arc::new(ProcessReporter))
    }

    /// Create a scheme that routes diagnostics to `reporter`.
    #[track_caller]
    pub fn with_reporter(config: HoppingConfig, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let built = config.validate().and_then(|_| {
            let rate_model = RateModel::new(config.attempt_frequency, config.barrier, config.boltzmann)?;
            let observables = HoppingObservables::new(config.lifetime_bin_width)?;
            Ok((rate_model, observables))
        });
        let (rate_model, observables) = match built {
            Ok(parts) => parts,
            Err(e) => {
                reporter.fatal(&e, Location::caller());
                return Err(e);
            }
        };

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            rate_model,
            clock: 0.0,
            observables,
            logger: None,
            reporter,
            records: Vec::new(),
            local_energies: Vec::new(),
        })
    }

    /// Open the lifetime and event files. Failure is fatal.
    #[track_caller]
    pub fn open_logs(&mut self, lifetimes_path: impl AsRef<Path>, events_path: impl AsRef<Path>) -> Result<()> {
        let logger = LifetimeLogger::create(lifetimes_path, events_path);
        let logger = self.escalate(logger)?;
        self.logger = Some(logger);
        Ok(())
    }

    pub fn set_logger(&mut self, logger: LifetimeLogger) {
        self.logger = Some(logger);
    }

    /// Report fatal errors, flushing the logs first since the reporter may
    /// exit the process without running destructors.
    #[track_caller]
    fn escalate<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                if let Some(logger) = self.logger.as_mut() {
                    if let Err(flush_error) = logger.flush() {
                        log::error!("Failed to flush hopping logs before fatal error: {}", flush_error);
                    }
                }
                self.reporter.fatal(e, Location::caller());
            }
        }
        result
    }

    #[inline]
    pub fn config(&self) -> &HoppingConfig {
        &self.config
    }

    #[inline]
    pub fn rate_model(&self) -> &RateModel {
        &self.rate_model
    }

    /// Simulation time accumulated over all steps.
    #[inline]
    pub fn clock(&self) -> f64 {
        self.clock
    }

    #[inline]
    pub fn observables(&self) -> &HoppingObservables {
        &self.observables
    }

    pub fn into_observables(self) -> HoppingObservables {
        self.observables
    }

    /// Rates computed in the latest step, in candidate order.
    pub fn last_rates(&self) -> &[RateRecord] {
        &self.records
    }

    #[track_caller]
    fn mean_or_warn(&self, variable: &Variable<f64>, what: &str) -> f64 {
        match variable.mean() {
            Ok(mean) => mean,
            Err(e) => {
                self.reporter
                    .warning(&format!("{} requested: {}", what, e), Location::caller());
                0.0
            }
        }
    }

    /// Mean local energy of applied events, 0 (with a warning) before any.
    #[track_caller]
    pub fn mean_local_energy(&self) -> f64 {
        self.mean_or_warn(&self.observables.energies, "mean local energy")
    }

    /// Mean number of candidate events per step, 0 (with a warning) before any step.
    #[track_caller]
    pub fn mean_candidates(&self) -> f64 {
        self.mean_or_warn(&self.observables.candidates, "mean candidate count")
    }

    /// Flush and close the logs, returning the accumulated observables.
    #[track_caller]
    pub fn finish(mut self) -> Result<HoppingObservables> {
        if let Some(logger) = self.logger.take() {
            let closed = logger.finish();
            self.escalate(closed)?;
        }
        Ok(self.into_observables())
    }

    /// Execute one KMC step against `network` using the BD data in `frame`.
    ///
    /// Fatal errors are reported before being returned; rejected mutations
    /// produce [`StepOutcome::Rejected`] and a warning.
    #[track_caller]
    pub fn step<N: NetworkMutator + ?Sized>(&mut self, network: &mut N, frame: &BdFrame) -> Result<StepOutcome> {
        let outcome = self.try_step(network, frame);
        self.escalate(outcome)
    }

    fn try_step<N: NetworkMutator + ?Sized>(&mut self, network: &mut N, frame: &BdFrame) -> Result<StepOutcome> {
        let budget = frame.elapsed_time;
        if !budget.is_finite() || budget < 0.0 {
            return Err(KmcError::invalid(format!(
                "elapsed time {} must be finite and non-negative",
                budget
            )));
        }
        // Validates the temperature even when there is nothing to rate
        self.rate_model.prefactor(frame.temperature)?;

        let events = network.candidates();
        self.records.clear();
        self.local_energies.clear();
        for event in events {
            let energy = self.local_energy(&*network, &event, frame)?;
            let record = self.rate_model.rate_record(event, energy, frame.temperature)?;
            self.records.push(record);
            self.local_energies.push(energy);
        }

        let mut escape_rates: BTreeMap<SlipSpringId, f64> = BTreeMap::new();
        for record in &self.records {
            if let Some(id) = record.event.spring() {
                *escape_rates.entry(id).or_insert(0.0) += record.rate;
            }
        }
        for (id, rate) in escape_rates {
            network.record_rate(id, rate);
        }

        let rates: Vec<f64> = self.records.iter().map(|r| r.rate).collect();
        let selection = select_event(&rates, budget, &mut self.rng)?;

        self.observables.steps += 1;
        self.observables.candidates.add(rates.len() as f64);

        let outcome = match selection {
            Selection::NoEvent => StepOutcome::NoEvent,
            Selection::Event { index, wait } => {
                let event = self.records[index].event;
                let energy = self.local_energies[index];
                let time = self.clock + wait;
                match self.apply(network, event, time) {
                    Ok((spring, lifetime)) => {
                        self.finalize(event, spring, time, wait, energy, lifetime)?;
                        StepOutcome::Applied {
                            event,
                            spring,
                            time,
                            wait,
                        }
                    }
                    Err(e @ KmcError::MutationRejected { .. }) => {
                        self.reporter.warning(&e.to_string(), Location::caller());
                        self.observables.rejections += 1;
                        StepOutcome::Rejected { event }
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if !matches!(outcome, StepOutcome::Applied { .. }) {
            self.observables.idle_steps += 1;
        }
        self.clock += budget;
        Ok(outcome)
    }

    /// Half the stretching-energy change caused by `event`.
    fn local_energy<N: NetworkMutator + ?Sized>(&self, network: &N, event: &Event, frame: &BdFrame) -> Result<f64> {
        let k = self.config.spring_constant;
        let stretch = |a: BeadId, b: BeadId| -> Result<f64> { Ok(0.5 * k * frame.distance_sq(a, b)?) };
        let lookup = |id: SlipSpringId| {
            network
                .spring(id)
                .ok_or_else(|| KmcError::invalid(format!("candidate refers to unknown slip-spring {}", id)))
        };

        let delta = match *event {
            Event::Hop { spring, end, to } => {
                let s = lookup(spring)?;
                let anchor = s.bead(end.other());
                stretch(to, anchor)? - stretch(s.bead(end), anchor)?
            }
            Event::Destroy { spring } => {
                let s = lookup(spring)?;
                -stretch(s.beads[0], s.beads[1])?
            }
            Event::Create { site } => stretch(site[0], site[1])?,
        };
        Ok(0.5 * delta)
    }

    /// Apply `event` through the collaborator and confirm it took effect.
    fn apply<N: NetworkMutator + ?Sized>(
        &mut self,
        network: &mut N,
        event: Event,
        time: f64,
    ) -> Result<(SlipSpringId, Option<LifetimeRecord>)> {
        match event {
            Event::Hop { spring, end, to } => {
                network.apply_hop(spring, end, to)?;
                match network.spring(spring) {
                    Some(s) if s.bead(end) == to => Ok((spring, None)),
                    _ => Err(KmcError::rejected(spring, "hop not reflected in topology")),
                }
            }
            Event::Destroy { spring } => {
                let destroyed = network.apply_destroy(spring)?;
                if network.spring(spring).is_some() {
                    return Err(KmcError::rejected(spring, "slip-spring still active after destroy"));
                }
                let record = LifetimeRecord {
                    id: spring,
                    created: destroyed.created_at,
                    destroyed: time,
                };
                Ok((spring, Some(record)))
            }
            Event::Create { site } => {
                let id = network.apply_create(site, time)?;
                if network.spring(id).is_none() {
                    return Err(KmcError::rejected(id, "created slip-spring not found"));
                }
                Ok((id, None))
            }
        }
    }

    fn finalize(
        &mut self,
        event: Event,
        spring: SlipSpringId,
        time: f64,
        wait: f64,
        energy: f64,
        lifetime: Option<LifetimeRecord>,
    ) -> Result<()> {
        let kind = event.kind();
        log::debug!("t = {:.6}: {} slip-spring {} (wait {:.3e})", time, kind, spring, wait);

        self.observables.wait_times.add(wait);
        self.observables.energies.add(energy);
        self.observables.events.record(kind);

        if let Some(record) = &lifetime {
            self.observables.lifetimes.add(record.lifetime(), 1)?;
        }
        if let Some(logger) = self.logger.as_mut() {
            logger.record_event(time, spring, kind)?;
            if let Some(record) = &lifetime {
                logger.record_lifetime(record)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HoppingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoppingScheme")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("logger", &self.logger)
            .finish()
    }
}

/// Simulate independent hopping trajectories on a frozen configuration in parallel.
///
/// Each trajectory starts from a clone of `network`, uses seed
/// `config.seed + trajectory_index` and runs `n_steps` steps on `frame`.
/// The per-trajectory observables are reduced with `join`.
pub fn simulate_trajectories_parallel<N>(
    config: &HoppingConfig,
    network: &N,
    frame: &BdFrame,
    n_steps: usize,
    n_samples: usize,
    reporter: Arc<dyn Reporter>,
) -> Result<HoppingObservables>
where
    N: NetworkMutator + Clone + Send + Sync,
{
    let parts: Vec<HoppingObservables> = (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let mut trajectory_config = config.clone();
            trajectory_config.seed = config.seed.wrapping_add(i as u64);
            let mut scheme = HoppingScheme::with_reporter(trajectory_config, reporter.clone())?;
            let mut replica = network.clone();
            for _ in 0..n_steps {
                scheme.step(&mut replica, frame)?;
            }
            Ok(scheme.into_observables())
        })
        .collect::<Result<Vec<_>>>()?;

    match HoppingObservables::reduce(parts) {
        Some(reduced) => reduced,
        None => HoppingObservables::new(config.lifetime_bin_width),
    }
}
