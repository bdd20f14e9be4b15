//! Python bindings (`slipspring_kmc` extension module).

use std::sync::Arc;

use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;

use crate::error::{CapturingReporter, KmcError, Reporter};
use crate::hopping::{simulate_trajectories_parallel, BdFrame, ChainNetwork, HoppingConfig};
use crate::statistics::{Histogram, Partition, Variable};

impl From<KmcError> for PyErr {
    fn from(e: KmcError) -> Self {
        PyValueError::new_err(e.to_string())
    }
}

/// Running statistics of a sample.
///
/// # Returns
/// * Dict with keys "n", "mean", "std", "min", "max" (None when empty)
#[pyfunction]
fn running_statistics(py: Python<'_>, values: PyReadonlyArray1<f64>) -> PyResult<PyObject> {
    let mut variable = Variable::new();
    for &v in values.as_array().iter() {
        variable.add(v);
    }

    let dict = PyDict::new(py);
    dict.set_item("n", variable.n())?;
    match variable.statistics() {
        Ok(stats) => {
            dict.set_item("mean", stats.mean)?;
            dict.set_item("std", stats.std)?;
            dict.set_item("min", stats.min)?;
            dict.set_item("max", stats.max)?;
        }
        Err(_) => {
            for key in ["mean", "std", "min", "max"] {
                dict.set_item(key, py.None())?;
            }
        }
    }
    Ok(dict.into())
}

/// Bin a sample into a free (unbounded) histogram.
///
/// # Arguments
/// * `values` - Sample values
/// * `bin_width` - Width of each bin
/// * `reference` - Value at which bin 0 starts
/// * `offset` - Bin offset
/// * `normalize` - Return a probability density instead of counts
/// * `complete` - Fill gaps between observed bins with empty bins
///
/// # Returns
/// * Tuple of (bin_centers, bin_values)
#[pyfunction]
#[pyo3(signature = (values, bin_width, reference=0.0, offset=0.0, normalize=false, complete=true))]
fn free_histogram_data<'py>(
    py: Python<'py>,
    values: PyReadonlyArray1<f64>,
    bin_width: f64,
    reference: f64,
    offset: f64,
    normalize: bool,
    complete: bool,
) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>)> {
    let mut histogram = Histogram::new("free");
    histogram.init_free(bin_width, reference, false)?;
    histogram.set_offset(offset);
    for &v in values.as_array().iter() {
        histogram.add(v, 1)?;
    }
    let (x, y) = histogram.data(normalize, complete)?;
    Ok((PyArray1::from_vec(py, x), PyArray1::from_vec(py, y)))
}

/// Bin a sample into a fixed-range histogram.
///
/// # Returns
/// * Tuple of (bin_centers, bin_values, n_underflow, n_overflow)
#[pyfunction]
#[pyo3(signature = (values, min, max, nbin, normalize=false))]
fn fixed_histogram_data<'py>(
    py: Python<'py>,
    values: PyReadonlyArray1<f64>,
    min: f64,
    max: f64,
    nbin: usize,
    normalize: bool,
) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>, u64, u64)> {
    let mut histogram = Histogram::new("fixed");
    histogram.init_fixed(min, max, Partition::Bins(nbin))?;
    for &v in values.as_array().iter() {
        histogram.add(v, 1)?;
    }
    let (x, y) = histogram.data(normalize, true)?;
    Ok((
        PyArray1::from_vec(py, x),
        PyArray1::from_vec(py, y),
        histogram.underflow().n(),
        histogram.overflow().n(),
    ))
}

/// Run independent hopping trajectories on a frozen bead configuration.
///
/// # Arguments
/// * `positions` - (n_beads, 3) bead positions
/// * `chain_lengths` - Beads per chain; chains are numbered consecutively
/// * `springs` - Initial slip-springs as (bead, bead) pairs
/// * `creation_sites` - Bead pairs where slip-springs may be created
/// * `temperature` - Temperature
/// * `dt` - Time budget of each step
/// * `n_steps` - Steps per trajectory
/// * `n_samples` - Number of trajectories
/// * `seed` - RNG seed (each trajectory gets seed + trajectory_index)
///
/// # Returns
/// * Dict of event counts, averages and the lifetime histogram
#[pyfunction]
#[pyo3(signature = (positions, chain_lengths, springs, creation_sites, temperature, dt, n_steps, n_samples, seed, attempt_frequency=1.0, barrier=0.0, spring_constant=1.0, lifetime_bin_width=1.0))]
fn simulate_frozen_hopping<'py>(
    py: Python<'py>,
    positions: PyReadonlyArray2<f64>,
    chain_lengths: Vec<usize>,
    springs: Vec<(usize, usize)>,
    creation_sites: Vec<(usize, usize)>,
    temperature: f64,
    dt: f64,
    n_steps: usize,
    n_samples: usize,
    seed: u64,
    attempt_frequency: f64,
    barrier: f64,
    spring_constant: f64,
    lifetime_bin_width: f64,
) -> PyResult<PyObject> {
    let mut network = ChainNetwork::new(&chain_lengths)?;
    for (a, b) in springs {
        network.add_spring([a, b], 0.0)?;
    }
    for (a, b) in creation_sites {
        network.add_creation_site([a, b])?;
    }

    let config = HoppingConfig {
        attempt_frequency,
        barrier,
        boltzmann: 1.0,
        spring_constant,
        lifetime_bin_width,
        seed,
    };
    let frame = BdFrame::new(positions.as_array(), temperature, dt)?;
    let reporter: Arc<dyn Reporter> = Arc::new(CapturingReporter::new());
    let obs = simulate_trajectories_parallel(&config, &network, &frame, n_steps, n_samples, reporter)?;

    let dict = PyDict::new(py);
    dict.set_item("steps", obs.steps)?;
    dict.set_item("idle_steps", obs.idle_steps)?;
    dict.set_item("rejections", obs.rejections)?;
    dict.set_item("n_create", obs.events.create)?;
    dict.set_item("n_hop", obs.events.hop)?;
    dict.set_item("n_destroy", obs.events.destroy)?;
    dict.set_item("mean_wait_time", obs.wait_times.mean().ok())?;
    dict.set_item("mean_local_energy", obs.energies.mean().ok())?;
    dict.set_item("mean_candidates", obs.candidates.mean().ok())?;

    let (x, y) = obs.lifetimes.data(false, true)?;
    dict.set_item("lifetime_bins", PyArray1::from_vec(py, x))?;
    dict.set_item("lifetime_counts", PyArray1::from_vec(py, y))?;

    Ok(dict.into())
}

/// Python module definition
#[pymodule]
fn slipspring_kmc(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(running_statistics, m)?)?;
    m.add_function(wrap_pyfunction!(free_histogram_data, m)?)?;
    m.add_function(wrap_pyfunction!(fixed_histogram_data, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_frozen_hopping, m)?)?;
    Ok(())
}
