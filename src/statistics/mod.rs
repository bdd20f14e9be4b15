//! Online statistics: running moments and binned accumulation.
//!
//! Both primitives are mergeable, so accumulation can happen in private
//! per-thread or per-window instances that are joined afterwards.

pub mod sample;
pub mod variable;
pub mod histogram;

pub use sample::Sample;
pub use variable::{SimpleStatistics, Variable};
pub use histogram::{Histogram, HistogramType, Partition, MAX_COMPLETE_BINS};
