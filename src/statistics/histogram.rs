//! One-dimensional histograms with fixed or free (sparse, unbounded) binning.
//!
//! Two flavours are supported:
//! - [`HistogramType::Fixed`]: a static `[min, max)` range split into `nbin`
//!   bins of width `d`. Values outside the range are counted in separate
//!   underflow/overflow statistics and never binned.
//! - [`HistogramType::Free`]: bins are keyed by the integer
//!   `floor((value - reference) / d + offset)` and created on demand.
//!
//! Both merge with [`Histogram::join`] when compatible.
//!
//! Misuse (adding to an uninitialized histogram, joining incompatible ones)
//! is returned as a [`KmcError`]; routing it to a
//! [`Reporter`](crate::error::Reporter) is left to the caller.

use std::collections::BTreeMap;
use std::io::Write;

use super::sample::Sample;
use super::variable::Variable;
use crate::error::{ensure_finite, KmcError, Result};

/// Widest free-histogram key span that `data(_, true)` will gap-fill.
pub const MAX_COMPLETE_BINS: usize = 1 << 24;

/// Histogram flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistogramType {
    Fixed,
    Free,
    Uninitialized,
}

/// How a fixed range is divided into bins. Exactly one of the two is given.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Partition {
    /// Number of bins; the width follows from the range.
    Bins(usize),
    /// Bin width; the bin count is the smallest one covering the range.
    Width(f64),
}

#[derive(Clone, Debug)]
pub struct Histogram<T: Sample = f64> {
    name: String,
    kind: HistogramType,
    reference: T,
    d: f64,
    min: T,
    max: T,
    nbin: usize,
    bins: Vec<f64>,
    map: BTreeMap<i64, f64>,
    offset: f64,
    add_underflow: bool,
    variable: Variable<T>,
    under: Variable<T>,
    over: Variable<T>,
}

impl<T: Sample> Default for Histogram<T> {
    fn default() -> Self {
        Self::new("")
    }
}

impl<T: Sample> Histogram<T> {
    /// Create an uninitialized histogram.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: HistogramType::Uninitialized,
            reference: T::zero(),
            d: 0.0,
            min: T::zero(),
            max: T::zero(),
            nbin: 0,
            bins: Vec::new(),
            map: BTreeMap::new(),
            offset: 0.0,
            add_underflow: false,
            variable: Variable::new(),
            under: Variable::new(),
            over: Variable::new(),
        }
    }

    /// True if `h1` and `h2` can be joined: same type and bin width, plus the
    /// same range and bin count (fixed) or reference and offset (free).
    pub fn compatible(h1: &Histogram<T>, h2: &Histogram<T>) -> bool {
        Self::check_compatible(h1, h2).is_ok()
    }

    fn check_compatible(h1: &Histogram<T>, h2: &Histogram<T>) -> Result<()> {
        if h1.kind == HistogramType::Uninitialized || h2.kind == HistogramType::Uninitialized {
            return Err(KmcError::incompatible(format!(
                "'{}' or '{}' is uninitialized",
                h1.name, h2.name
            )));
        }
        if h1.kind != h2.kind {
            return Err(KmcError::incompatible(format!(
                "type {:?} vs {:?}",
                h1.kind, h2.kind
            )));
        }
        if h1.d != h2.d {
            return Err(KmcError::incompatible(format!(
                "bin width {} vs {}",
                h1.d, h2.d
            )));
        }
        if h1.kind == HistogramType::Fixed
            && (h1.min != h2.min || h1.max != h2.max || h1.nbin != h2.nbin)
        {
            return Err(KmcError::incompatible(format!(
                "range [{}, {}) x {} vs [{}, {}) x {}",
                h1.min, h1.max, h1.nbin, h2.min, h2.max, h2.nbin
            )));
        }
        if h1.kind == HistogramType::Free && (h1.reference != h2.reference || h1.offset != h2.offset) {
            return Err(KmcError::incompatible(format!(
                "reference {} (offset {}) vs {} (offset {})",
                h1.reference, h1.offset, h2.reference, h2.offset
            )));
        }
        Ok(())
    }

    /// Configure a fixed histogram over `[min, max)`.
    ///
    /// With [`Partition::Width`] the range is extended upward, if needed, to
    /// a whole number of bins.
    pub fn init_fixed(&mut self, min: T, max: T, partition: Partition) -> Result<()> {
        let lo = ensure_finite("histogram minimum", min.to_f64())?;
        let hi = ensure_finite("histogram maximum", max.to_f64())?;
        if lo >= hi {
            return Err(KmcError::invalid(format!(
                "histogram '{}' range [{}, {}) is empty",
                self.name, min, max
            )));
        }

        let (nbin, d, max) = match partition {
            Partition::Bins(nbin) => {
                if nbin == 0 {
                    return Err(KmcError::invalid(format!(
                        "histogram '{}' needs at least one bin",
                        self.name
                    )));
                }
                (nbin, (hi - lo) / nbin as f64, max)
            }
            Partition::Width(d) => {
                if !(d > 0.0) || !d.is_finite() {
                    return Err(KmcError::invalid(format!(
                        "histogram '{}' bin width {} must be positive",
                        self.name, d
                    )));
                }
                let ratio = (hi - lo) / d;
                let rounded = ratio.round();
                let nbin = if (ratio - rounded).abs() <= 1e-9 * rounded.max(1.0) {
                    rounded as usize
                } else {
                    ratio.ceil() as usize
                };
                let nbin = nbin.max(1);
                let max = if (lo + nbin as f64 * d - hi).abs() <= 1e-9 * d {
                    max
                } else {
                    T::from_f64(lo + nbin as f64 * d)
                };
                (nbin, d, max)
            }
        };

        if !(d > 0.0) {
            return Err(KmcError::invalid(format!(
                "histogram '{}' bin width {} must be positive",
                self.name, d
            )));
        }

        self.kind = HistogramType::Fixed;
        self.min = min;
        self.max = max;
        self.reference = min;
        self.nbin = nbin;
        self.d = d;
        self.bins = vec![0.0; nbin];
        self.map.clear();
        self.clear_statistics();
        Ok(())
    }

    /// Configure a free histogram with bins of width `d` indexed relative to
    /// `reference`.
    ///
    /// With `add_underflow` set, values below the reference are also recorded
    /// in the underflow statistic (they are binned either way).
    pub fn init_free(&mut self, d: f64, reference: T, add_underflow: bool) -> Result<()> {
        if !(d > 0.0) || !d.is_finite() {
            return Err(KmcError::invalid(format!(
                "histogram '{}' bin width {} must be positive",
                self.name, d
            )));
        }
        ensure_finite("histogram reference value", reference.to_f64())?;

        self.kind = HistogramType::Free;
        self.d = d;
        self.reference = reference;
        self.add_underflow = add_underflow;
        self.nbin = 0;
        self.bins.clear();
        self.map.clear();
        self.clear_statistics();
        Ok(())
    }

    /// Shift free-bin indexing and the reported bin centers by `offset` bins.
    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.kind == HistogramType::Uninitialized {
            Err(KmcError::uninitialized(self.name.clone()))
        } else {
            Ok(())
        }
    }

    fn free_key(&self, x: f64) -> Result<i64> {
        let key = ((x - self.reference.to_f64()) / self.d + self.offset).floor();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if key.is_finite() && key >= i64::MIN as f64 && key < i64::MAX as f64 {
            Ok(key as i64)
        } else {
            Err(KmcError::numeric(format!(
                "value {} has no bin index in histogram '{}' (width {})",
                x, self.name, self.d
            )))
        }
    }

    /// Number of keys in `lo..=hi`, which can exceed `usize` for free histograms.
    fn span(lo: i64, hi: i64) -> u128 {
        (i128::from(hi) - i128::from(lo) + 1) as u128
    }

    /// Add `value` with the given `multiplicity`.
    pub fn add(&mut self, value: T, multiplicity: u32) -> Result<()> {
        self.ensure_initialized()?;
        let x = ensure_finite("histogram value", value.to_f64())?;
        let weight = f64::from(multiplicity);

        match self.kind {
            HistogramType::Fixed => {
                let index = ((x - self.min.to_f64()) / self.d).floor();
                if index < 0.0 {
                    self.under.set(value, multiplicity);
                } else if index >= self.nbin as f64 {
                    self.over.set(value, multiplicity);
                } else {
                    self.bins[index as usize] += weight;
                    self.variable.set(value, multiplicity);
                }
            }
            HistogramType::Free => {
                let key = self.free_key(x)?;
                *self.map.entry(key).or_insert(0.0) += weight;
                self.variable.set(value, multiplicity);
                if self.add_underflow && value < self.reference {
                    self.under.set(value, multiplicity);
                }
            }
            HistogramType::Uninitialized => unreachable!("checked by ensure_initialized"),
        }
        Ok(())
    }

    /// Add `value` directly to bin `n`, bypassing index computation.
    pub fn add_at(&mut self, n: i64, value: T, multiplicity: u32) -> Result<()> {
        self.ensure_initialized()?;
        let weight = f64::from(multiplicity);

        match self.kind {
            HistogramType::Fixed => {
                if n < 0 || n as usize >= self.nbin {
                    return Err(KmcError::invalid(format!(
                        "bin {} outside [0, {}) of histogram '{}'",
                        n, self.nbin, self.name
                    )));
                }
                self.bins[n as usize] += weight;
            }
            HistogramType::Free => {
                *self.map.entry(n).or_insert(0.0) += weight;
            }
            HistogramType::Uninitialized => unreachable!("checked by ensure_initialized"),
        }
        self.variable.set(value, multiplicity);
        Ok(())
    }

    /// Merge `h` into `self`. Incompatible histograms are an error.
    pub fn join(&mut self, h: &Histogram<T>) -> Result<()> {
        Self::check_compatible(self, h)?;

        match self.kind {
            HistogramType::Fixed => {
                for (bin, other) in self.bins.iter_mut().zip(h.bins.iter()) {
                    *bin += other;
                }
            }
            HistogramType::Free => {
                for (&key, &count) in &h.map {
                    *self.map.entry(key).or_insert(0.0) += count;
                }
            }
            HistogramType::Uninitialized => unreachable!("checked by check_compatible"),
        }
        self.variable.join(&h.variable);
        self.under.join(&h.under);
        self.over.join(&h.over);
        Ok(())
    }

    pub fn mean(&self) -> Result<f64> {
        self.variable.mean()
    }

    pub fn std(&self) -> Result<f64> {
        self.variable.std()
    }

    fn clear_statistics(&mut self) {
        self.variable.reset();
        self.under.reset();
        self.over.reset();
    }

    /// Clear bins and statistics, keeping the configuration.
    pub fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0.0);
        self.map.clear();
        self.clear_statistics();
    }

    fn bin_center(&self, n: i64) -> f64 {
        match self.kind {
            HistogramType::Free => {
                self.reference.to_f64() + (n as f64 - self.offset + 0.5) * self.d
            }
            _ => self.min.to_f64() + (n as f64 + 0.5 + self.offset) * self.d,
        }
    }

    /// Bin centers and bin values.
    ///
    /// `normalize` divides each value by `N * d` to give a density. For free
    /// histograms `complete` fills the gaps between the lowest and highest
    /// observed keys with empty bins (at most [`MAX_COMPLETE_BINS`]);
    /// otherwise only observed bins are emitted.
    pub fn data(&self, normalize: bool, complete: bool) -> Result<(Vec<f64>, Vec<f64>)> {
        self.ensure_initialized()?;

        let (x, mut y): (Vec<f64>, Vec<f64>) = match self.kind {
            HistogramType::Fixed => (0..self.nbin)
                .map(|i| (self.bin_center(i as i64), self.bins[i]))
                .unzip(),
            HistogramType::Free if complete => match self.bin_range() {
                Some((lo, hi)) if Self::span(lo, hi) > MAX_COMPLETE_BINS as u128 => {
                    return Err(KmcError::invalid(format!(
                        "histogram '{}' spans {} bins, more than {} can be gap-filled",
                        self.name,
                        Self::span(lo, hi),
                        MAX_COMPLETE_BINS
                    )));
                }
                Some((lo, hi)) => (lo..=hi)
                    .map(|k| (self.bin_center(k), self.map.get(&k).copied().unwrap_or(0.0)))
                    .unzip(),
                None => (Vec::new(), Vec::new()),
            },
            HistogramType::Free => self
                .map
                .iter()
                .map(|(&k, &count)| (self.bin_center(k), count))
                .unzip(),
            HistogramType::Uninitialized => unreachable!("checked by ensure_initialized"),
        };

        if normalize {
            let n = self.variable.n();
            if n == 0 {
                log::warn!("histogram '{}' is empty; data left unnormalized", self.name);
            } else {
                let norm = n as f64 * self.d;
                y.iter_mut().for_each(|v| *v /= norm);
            }
        }
        Ok((x, y))
    }

    /// Number of bins; for free histograms `complete` counts the gaps too,
    /// saturating at `usize::MAX`.
    pub fn number_of_bins(&self, complete: bool) -> usize {
        match self.kind {
            HistogramType::Fixed => self.nbin,
            HistogramType::Free if complete => self
                .bin_range()
                .map(|(lo, hi)| usize::try_from(Self::span(lo, hi)).unwrap_or(usize::MAX))
                .unwrap_or(0),
            HistogramType::Free => self.map.len(),
            HistogramType::Uninitialized => 0,
        }
    }

    /// Lowest and highest bin index.
    pub fn bin_range(&self) -> Option<(i64, i64)> {
        match self.kind {
            HistogramType::Fixed => Some((0, self.nbin as i64 - 1)),
            HistogramType::Free => {
                let lo = *self.map.keys().next()?;
                let hi = *self.map.keys().next_back()?;
                Some((lo, hi))
            }
            HistogramType::Uninitialized => None,
        }
    }

    /// Lower edge of the first bin and upper edge of the last bin.
    pub fn bin_value_range(&self) -> Option<(f64, f64)> {
        let (lo, hi) = self.bin_range()?;
        let half = 0.5 * self.d;
        Some((self.bin_center(lo) - half, self.bin_center(hi) + half))
    }

    /// Smallest and largest binned value.
    pub fn value_range(&self) -> Option<(T, T)> {
        Some((self.variable.min()?, self.variable.max()?))
    }

    /// Histogram data as `"<x> <y>"` lines (free histograms are completed).
    pub fn lines(&self, normalize: bool) -> Result<Vec<String>> {
        let (x, y) = self.data(normalize, true)?;
        Ok(x.iter()
            .zip(y.iter())
            .map(|(x, y)| format!("{} {}", x, y))
            .collect())
    }

    /// Write the histogram data as two-column text.
    pub fn write<W: Write>(&self, writer: &mut W, normalize: bool) -> Result<()> {
        for line in self.lines(normalize)? {
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> HistogramType {
        self.kind
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.kind != HistogramType::Uninitialized
    }

    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.d
    }

    #[inline]
    pub fn reference_value(&self) -> T {
        self.reference
    }

    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Number of binned values (multiplicities included).
    #[inline]
    pub fn number_of_values(&self) -> u64 {
        self.variable.n()
    }

    #[inline]
    pub fn variable(&self) -> &Variable<T> {
        &self.variable
    }

    #[inline]
    pub fn underflow(&self) -> &Variable<T> {
        &self.under
    }

    #[inline]
    pub fn overflow(&self) -> &Variable<T> {
        &self.over
    }
}
