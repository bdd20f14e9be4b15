//! Read-only view over the data a Brownian-dynamics integrator hands to the
//! hopping scheme for a single call.

use ndarray::ArrayView2;

use super::network::BeadId;
use crate::error::{ensure_finite, KmcError, Result};

/// Positions, temperature and time budget of one BD step.
///
/// The view borrows the integrator's position buffer (one row of `x, y, z`
/// per bead) for the duration of the step only.
#[derive(Clone, Copy, Debug)]
pub struct BdFrame<'a> {
    positions: ArrayView2<'a, f64>,
    pub temperature: f64,
    /// Time available to the KMC step.
    pub elapsed_time: f64,
}

impl<'a> BdFrame<'a> {
    /// Wrap an `(n_beads, 3)` position array.
    pub fn new(positions: ArrayView2<'a, f64>, temperature: f64, elapsed_time: f64) -> Result<Self> {
        if positions.ncols() != 3 {
            return Err(KmcError::invalid(format!(
                "position array must have 3 columns, got {}",
                positions.ncols()
            )));
        }
        Ok(Self {
            positions,
            temperature,
            elapsed_time,
        })
    }

    /// Wrap a flat `[x0, y0, z0, x1, ...]` buffer.
    pub fn from_flat(positions: &'a [f64], temperature: f64, elapsed_time: f64) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(KmcError::invalid(format!(
                "flat position buffer length {} is not a multiple of 3",
                positions.len()
            )));
        }
        let view = ArrayView2::from_shape((positions.len() / 3, 3), positions)
            .map_err(|e| KmcError::invalid(e.to_string()))?;
        Self::new(view, temperature, elapsed_time)
    }

    #[inline]
    pub fn n_beads(&self) -> usize {
        self.positions.nrows()
    }

    /// Position of `bead`, bounds-checked.
    pub fn position(&self, bead: BeadId) -> Result<[f64; 3]> {
        if bead >= self.n_beads() {
            return Err(KmcError::invalid(format!(
                "bead {} outside position array of {} beads",
                bead,
                self.n_beads()
            )));
        }
        let row = self.positions.row(bead);
        Ok([row[0], row[1], row[2]])
    }

    /// Squared distance between two beads.
    pub fn distance_sq(&self, a: BeadId, b: BeadId) -> Result<f64> {
        let ra = self.position(a)?;
        let rb = self.position(b)?;
        let d2 = ra
            .iter()
            .zip(rb.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>();
        ensure_finite("bead separation", d2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_distance_and_bounds() {
        let positions = array![[0.0, 0.0, 0.0], [1.0, 2.0, 2.0]];
        let frame = BdFrame::new(positions.view(), 1.0, 0.1).unwrap();
        assert_eq!(frame.n_beads(), 2);
        assert_eq!(frame.distance_sq(0, 1).unwrap(), 9.0);
        assert!(matches!(frame.position(2), Err(KmcError::InvalidParameter(_))));
    }

    #[test]
    fn test_from_flat() {
        let flat = [0.0, 0.0, 0.0, 3.0, 4.0, 0.0];
        let frame = BdFrame::from_flat(&flat, 1.0, 0.1).unwrap();
        assert_eq!(frame.n_beads(), 2);
        assert_eq!(frame.distance_sq(1, 0).unwrap(), 25.0);
        assert!(BdFrame::from_flat(&flat[..4], 1.0, 0.1).is_err());
    }

    #[test]
    fn test_wrong_column_count() {
        let positions = array![[0.0, 0.0], [1.0, 1.0]];
        assert!(BdFrame::new(positions.view(), 1.0, 0.1).is_err());
    }

    #[test]
    fn test_non_finite_position() {
        let positions = array![[0.0, 0.0, 0.0], [f64::NAN, 0.0, 0.0]];
        let frame = BdFrame::new(positions.view(), 1.0, 0.1).unwrap();
        assert!(matches!(frame.distance_sq(0, 1), Err(KmcError::NumericAnomaly(_))));
    }
}
