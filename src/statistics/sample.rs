//! Numeric value types accepted by [`Variable`](super::Variable) and
//! [`Histogram`](super::Histogram).

use std::fmt::{Debug, Display};
use std::ops::{Add, Mul};

/// Ordered arithmetic value that can be accumulated and binned.
pub trait Sample:
    Copy + PartialOrd + Debug + Display + Add<Output = Self> + Mul<Output = Self> + Send + Sync + 'static
{
    fn zero() -> Self;

    fn to_f64(self) -> f64;

    /// Lossy conversion back from `f64` (integers truncate toward zero).
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn zero() -> Self {
                    0 as $t
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_sample!(f32, f64, i32, i64, u32, u64);
