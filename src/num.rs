//! Scalar and complex storage types shared by the host and device sides.
//!
//! Device buffers are untyped byte ranges, so every element type crossing the
//! host/device boundary has to be plain old data. [`Complex`] is `repr(C)`
//! with two `T` fields, which keeps it layout-compatible with the interleaved
//! `{re, im}` pairs FFT libraries expect.

use bytemuck::{Pod, Zeroable};

// Minimal float trait for the two supported precisions
pub trait Float:
    Pod
    + Default
    + PartialEq
    + PartialOrd
    + core::fmt::Debug
    + core::fmt::Display
    + core::ops::Add<Output = Self>
    + core::ops::Sub<Output = Self>
    + core::ops::Mul<Output = Self>
    + core::ops::Div<Output = Self>
    + core::ops::Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    fn zero() -> Self;
    fn one() -> Self;
    fn from_f64(x: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Float for f32 {
    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_f64(x: f64) -> Self {
        x as f32
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Float for f64 {
    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_f64(x: f64) -> Self {
        x
    }
    fn to_f64(self) -> f64 {
        self
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex<T: Float> {
    pub re: T,
    pub im: T,
}

impl<T: Float> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
    pub fn zero() -> Self {
        Self {
            re: T::zero(),
            im: T::zero(),
        }
    }
}

// SAFETY: `repr(C)` struct of two identical `Pod` fields has no padding and
// every bit pattern is valid.
unsafe impl<T: Float> Zeroable for Complex<T> {}
unsafe impl<T: Float> Pod for Complex<T> {}

pub type Complex32 = Complex<f32>;
pub type Complex64 = Complex<f64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_is_two_scalars_wide() {
        assert_eq!(core::mem::size_of::<Complex32>(), 8);
        assert_eq!(core::mem::size_of::<Complex64>(), 16);
        assert_eq!(core::mem::align_of::<Complex64>(), core::mem::align_of::<f64>());
    }

    #[test]
    fn complex_bytes_are_interleaved() {
        let values = [Complex32::new(1.0, -2.0), Complex32::new(3.0, 4.0)];
        let floats: &[f32] = bytemuck::cast_slice(&values);
        assert_eq!(floats, &[1.0, -2.0, 3.0, 4.0]);
    }
}
