//! Precision traits: scalar precision → concrete types, transform types and
//! executors.
//!
//! Each precision names three transform-type identifiers (real forward,
//! complex, real backward) and two executors. The engine picks the identifier
//! and the executor call shape from its [`Variant`](crate::variant::Variant);
//! everything precision specific lives in the two `impl Precision` blocks.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, DevicePtr, PlanHandle};
use crate::error::{check, BenchError};
use crate::num::{Complex, Float};

/// Transform data-type pair a plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformType {
    R2C,
    C2R,
    C2C,
    D2Z,
    Z2D,
    Z2Z,
}

impl TransformType {
    pub fn name(self) -> &'static str {
        match self {
            TransformType::R2C => "R2C",
            TransformType::C2R => "C2R",
            TransformType::C2C => "C2C",
            TransformType::D2Z => "D2Z",
            TransformType::Z2D => "Z2D",
            TransformType::Z2Z => "Z2Z",
        }
    }

    /// `true` for the real-to-complex and complex-to-real types.
    pub fn is_real(self) -> bool {
        !matches!(self, TransformType::C2C | TransformType::Z2Z)
    }

    pub fn is_double(self) -> bool {
        matches!(
            self,
            TransformType::D2Z | TransformType::Z2D | TransformType::Z2Z
        )
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction argument of the complex-to-complex entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

/// Runtime tag for the two supported precisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrecisionKind {
    Single,
    Double,
}

impl PrecisionKind {
    pub const ALL: [PrecisionKind; 2] = [PrecisionKind::Single, PrecisionKind::Double];

    pub fn name(self) -> &'static str {
        match self {
            PrecisionKind::Single => "float",
            PrecisionKind::Double => "double",
        }
    }
}

impl fmt::Display for PrecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrecisionKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float" | "single" | "f32" => Ok(PrecisionKind::Single),
            "double" | "f64" => Ok(PrecisionKind::Double),
            other => Err(BenchError::Config(format!("unknown precision `{other}`"))),
        }
    }
}

/// One direction of transform execution.
///
/// `real` is the real-valued call shape (forward: real in, complex out;
/// backward: complex in, real out), `complex` the complex-to-complex one.
pub trait Execute {
    fn real<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError>;

    fn complex<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError>;
}

/// Type bundle for one scalar precision.
pub trait Precision: Float {
    type Real: Float;
    type Complex: bytemuck::Pod;
    type ExecuteForward: Execute;
    type ExecuteBackward: Execute;

    const KIND: PrecisionKind;
    const REAL_FORWARD: TransformType;
    const COMPLEX: TransformType;
    const REAL_BACKWARD: TransformType;
}

pub struct ForwardSingle;
pub struct BackwardSingle;
pub struct ForwardDouble;
pub struct BackwardDouble;

impl Execute for ForwardSingle {
    fn real<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(backend.exec_r2c(plan, input, output), "exec_r2c")
    }

    fn complex<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(
            backend.exec_c2c(plan, input, output, Direction::Forward),
            "exec_c2c",
        )
    }
}

impl Execute for BackwardSingle {
    fn real<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(backend.exec_c2r(plan, input, output), "exec_c2r")
    }

    fn complex<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(
            backend.exec_c2c(plan, input, output, Direction::Backward),
            "exec_c2c",
        )
    }
}

impl Execute for ForwardDouble {
    fn real<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(backend.exec_d2z(plan, input, output), "exec_d2z")
    }

    fn complex<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(
            backend.exec_z2z(plan, input, output, Direction::Forward),
            "exec_z2z",
        )
    }
}

impl Execute for BackwardDouble {
    fn real<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(backend.exec_z2d(plan, input, output), "exec_z2d")
    }

    fn complex<B: Backend + ?Sized>(
        backend: &mut B,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), BenchError> {
        check(
            backend.exec_z2z(plan, input, output, Direction::Backward),
            "exec_z2z",
        )
    }
}

impl Precision for f32 {
    type Real = f32;
    type Complex = Complex<f32>;
    type ExecuteForward = ForwardSingle;
    type ExecuteBackward = BackwardSingle;

    const KIND: PrecisionKind = PrecisionKind::Single;
    const REAL_FORWARD: TransformType = TransformType::R2C;
    const COMPLEX: TransformType = TransformType::C2C;
    const REAL_BACKWARD: TransformType = TransformType::C2R;
}

impl Precision for f64 {
    type Real = f64;
    type Complex = Complex<f64>;
    type ExecuteForward = ForwardDouble;
    type ExecuteBackward = BackwardDouble;

    const KIND: PrecisionKind = PrecisionKind::Double;
    const REAL_FORWARD: TransformType = TransformType::D2Z;
    const COMPLEX: TransformType = TransformType::Z2Z;
    const REAL_BACKWARD: TransformType = TransformType::Z2D;
}
