//! Device API seam.
//!
//! [`Backend`] mirrors the surface of GPU FFT libraries such as hcFFT and
//! cuFFT: opaque plan handles built per transform type and rank, one execute
//! entry point per data-type pair, device allocations addressed by opaque
//! pointers, and flat plus pitched (2-D) host/device copies. Every call reports
//! failure through a library [`Status`] code; callers turn those into fatal
//! [`BenchError`](crate::error::BenchError)s with [`check`](crate::error::check).

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::precision::{Direction, TransformType};

/// Opaque plan handle returned by the `plan_*d` entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanHandle(pub u32);

/// Opaque device address returned by [`Backend::alloc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr(pub u64);

/// Non-success result codes of the FFT library.
///
/// Numbering follows the hcFFT/cuFFT `*_SUCCESS = 0` convention so codes in
/// error messages can be looked up in vendor documentation.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    InvalidPlan = 1,
    AllocFailed = 2,
    InvalidType = 3,
    InvalidValue = 4,
    InternalError = 5,
    ExecFailed = 6,
    SetupFailed = 7,
    InvalidSize = 8,
    UnalignedData = 9,
    IncompleteParameterList = 10,
    InvalidDevice = 11,
    ParseError = 12,
    NoWorkspace = 13,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Symbolic name as spelled by the vendor headers.
    pub fn name(self) -> &'static str {
        match self {
            Status::InvalidPlan => "FFT_INVALID_PLAN",
            Status::AllocFailed => "FFT_ALLOC_FAILED",
            Status::InvalidType => "FFT_INVALID_TYPE",
            Status::InvalidValue => "FFT_INVALID_VALUE",
            Status::InternalError => "FFT_INTERNAL_ERROR",
            Status::ExecFailed => "FFT_EXEC_FAILED",
            Status::SetupFailed => "FFT_SETUP_FAILED",
            Status::InvalidSize => "FFT_INVALID_SIZE",
            Status::UnalignedData => "FFT_UNALIGNED_DATA",
            Status::IncompleteParameterList => "FFT_INCOMPLETE_PARAMETER_LIST",
            Status::InvalidDevice => "FFT_INVALID_DEVICE",
            Status::ParseError => "FFT_PARSE_ERROR",
            Status::NoWorkspace => "FFT_NO_WORKSPACE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name(), self.code())
    }
}

/// Description of one compute device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub description: String,
    pub version: u32,
    pub memory_mib: u64,
}

impl fmt::Display for DeviceInfo {
    /// `"<description>", "Version", <int>, "Memory [MiB]", <int>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\", \"Version\", {}, \"Memory [MiB]\", {}",
            self.description, self.version, self.memory_mib
        )
    }
}

/// FFT library plus device runtime.
///
/// All calls are treated as blocking. Pointers passed to the `exec_*` entry
/// points may be equal, which denotes an in-place transform; in that case a
/// real-valued buffer uses the padded row layout (`2 * (last / 2 + 1)` reals
/// per row) for multi-dimensional plans.
pub trait Backend {
    /// Short library name used in reports.
    fn title(&self) -> &'static str;

    /// Enumerate compute devices. Called once per run by the context.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Runtime setup on `device`.
    fn init(&mut self, device: usize) -> Result<(), Status>;

    /// Release runtime-global state.
    fn reset(&mut self) -> Result<(), Status>;

    /// Wait until all queued device work has finished.
    fn synchronize(&mut self) -> Result<(), Status> {
        Ok(())
    }

    fn alloc(&mut self, device: usize, bytes: usize) -> Result<DevicePtr, Status>;
    fn free(&mut self, ptr: DevicePtr) -> Result<(), Status>;

    /// Copy `src.len()` bytes to the start of `dst`.
    fn copy_to_device(&mut self, dst: DevicePtr, src: &[u8]) -> Result<(), Status>;
    /// Copy `dst.len()` bytes from the start of `src`.
    fn copy_to_host(&mut self, dst: &mut [u8], src: DevicePtr) -> Result<(), Status>;

    /// Pitched copy of `height` rows of `width` bytes; row `i` is read at
    /// `i * spitch` and written at `i * dpitch`.
    fn copy_2d_to_device(
        &mut self,
        dst: DevicePtr,
        dpitch: usize,
        src: &[u8],
        spitch: usize,
        width: usize,
        height: usize,
    ) -> Result<(), Status>;

    fn copy_2d_to_host(
        &mut self,
        dst: &mut [u8],
        dpitch: usize,
        src: DevicePtr,
        spitch: usize,
        width: usize,
        height: usize,
    ) -> Result<(), Status>;

    fn plan_1d(&mut self, nx: usize, ty: TransformType) -> Result<PlanHandle, Status>;
    fn plan_2d(&mut self, nx: usize, ny: usize, ty: TransformType) -> Result<PlanHandle, Status>;
    fn plan_3d(
        &mut self,
        nx: usize,
        ny: usize,
        nz: usize,
        ty: TransformType,
    ) -> Result<PlanHandle, Status>;

    /// Device memory the plan reserves for its own work area, in bytes.
    fn plan_work_size(&mut self, plan: PlanHandle) -> Result<usize, Status>;
    fn destroy_plan(&mut self, plan: PlanHandle) -> Result<(), Status>;

    fn exec_r2c(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr)
        -> Result<(), Status>;
    fn exec_c2r(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr)
        -> Result<(), Status>;
    fn exec_c2c(
        &mut self,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        direction: Direction,
    ) -> Result<(), Status>;
    fn exec_d2z(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr)
        -> Result<(), Status>;
    fn exec_z2d(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr)
        -> Result<(), Status>;
    fn exec_z2z(
        &mut self,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        direction: Direction,
    ) -> Result<(), Status>;
}
