//! Transform engine: per-variant device buffers, plan handle and lifecycle.
//!
//! One [`TransformEngine`] serves any of the 24 {variant × precision × rank}
//! combinations. The variant is a runtime tag, the precision a type
//! parameter; sizes, transform types and executor call shapes are derived
//! from both in one place each:
//!
//! - buffer sizes in [`TransformEngine::new`],
//! - transform types in [`TransformEngine::forward_type`] /
//!   [`TransformEngine::backward_type`],
//! - executor shape in [`TransformEngine::execute_forward`] /
//!   [`TransformEngine::execute_backward`].
//!
//! Lifecycle: `allocate → init_forward_plan → upload → execute_forward →
//! init_backward_plan → execute_backward → download → destroy`. Real
//! variants swap the plan in `init_backward_plan`, so the forward execution
//! must happen before it.

use core::marker::PhantomData;
use core::mem;

use bytemuck::Pod;
use log::{debug, warn};

use crate::backend::{Backend, DevicePtr, PlanHandle};
use crate::error::{check, BenchError};
use crate::extent::Extent;
use crate::precision::{Execute, Precision, TransformType};
use crate::variant::Variant;

/// Device memory held by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Buffers {
    Unallocated,
    /// The transform buffer is the data buffer.
    InPlace { data: DevicePtr },
    OutOfPlace {
        data: DevicePtr,
        transform: DevicePtr,
    },
    Released,
}

impl Buffers {
    fn state(&self) -> &'static str {
        match self {
            Buffers::Unallocated => "unallocated",
            Buffers::InPlace { .. } | Buffers::OutOfPlace { .. } => "allocated",
            Buffers::Released => "destroyed",
        }
    }

    /// `(data, transform)`; both are the same pointer for in-place layouts.
    fn pointers(&self) -> Option<(DevicePtr, DevicePtr)> {
        match *self {
            Buffers::InPlace { data } => Some((data, data)),
            Buffers::OutOfPlace { data, transform } => Some((data, transform)),
            Buffers::Unallocated | Buffers::Released => None,
        }
    }
}

/// Plan handle together with the direction it can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanState {
    Empty,
    /// Real-to-complex plan.
    Forward(PlanHandle),
    /// Complex-to-real plan that replaced the forward one.
    Backward(PlanHandle),
    /// Complex-to-complex plan executing both directions.
    Shared(PlanHandle),
}

impl PlanState {
    fn handle(self) -> Option<PlanHandle> {
        match self {
            PlanState::Empty => None,
            PlanState::Forward(h) | PlanState::Backward(h) | PlanState::Shared(h) => Some(h),
        }
    }

    fn state(self) -> &'static str {
        match self {
            PlanState::Empty => "no plan exists",
            PlanState::Forward(_) => "the forward plan exists",
            PlanState::Backward(_) => "the backward plan exists",
            PlanState::Shared(_) => "the shared plan exists",
        }
    }
}

/// Build a plan through the rank-specific entry point.
fn make_plan<B: Backend + ?Sized>(
    backend: &mut B,
    extent: &Extent,
    ty: TransformType,
) -> Result<PlanHandle, BenchError> {
    match *extent.as_slice() {
        [nx] => check(backend.plan_1d(nx, ty), "plan_1d"),
        [nx, ny] => check(backend.plan_2d(nx, ny, ty), "plan_2d"),
        [nx, ny, nz] => check(backend.plan_3d(nx, ny, nz, ty), "plan_3d"),
        _ => Err(BenchError::InvalidExtent(format!("{extent} has no plan entry point"))),
    }
}

/// `(padded elements, data bytes, transform bytes)` for `variant` over `extent`.
///
/// Fails when a byte count, or their sum, does not fit in `usize`.
pub(crate) fn buffer_sizes<P: Precision>(
    variant: Variant,
    extent: &Extent,
) -> Result<(Option<usize>, usize, usize), BenchError> {
    let n = extent.len();
    let n_padded = variant
        .requires_padding(extent.ndim())
        .then(|| n / extent.last() * (extent.last() / 2 + 1));
    let element = if variant.is_complex() {
        mem::size_of::<P::Complex>()
    } else {
        mem::size_of::<P::Real>()
    };
    let data_size = match n_padded {
        Some(padded) => padded.checked_mul(2 * element),
        None => n.checked_mul(element),
    };
    let data_transform_size = if variant.is_inplace() {
        Some(0)
    } else {
        n.checked_mul(mem::size_of::<P::Complex>())
    };
    data_size
        .zip(data_transform_size)
        .filter(|(data, transform)| data.checked_add(*transform).is_some())
        .map(|(data, transform)| (n_padded, data, transform))
        .ok_or_else(|| {
            BenchError::InvalidExtent(format!(
                "{variant} buffers for {extent} exceed the address space"
            ))
        })
}

/// Buffers and plan for one variant, precision and extent on a borrowed backend.
pub struct TransformEngine<'b, B: Backend + ?Sized, P: Precision> {
    backend: &'b mut B,
    device: usize,
    variant: Variant,
    extent: Extent,
    n: usize,
    n_padded: Option<usize>,
    data_size: usize,
    data_transform_size: usize,
    buffers: Buffers,
    plan: PlanState,
    _precision: PhantomData<P>,
}

impl<'b, B: Backend + ?Sized, P: Precision> TransformEngine<'b, B, P> {
    /// Derive buffer sizes for `variant` over `extent`. Nothing is allocated.
    ///
    /// Fails with [`BenchError::InvalidExtent`] when a buffer size in bytes
    /// does not fit in `usize`.
    pub fn new(
        backend: &'b mut B,
        device: usize,
        variant: Variant,
        extent: Extent,
    ) -> Result<Self, BenchError> {
        let (n_padded, data_size, data_transform_size) = buffer_sizes::<P>(variant, &extent)?;
        Ok(Self {
            backend,
            device,
            variant,
            n: extent.len(),
            extent,
            n_padded,
            data_size,
            data_transform_size,
            buffers: Buffers::Unallocated,
            plan: PlanState::Empty,
            _precision: PhantomData,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Axis lengths of the transform.
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Device index the buffers are allocated on.
    pub fn device(&self) -> usize {
        self.device
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Complex elements of the padded layout, present only when padding applies.
    pub fn padded_len(&self) -> Option<usize> {
        self.n_padded
    }

    /// True for in-place real transforms of rank two or higher.
    pub fn has_padding(&self) -> bool {
        self.n_padded.is_some()
    }

    /// Bytes of the data buffer, padding included.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Bytes of the separate transform buffer; zero for in-place variants.
    pub fn transform_size(&self) -> usize {
        self.data_transform_size
    }

    /// Device memory consumed by the buffers of this variant.
    pub fn alloc_size(&self) -> usize {
        self.data_size + self.data_transform_size
    }

    /// Transform type of the forward plan: R2C/D2Z for real variants,
    /// C2C/Z2Z for complex ones.
    pub fn forward_type(&self) -> TransformType {
        if self.variant.is_complex() {
            P::COMPLEX
        } else {
            P::REAL_FORWARD
        }
    }

    /// Transform type of the plan that executes the backward transform.
    pub fn backward_type(&self) -> TransformType {
        if self.variant.is_complex() {
            P::COMPLEX
        } else {
            P::REAL_BACKWARD
        }
    }

    /// Current plan handle, if any.
    pub fn plan_handle(&self) -> Option<PlanHandle> {
        self.plan.handle()
    }

    /// `(data, transform)` device pointers once allocated.
    pub fn device_pointers(&self) -> Option<(DevicePtr, DevicePtr)> {
        self.buffers.pointers()
    }

    /// Worst-case plan work area over the forward and backward plans.
    ///
    /// Builds and destroys its own temporary plans and leaves the engine's
    /// plan state untouched.
    pub fn plan_size(&mut self) -> Result<usize, BenchError> {
        let forward = self.measure_plan(self.forward_type())?;
        let backward = self.measure_plan(self.backward_type())?;
        debug!(
            "{} {}: plan sizes forward={forward} backward={backward}",
            self.variant, self.extent
        );
        Ok(forward.max(backward))
    }

    fn measure_plan(&mut self, ty: TransformType) -> Result<usize, BenchError> {
        let plan = make_plan(&mut *self.backend, &self.extent, ty)?;
        let size = check(self.backend.plan_work_size(plan), "plan_work_size");
        let destroyed = check(self.backend.destroy_plan(plan), "destroy_plan");
        let size = size?;
        destroyed?;
        Ok(size)
    }

    /// Allocate the data buffer and, out of place, the transform buffer.
    pub fn allocate(&mut self) -> Result<(), BenchError> {
        if self.buffers != Buffers::Unallocated {
            return Err(BenchError::Lifecycle {
                operation: "allocate",
                state: self.buffers.state(),
            });
        }
        let data = check(self.backend.alloc(self.device, self.data_size), "alloc")?;
        if self.variant.is_inplace() {
            self.buffers = Buffers::InPlace { data };
        } else {
            // keep `data` owned by the engine even if the second allocation fails
            self.buffers = Buffers::InPlace { data };
            let transform = check(
                self.backend.alloc(self.device, self.data_transform_size),
                "alloc",
            )?;
            self.buffers = Buffers::OutOfPlace { data, transform };
        }
        debug!(
            "{} {}: allocated {} + {} bytes",
            self.variant, self.extent, self.data_size, self.data_transform_size
        );
        Ok(())
    }

    /// Create the forward plan; complex variants reuse it for the backward pass.
    pub fn init_forward_plan(&mut self) -> Result<(), BenchError> {
        self.pointers("init_forward_plan")?;
        if self.plan != PlanState::Empty {
            return Err(BenchError::Lifecycle {
                operation: "init_forward_plan",
                state: self.plan.state(),
            });
        }
        let ty = self.forward_type();
        let handle = make_plan(&mut *self.backend, &self.extent, ty)?;
        self.plan = if self.variant.is_complex() {
            PlanState::Shared(handle)
        } else {
            PlanState::Forward(handle)
        };
        debug!("{} {}: {ty} plan {}", self.variant, self.extent, handle.0);
        Ok(())
    }

    /// Real variants replace the forward plan with a backward one; complex
    /// variants keep the shared plan.
    pub fn init_backward_plan(&mut self) -> Result<(), BenchError> {
        match (self.variant.is_complex(), self.plan) {
            (true, PlanState::Shared(_)) => Ok(()),
            (false, PlanState::Forward(forward)) => {
                check(self.backend.destroy_plan(forward), "destroy_plan")?;
                self.plan = PlanState::Empty;
                let ty = self.backward_type();
                let backward = make_plan(&mut *self.backend, &self.extent, ty)?;
                self.plan = PlanState::Backward(backward);
                debug!(
                    "{} {}: plan {} replaced by {ty} plan {}",
                    self.variant, self.extent, forward.0, backward.0
                );
                Ok(())
            }
            (_, state) => Err(BenchError::Lifecycle {
                operation: "init_backward_plan",
                state: state.state(),
            }),
        }
    }

    /// Run the forward transform from the data buffer into the transform buffer.
    pub fn execute_forward(&mut self) -> Result<(), BenchError> {
        let plan = match self.plan {
            PlanState::Forward(h) | PlanState::Shared(h) => h,
            state => {
                return Err(BenchError::Lifecycle {
                    operation: "execute_forward",
                    state: state.state(),
                })
            }
        };
        let (data, transform) = self.pointers("execute_forward")?;
        if self.variant.is_complex() {
            P::ExecuteForward::complex(&mut *self.backend, plan, data, transform)
        } else {
            P::ExecuteForward::real(&mut *self.backend, plan, data, transform)
        }
    }

    pub fn execute_backward(&mut self) -> Result<(), BenchError> {
        let plan = match self.plan {
            PlanState::Backward(h) | PlanState::Shared(h) => h,
            state => {
                return Err(BenchError::Lifecycle {
                    operation: "execute_backward",
                    state: state.state(),
                })
            }
        };
        let (data, transform) = self.pointers("execute_backward")?;
        if self.variant.is_complex() {
            P::ExecuteBackward::complex(&mut *self.backend, plan, transform, data)
        } else {
            P::ExecuteBackward::real(&mut *self.backend, plan, transform, data)
        }
    }

    /// Copy host data into the data buffer.
    ///
    /// Padded layouts use a pitched copy: host rows of `last * size_of::<H>()`
    /// bytes land on device rows `(last / 2 + 1) * size_of::<P::Complex>()`
    /// bytes apart. Other layouts copy `data_size` bytes flat.
    pub fn upload<H: Pod>(&mut self, input: &[H]) -> Result<(), BenchError> {
        let (data, _) = self.pointers("upload")?;
        let bytes: &[u8] = bytemuck::cast_slice(input);
        match self.pitch::<H>() {
            Some((width, height, pitch)) => {
                Self::ensure_host(width * height, bytes.len())?;
                check(
                    self.backend
                        .copy_2d_to_device(data, pitch, bytes, width, width, height),
                    "copy_2d_to_device",
                )
            }
            None => {
                Self::ensure_host(self.data_size, bytes.len())?;
                check(
                    self.backend.copy_to_device(data, &bytes[..self.data_size]),
                    "copy_to_device",
                )
            }
        }
    }

    /// Copy the data buffer back to the host; inverse of [`Self::upload`].
    pub fn download<H: Pod>(&mut self, output: &mut [H]) -> Result<(), BenchError> {
        let (data, _) = self.pointers("download")?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(output);
        match self.pitch::<H>() {
            Some((width, height, pitch)) => {
                Self::ensure_host(width * height, bytes.len())?;
                check(
                    self.backend
                        .copy_2d_to_host(bytes, width, data, pitch, width, height),
                    "copy_2d_to_host",
                )
            }
            None => {
                Self::ensure_host(self.data_size, bytes.len())?;
                let size = self.data_size;
                check(
                    self.backend.copy_to_host(&mut bytes[..size], data),
                    "copy_to_host",
                )
            }
        }
    }

    /// Wait for queued device work; used by the timing wrapper.
    pub fn synchronize(&mut self) -> Result<(), BenchError> {
        check(self.backend.synchronize(), "synchronize")
    }

    /// Release buffers and plan. A second call does nothing.
    ///
    /// Every release is attempted even when an earlier one fails; the first
    /// failure is returned.
    pub fn destroy(&mut self) -> Result<(), BenchError> {
        let buffers = mem::replace(&mut self.buffers, Buffers::Released);
        let plan = mem::replace(&mut self.plan, PlanState::Empty);
        let mut released = Vec::with_capacity(3);
        match buffers {
            Buffers::InPlace { data } => released.push(check(self.backend.free(data), "free")),
            Buffers::OutOfPlace { data, transform } => {
                released.push(check(self.backend.free(data), "free"));
                released.push(check(self.backend.free(transform), "free"));
            }
            Buffers::Unallocated | Buffers::Released => {}
        }
        if let Some(handle) = plan.handle() {
            released.push(check(self.backend.destroy_plan(handle), "destroy_plan"));
        }
        released.into_iter().collect()
    }

    /// `(row width, row count, device pitch)` in bytes when padding applies.
    fn pitch<H>(&self) -> Option<(usize, usize, usize)> {
        self.n_padded?;
        let last = self.extent.last();
        let width = last * mem::size_of::<H>();
        let height = self.n * mem::size_of::<H>() / width;
        let pitch = (last / 2 + 1) * mem::size_of::<P::Complex>();
        Some((width, height, pitch))
    }

    fn pointers(&self, operation: &'static str) -> Result<(DevicePtr, DevicePtr), BenchError> {
        self.buffers.pointers().ok_or(BenchError::Lifecycle {
            operation,
            state: self.buffers.state(),
        })
    }

    fn ensure_host(expected: usize, actual: usize) -> Result<(), BenchError> {
        if actual < expected {
            Err(BenchError::HostBuffer { expected, actual })
        } else {
            Ok(())
        }
    }
}

impl<B: Backend + ?Sized, P: Precision> Drop for TransformEngine<'_, B, P> {
    fn drop(&mut self) {
        let leaked = !matches!(self.buffers, Buffers::Unallocated | Buffers::Released)
            || self.plan != PlanState::Empty;
        if leaked {
            warn!(
                "{} {}: engine dropped without destroy, releasing resources",
                self.variant, self.extent
            );
            if let Err(e) = self.destroy() {
                warn!("cleanup failed: {e}");
            }
        }
    }
}
