//! Host-memory device emulator.
//!
//! [`HostBackend`] implements [`Backend`] without a GPU: device memory is a
//! set of byte vectors addressed by fake device pointers, plans hold
//! `rustfft`/`realfft` kernels, and execution stages data through typed
//! host vectors. Layout conventions follow the GPU libraries:
//!
//! - complex data is interleaved `{re, im}`, row-major, last axis contiguous;
//! - a real transform with equal input and output pointers reads/writes real
//!   rows `2 * (last / 2 + 1)` elements apart, the padded in-place layout;
//! - writes past the end of an allocation are dropped and logged rather than
//!   corrupting neighbouring allocations.

use core::mem;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use hashbrown::HashMap;
use log::debug;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex as FftComplex;
use rustfft::{Fft, FftNum, FftPlanner};

use crate::backend::{Backend, DeviceInfo, DevicePtr, PlanHandle, Status};
use crate::num::{Complex, Float};
use crate::precision::{Direction, TransformType};

/// Memory reported for the default emulated device.
pub const DEFAULT_MEMORY_MIB: u64 = 4096;

const MIB: u64 = 1 << 20;

/// Address of the first allocation; keeps `DevicePtr(0)` invalid.
const BASE_ADDRESS: u64 = 0x1000;

/// Allocation granularity of the fake address space.
const ADDRESS_ALIGN: u64 = 256;

struct Allocation {
    device: usize,
    bytes: Vec<u8>,
}

/// FFT kernels of one plan for a single scalar type.
struct Kernels<T: FftNum> {
    extents: Vec<usize>,
    /// Complex FFTs per axis: every axis for complex plans, the leading axes
    /// for real plans.
    forward: Vec<Arc<dyn Fft<T>>>,
    inverse: Vec<Arc<dyn Fft<T>>>,
    r2c: Option<Arc<dyn RealToComplex<T>>>,
    c2r: Option<Arc<dyn ComplexToReal<T>>>,
}

impl<T: Float + FftNum> Kernels<T> {
    fn new(extents: Vec<usize>, ty: TransformType) -> Self {
        let last = extents[extents.len() - 1];
        let complex_axes = if ty.is_real() {
            &extents[..extents.len() - 1]
        } else {
            &extents[..]
        };
        let wants_forward = matches!(
            ty,
            TransformType::R2C | TransformType::D2Z | TransformType::C2C | TransformType::Z2Z
        );
        let wants_inverse = matches!(
            ty,
            TransformType::C2R | TransformType::Z2D | TransformType::C2C | TransformType::Z2Z
        );

        let mut planner = FftPlanner::<T>::new();
        let forward = if wants_forward {
            complex_axes
                .iter()
                .map(|&n| planner.plan_fft_forward(n))
                .collect()
        } else {
            Vec::new()
        };
        let inverse = if wants_inverse {
            complex_axes
                .iter()
                .map(|&n| planner.plan_fft_inverse(n))
                .collect()
        } else {
            Vec::new()
        };

        let mut real_planner = RealFftPlanner::<T>::new();
        let r2c = matches!(ty, TransformType::R2C | TransformType::D2Z)
            .then(|| real_planner.plan_fft_forward(last));
        let c2r = matches!(ty, TransformType::C2R | TransformType::Z2D)
            .then(|| real_planner.plan_fft_inverse(last));

        Self {
            extents,
            forward,
            inverse,
            r2c,
            c2r,
        }
    }

    fn last(&self) -> usize {
        self.extents[self.extents.len() - 1]
    }

    fn rows(&self) -> usize {
        self.extents[..self.extents.len() - 1].iter().product()
    }

    fn len(&self) -> usize {
        self.extents.iter().product()
    }

    /// Shape of the half spectrum of a real transform.
    fn spectrum_dims(&self) -> Vec<usize> {
        let mut dims = self.extents.clone();
        let last = dims.len() - 1;
        dims[last] = dims[last] / 2 + 1;
        dims
    }

    /// Scratch plus staging memory in bytes.
    fn work_size(&self) -> usize {
        let complex_scratch = self
            .forward
            .iter()
            .chain(self.inverse.iter())
            .map(|f| f.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);
        let real_scratch = self
            .r2c
            .as_ref()
            .map(|f| f.get_scratch_len())
            .into_iter()
            .chain(self.c2r.as_ref().map(|f| f.get_scratch_len()))
            .max()
            .unwrap_or(0);
        let staging = if self.r2c.is_some() || self.c2r.is_some() {
            self.rows() * (self.last() / 2 + 1)
        } else {
            self.len()
        };
        (complex_scratch.max(real_scratch) + staging) * mem::size_of::<FftComplex<T>>()
    }
}

enum PlanKernels {
    Single(Kernels<f32>),
    Double(Kernels<f64>),
}

struct HostPlan {
    ty: TransformType,
    kernels: PlanKernels,
}

/// Emulated device runtime plus FFT library.
pub struct HostBackend {
    devices: Vec<DeviceInfo>,
    active: Option<usize>,
    used: Vec<usize>,
    memory: HashMap<u64, Allocation>,
    next_address: u64,
    plans: HashMap<u32, HostPlan>,
    next_plan: u32,
    plans_created: usize,
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend {
    /// One device with [`DEFAULT_MEMORY_MIB`] of memory.
    pub fn new() -> Self {
        Self::with_devices(vec![DeviceInfo {
            description: "Host emulator (rustfft)".into(),
            version: 6,
            memory_mib: DEFAULT_MEMORY_MIB,
        }])
    }

    /// Emulate the given devices; `memory_mib` caps each device's allocations.
    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        let used = vec![0; devices.len()];
        Self {
            devices,
            active: None,
            used,
            memory: HashMap::new(),
            next_address: BASE_ADDRESS,
            plans: HashMap::new(),
            next_plan: 1,
            plans_created: 0,
        }
    }

    /// Device selected by the last successful `init`.
    pub fn active_device(&self) -> Option<usize> {
        self.active
    }

    pub fn live_allocations(&self) -> usize {
        self.memory.len()
    }

    pub fn live_plans(&self) -> usize {
        self.plans.len()
    }

    /// Plans created since construction, destroyed ones included.
    pub fn plans_created(&self) -> usize {
        self.plans_created
    }

    pub fn bytes_in_use(&self, device: usize) -> usize {
        self.used.get(device).copied().unwrap_or(0)
    }

    /// Transform type of a live plan.
    pub fn plan_type(&self, plan: PlanHandle) -> Option<TransformType> {
        self.plans.get(&plan.0).map(|p| p.ty)
    }

    fn capacity(&self, device: usize) -> usize {
        (self.devices[device].memory_mib * MIB) as usize
    }

    fn make_plan(&mut self, extents: Vec<usize>, ty: TransformType) -> Result<PlanHandle, Status> {
        if self.active.is_none() {
            return Err(Status::SetupFailed);
        }
        if extents.contains(&0) {
            return Err(Status::InvalidSize);
        }
        let kernels = if ty.is_double() {
            PlanKernels::Double(Kernels::new(extents, ty))
        } else {
            PlanKernels::Single(Kernels::new(extents, ty))
        };
        let handle = self.next_plan;
        self.next_plan += 1;
        self.plans_created += 1;
        self.plans.insert(handle, HostPlan { ty, kernels });
        debug!("host: plan {handle} ({ty}) created");
        Ok(PlanHandle(handle))
    }
}

fn lookup(
    plans: &HashMap<u32, HostPlan>,
    plan: PlanHandle,
    expected: TransformType,
) -> Result<&HostPlan, Status> {
    let found = plans.get(&plan.0).ok_or(Status::InvalidPlan)?;
    if found.ty == expected {
        Ok(found)
    } else {
        Err(Status::InvalidType)
    }
}

fn buffer(memory: &HashMap<u64, Allocation>, ptr: DevicePtr) -> Result<&[u8], Status> {
    memory
        .get(&ptr.0)
        .map(|a| a.bytes.as_slice())
        .ok_or(Status::InvalidValue)
}

fn buffer_mut(memory: &mut HashMap<u64, Allocation>, ptr: DevicePtr) -> Result<&mut [u8], Status> {
    memory
        .get_mut(&ptr.0)
        .map(|a| a.bytes.as_mut_slice())
        .ok_or(Status::InvalidValue)
}

/// Read `rows × width` elements whose rows start `stride` elements apart.
/// Elements beyond the buffer read as zero.
fn gather<E: Pod>(bytes: &[u8], rows: usize, width: usize, stride: usize) -> Vec<E> {
    let size = mem::size_of::<E>();
    let mut out = Vec::with_capacity(rows * width);
    for r in 0..rows {
        for c in 0..width {
            let offset = (r * stride + c) * size;
            out.push(match bytes.get(offset..offset + size) {
                Some(chunk) => bytemuck::pod_read_unaligned(chunk),
                None => E::zeroed(),
            });
        }
    }
    out
}

/// Inverse of [`gather`]; returns the number of elements that did not fit.
fn scatter<E: Pod>(bytes: &mut [u8], values: &[E], width: usize, stride: usize) -> usize {
    let size = mem::size_of::<E>();
    let mut clipped = 0;
    for (i, v) in values.iter().enumerate() {
        let offset = (i / width * stride + i % width) * size;
        match bytes.get_mut(offset..offset + size) {
            Some(chunk) => chunk.copy_from_slice(bytemuck::bytes_of(v)),
            None => clipped += 1,
        }
    }
    clipped
}

/// Apply `ffts[axis]` along each leading axis of a row-major array.
fn transform_axes<T: Float + FftNum>(
    data: &mut [FftComplex<T>],
    dims: &[usize],
    ffts: &[Arc<dyn Fft<T>>],
) {
    for (axis, fft) in ffts.iter().enumerate() {
        let len = dims[axis];
        let stride: usize = dims[axis + 1..].iter().product();
        if stride == 1 {
            fft.process(data);
            continue;
        }
        let outer: usize = dims[..axis].iter().product();
        let mut line = vec![FftComplex::<T>::default(); len];
        let mut scratch = vec![FftComplex::<T>::default(); fft.get_inplace_scratch_len()];
        for o in 0..outer {
            for i in 0..stride {
                let base = o * len * stride + i;
                for (k, v) in line.iter_mut().enumerate() {
                    *v = data[base + k * stride];
                }
                fft.process_with_scratch(&mut line, &mut scratch);
                for (k, v) in line.iter().enumerate() {
                    data[base + k * stride] = *v;
                }
            }
        }
    }
}

fn to_fft<T: Float>(values: Vec<Complex<T>>) -> Vec<FftComplex<T>> {
    values.into_iter().map(|c| FftComplex::new(c.re, c.im)).collect()
}

fn from_fft<T: Float>(values: &[FftComplex<T>]) -> Vec<Complex<T>> {
    values.iter().map(|c| Complex::new(c.re, c.im)).collect()
}

fn report_clipped(call: &str, clipped: usize) {
    if clipped > 0 {
        debug!("host: {call} dropped {clipped} element(s) past the end of the output buffer");
    }
}

fn real_forward<T: Float + FftNum>(
    k: &Kernels<T>,
    memory: &mut HashMap<u64, Allocation>,
    input: DevicePtr,
    output: DevicePtr,
) -> Result<(), Status> {
    let r2c = k.r2c.as_ref().ok_or(Status::InvalidType)?;
    let (last, rows) = (k.last(), k.rows());
    let half = last / 2 + 1;
    let stride = if input == output { 2 * half } else { last };

    let real: Vec<T> = gather(buffer(memory, input)?, rows, last, stride);
    let mut spectrum = vec![FftComplex::<T>::default(); rows * half];
    let mut line = r2c.make_input_vec();
    for (row, out) in spectrum.chunks_exact_mut(half).enumerate() {
        line.copy_from_slice(&real[row * last..(row + 1) * last]);
        r2c.process(&mut line, out).map_err(|_| Status::ExecFailed)?;
    }
    transform_axes(&mut spectrum, &k.spectrum_dims(), &k.forward);

    let values = from_fft(&spectrum);
    let clipped = scatter(buffer_mut(memory, output)?, &values, values.len(), values.len());
    report_clipped("real forward", clipped);
    Ok(())
}

fn real_backward<T: Float + FftNum>(
    k: &Kernels<T>,
    memory: &mut HashMap<u64, Allocation>,
    input: DevicePtr,
    output: DevicePtr,
) -> Result<(), Status> {
    let c2r = k.c2r.as_ref().ok_or(Status::InvalidType)?;
    let (last, rows) = (k.last(), k.rows());
    let half = last / 2 + 1;
    let stride = if input == output { 2 * half } else { last };

    let staged: Vec<Complex<T>> = gather(buffer(memory, input)?, 1, rows * half, rows * half);
    let mut spectrum = to_fft(staged);
    transform_axes(&mut spectrum, &k.spectrum_dims(), &k.inverse);

    let mut real = vec![<T as Float>::zero(); rows * last];
    let mut line = c2r.make_output_vec();
    for (row, bins) in spectrum.chunks_exact_mut(half).enumerate() {
        // DC and Nyquist bins of a real signal carry no imaginary part
        bins[0].im = <T as Float>::zero();
        if last % 2 == 0 {
            bins[half - 1].im = <T as Float>::zero();
        }
        c2r.process(bins, &mut line).map_err(|_| Status::ExecFailed)?;
        real[row * last..(row + 1) * last].copy_from_slice(&line);
    }

    let clipped = scatter(buffer_mut(memory, output)?, &real, last, stride);
    report_clipped("real backward", clipped);
    Ok(())
}

fn complex_transform<T: Float + FftNum>(
    k: &Kernels<T>,
    memory: &mut HashMap<u64, Allocation>,
    input: DevicePtr,
    output: DevicePtr,
    direction: Direction,
) -> Result<(), Status> {
    let n = k.len();
    let staged: Vec<Complex<T>> = gather(buffer(memory, input)?, 1, n, n);
    let mut data = to_fft(staged);
    let ffts = match direction {
        Direction::Forward => &k.forward,
        Direction::Backward => &k.inverse,
    };
    transform_axes(&mut data, &k.extents, ffts);

    let values = from_fft(&data);
    let clipped = scatter(buffer_mut(memory, output)?, &values, n, n);
    report_clipped("complex", clipped);
    Ok(())
}

impl Backend for HostBackend {
    fn title(&self) -> &'static str {
        "host"
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn init(&mut self, device: usize) -> Result<(), Status> {
        if device >= self.devices.len() {
            return Err(Status::InvalidDevice);
        }
        self.active = Some(device);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Status> {
        if !self.memory.is_empty() || !self.plans.is_empty() {
            debug!(
                "host: reset releases {} allocation(s) and {} plan(s)",
                self.memory.len(),
                self.plans.len()
            );
        }
        self.memory.clear();
        self.plans.clear();
        self.used.iter_mut().for_each(|u| *u = 0);
        self.active = None;
        Ok(())
    }

    fn alloc(&mut self, device: usize, bytes: usize) -> Result<DevicePtr, Status> {
        if device >= self.devices.len() {
            return Err(Status::InvalidDevice);
        }
        if self.used[device] + bytes > self.capacity(device) {
            return Err(Status::AllocFailed);
        }
        let address = self.next_address;
        let span = (bytes.max(1) as u64).div_ceil(ADDRESS_ALIGN) * ADDRESS_ALIGN;
        self.next_address += span;
        self.used[device] += bytes;
        self.memory.insert(
            address,
            Allocation {
                device,
                bytes: vec![0; bytes],
            },
        );
        Ok(DevicePtr(address))
    }

    fn free(&mut self, ptr: DevicePtr) -> Result<(), Status> {
        let allocation = self.memory.remove(&ptr.0).ok_or(Status::InvalidValue)?;
        self.used[allocation.device] -= allocation.bytes.len();
        Ok(())
    }

    fn copy_to_device(&mut self, dst: DevicePtr, src: &[u8]) -> Result<(), Status> {
        let dst = buffer_mut(&mut self.memory, dst)?;
        dst.get_mut(..src.len())
            .ok_or(Status::InvalidValue)?
            .copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&mut self, dst: &mut [u8], src: DevicePtr) -> Result<(), Status> {
        let src = buffer(&self.memory, src)?;
        let len = dst.len();
        dst.copy_from_slice(src.get(..len).ok_or(Status::InvalidValue)?);
        Ok(())
    }

    fn copy_2d_to_device(
        &mut self,
        dst: DevicePtr,
        dpitch: usize,
        src: &[u8],
        spitch: usize,
        width: usize,
        height: usize,
    ) -> Result<(), Status> {
        let dst = buffer_mut(&mut self.memory, dst)?;
        copy_2d(dst, dpitch, src, spitch, width, height)
    }

    fn copy_2d_to_host(
        &mut self,
        dst: &mut [u8],
        dpitch: usize,
        src: DevicePtr,
        spitch: usize,
        width: usize,
        height: usize,
    ) -> Result<(), Status> {
        let src = buffer(&self.memory, src)?;
        copy_2d(dst, dpitch, src, spitch, width, height)
    }

    fn plan_1d(&mut self, nx: usize, ty: TransformType) -> Result<PlanHandle, Status> {
        self.make_plan(vec![nx], ty)
    }

    fn plan_2d(&mut self, nx: usize, ny: usize, ty: TransformType) -> Result<PlanHandle, Status> {
        self.make_plan(vec![nx, ny], ty)
    }

    fn plan_3d(
        &mut self,
        nx: usize,
        ny: usize,
        nz: usize,
        ty: TransformType,
    ) -> Result<PlanHandle, Status> {
        self.make_plan(vec![nx, ny, nz], ty)
    }

    fn plan_work_size(&mut self, plan: PlanHandle) -> Result<usize, Status> {
        let plan = self.plans.get(&plan.0).ok_or(Status::InvalidPlan)?;
        Ok(match &plan.kernels {
            PlanKernels::Single(k) => k.work_size(),
            PlanKernels::Double(k) => k.work_size(),
        })
    }

    fn destroy_plan(&mut self, plan: PlanHandle) -> Result<(), Status> {
        self.plans.remove(&plan.0).ok_or(Status::InvalidPlan)?;
        debug!("host: plan {} destroyed", plan.0);
        Ok(())
    }

    fn exec_r2c(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        match &lookup(&self.plans, plan, TransformType::R2C)?.kernels {
            PlanKernels::Single(k) => real_forward(k, &mut self.memory, input, output),
            PlanKernels::Double(_) => Err(Status::InvalidType),
        }
    }

    fn exec_c2r(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        match &lookup(&self.plans, plan, TransformType::C2R)?.kernels {
            PlanKernels::Single(k) => real_backward(k, &mut self.memory, input, output),
            PlanKernels::Double(_) => Err(Status::InvalidType),
        }
    }

    fn exec_c2c(
        &mut self,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        direction: Direction,
    ) -> Result<(), Status> {
        match &lookup(&self.plans, plan, TransformType::C2C)?.kernels {
            PlanKernels::Single(k) => complex_transform(k, &mut self.memory, input, output, direction),
            PlanKernels::Double(_) => Err(Status::InvalidType),
        }
    }

    fn exec_d2z(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        match &lookup(&self.plans, plan, TransformType::D2Z)?.kernels {
            PlanKernels::Double(k) => real_forward(k, &mut self.memory, input, output),
            PlanKernels::Single(_) => Err(Status::InvalidType),
        }
    }

    fn exec_z2d(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        match &lookup(&self.plans, plan, TransformType::Z2D)?.kernels {
            PlanKernels::Double(k) => real_backward(k, &mut self.memory, input, output),
            PlanKernels::Single(_) => Err(Status::InvalidType),
        }
    }

    fn exec_z2z(
        &mut self,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        direction: Direction,
    ) -> Result<(), Status> {
        match &lookup(&self.plans, plan, TransformType::Z2Z)?.kernels {
            PlanKernels::Double(k) => complex_transform(k, &mut self.memory, input, output, direction),
            PlanKernels::Single(_) => Err(Status::InvalidType),
        }
    }
}

/// Bounds-checked pitched copy; nothing is written unless every row fits.
fn copy_2d(
    dst: &mut [u8],
    dpitch: usize,
    src: &[u8],
    spitch: usize,
    width: usize,
    height: usize,
) -> Result<(), Status> {
    if width > dpitch || width > spitch {
        return Err(Status::InvalidValue);
    }
    if height == 0 {
        return Ok(());
    }
    let last = height - 1;
    if last * spitch + width > src.len() || last * dpitch + width > dst.len() {
        return Err(Status::InvalidValue);
    }
    for row in 0..height {
        let s = row * spitch;
        let d = row * dpitch;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
    Ok(())
}
