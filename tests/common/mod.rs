#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use gearbench::{Backend, DeviceInfo, DevicePtr, Direction, PlanHandle, Status, TransformType};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Init(usize),
    Reset,
    Alloc { ptr: DevicePtr, bytes: usize },
    Free(DevicePtr),
    PlanCreated {
        plan: PlanHandle,
        ty: TransformType,
        dims: Vec<usize>,
    },
    PlanDestroyed(PlanHandle),
    Exec {
        call: &'static str,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    },
    CopyToDevice { bytes: usize },
    CopyToHost { bytes: usize },
    Copy2d {
        to_device: bool,
        dpitch: usize,
        spitch: usize,
        width: usize,
        height: usize,
    },
}

/// Backend that records every call, keeps real byte buffers for copies and
/// leaves data untouched on execution.
pub struct MockBackend {
    pub devices: Vec<DeviceInfo>,
    pub events: Vec<Event>,
    pub work_sizes: HashMap<TransformType, usize>,
    pub memory: HashMap<u64, Vec<u8>>,
    pub live_plans: HashSet<u32>,
    /// Number of allocations that succeed before `alloc` fails.
    pub allocs_before_failure: Option<usize>,
    /// Number of frees that succeed before `free` fails, leaving the buffer live.
    pub frees_before_failure: Option<usize>,
    /// Number of plan destructions that succeed before `destroy_plan` fails.
    pub plan_destroys_before_failure: Option<usize>,
    pub exec_status: Option<Status>,
    next_ptr: u64,
    next_plan: u32,
}

pub fn device(description: &str) -> DeviceInfo {
    DeviceInfo {
        description: description.into(),
        version: 1,
        memory_mib: 1024,
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_devices(vec![device("mock gpu")])
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            events: Vec::new(),
            work_sizes: HashMap::new(),
            memory: HashMap::new(),
            live_plans: HashSet::new(),
            allocs_before_failure: None,
            frees_before_failure: None,
            plan_destroys_before_failure: None,
            exec_status: None,
            next_ptr: 0x100,
            next_plan: 1,
        }
    }

    pub fn created_plans(&self) -> Vec<(PlanHandle, TransformType)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::PlanCreated { plan, ty, .. } => Some((*plan, *ty)),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed_plans(&self) -> Vec<PlanHandle> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::PlanDestroyed(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn exec_calls(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Exec { call, .. } => Some(*call),
                _ => None,
            })
            .collect()
    }

    pub fn frees(&self) -> Vec<DevicePtr> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Free(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn live_allocations(&self) -> usize {
        self.memory.len()
    }

    /// Highest number of plans alive at the same time, replayed from the events.
    pub fn peak_live_plans(&self) -> usize {
        let mut live = 0usize;
        let mut peak = 0;
        for e in &self.events {
            match e {
                Event::PlanCreated { .. } => live += 1,
                Event::PlanDestroyed(_) => live -= 1,
                _ => continue,
            }
            peak = peak.max(live);
        }
        peak
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    pub fn bytes(&self, ptr: DevicePtr) -> &[u8] {
        &self.memory[&ptr.0]
    }

    fn plan(&mut self, ty: TransformType, dims: Vec<usize>) -> Result<PlanHandle, Status> {
        let plan = PlanHandle(self.next_plan);
        self.next_plan += 1;
        self.live_plans.insert(plan.0);
        self.events.push(Event::PlanCreated { plan, ty, dims });
        Ok(plan)
    }

    fn exec(
        &mut self,
        call: &'static str,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
    ) -> Result<(), Status> {
        if !self.live_plans.contains(&plan.0) {
            return Err(Status::InvalidPlan);
        }
        self.events.push(Event::Exec {
            call,
            plan,
            input,
            output,
        });
        match self.exec_status {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

impl Backend for MockBackend {
    fn title(&self) -> &'static str {
        "mock"
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn init(&mut self, device: usize) -> Result<(), Status> {
        self.events.push(Event::Init(device));
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Status> {
        self.events.push(Event::Reset);
        Ok(())
    }

    fn alloc(&mut self, _device: usize, bytes: usize) -> Result<DevicePtr, Status> {
        if let Some(left) = self.allocs_before_failure.as_mut() {
            if *left == 0 {
                return Err(Status::AllocFailed);
            }
            *left -= 1;
        }
        let ptr = DevicePtr(self.next_ptr);
        self.next_ptr += 0x100;
        self.memory.insert(ptr.0, vec![0; bytes]);
        self.events.push(Event::Alloc { ptr, bytes });
        Ok(ptr)
    }

    fn free(&mut self, ptr: DevicePtr) -> Result<(), Status> {
        if let Some(left) = self.frees_before_failure.as_mut() {
            if *left == 0 {
                return Err(Status::InvalidValue);
            }
            *left -= 1;
        }
        self.memory.remove(&ptr.0).ok_or(Status::InvalidValue)?;
        self.events.push(Event::Free(ptr));
        Ok(())
    }

    fn copy_to_device(&mut self, dst: DevicePtr, src: &[u8]) -> Result<(), Status> {
        let buf = self.memory.get_mut(&dst.0).ok_or(Status::InvalidValue)?;
        buf.get_mut(..src.len())
            .ok_or(Status::InvalidValue)?
            .copy_from_slice(src);
        self.events.push(Event::CopyToDevice { bytes: src.len() });
        Ok(())
    }

    fn copy_to_host(&mut self, dst: &mut [u8], src: DevicePtr) -> Result<(), Status> {
        let buf = self.memory.get(&src.0).ok_or(Status::InvalidValue)?;
        let len = dst.len();
        dst.copy_from_slice(buf.get(..len).ok_or(Status::InvalidValue)?);
        self.events.push(Event::CopyToHost { bytes: len });
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
        let buf = self.memory.get_mut(&dst.0).ok_or(Status::InvalidValue)?;
        for row in 0..height {
            buf[row * dpitch..row * dpitch + width]
                .copy_from_slice(&src[row * spitch..row * spitch + width]);
        }
        self.events.push(Event::Copy2d {
            to_device: true,
            dpitch,
            spitch,
            width,
            height,
        });
        Ok(())
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
        let buf = self.memory.get(&src.0).ok_or(Status::InvalidValue)?;
        for row in 0..height {
            dst[row * dpitch..row * dpitch + width]
                .copy_from_slice(&buf[row * spitch..row * spitch + width]);
        }
        self.events.push(Event::Copy2d {
            to_device: false,
            dpitch,
            spitch,
            width,
            height,
        });
        Ok(())
    }

    fn plan_1d(&mut self, nx: usize, ty: TransformType) -> Result<PlanHandle, Status> {
        self.plan(ty, vec![nx])
    }

    fn plan_2d(&mut self, nx: usize, ny: usize, ty: TransformType) -> Result<PlanHandle, Status> {
        self.plan(ty, vec![nx, ny])
    }

    fn plan_3d(
        &mut self,
        nx: usize,
        ny: usize,
        nz: usize,
        ty: TransformType,
    ) -> Result<PlanHandle, Status> {
        self.plan(ty, vec![nx, ny, nz])
    }

    fn plan_work_size(&mut self, plan: PlanHandle) -> Result<usize, Status> {
        let ty = self
            .created_plans()
            .into_iter()
            .find(|(p, _)| *p == plan)
            .map(|(_, ty)| ty)
            .ok_or(Status::InvalidPlan)?;
        Ok(self.work_sizes.get(&ty).copied().unwrap_or(0))
    }

    fn destroy_plan(&mut self, plan: PlanHandle) -> Result<(), Status> {
        if let Some(left) = self.plan_destroys_before_failure.as_mut() {
            if *left == 0 {
                return Err(Status::InternalError);
            }
            *left -= 1;
        }
        if !self.live_plans.remove(&plan.0) {
            return Err(Status::InvalidPlan);
        }
        self.events.push(Event::PlanDestroyed(plan));
        Ok(())
    }

    fn exec_r2c(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        self.exec("exec_r2c", plan, input, output)
    }

    fn exec_c2r(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        self.exec("exec_c2r", plan, input, output)
    }

    fn exec_c2c(
        &mut self,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        direction: Direction,
    ) -> Result<(), Status> {
        let call = match direction {
            Direction::Forward => "exec_c2c_forward",
            Direction::Backward => "exec_c2c_backward",
        };
        self.exec(call, plan, input, output)
    }

    fn exec_d2z(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        self.exec("exec_d2z", plan, input, output)
    }

    fn exec_z2d(&mut self, plan: PlanHandle, input: DevicePtr, output: DevicePtr) -> Result<(), Status> {
        self.exec("exec_z2d", plan, input, output)
    }

    fn exec_z2z(
        &mut self,
        plan: PlanHandle,
        input: DevicePtr,
        output: DevicePtr,
        direction: Direction,
    ) -> Result<(), Status> {
        let call = match direction {
            Direction::Forward => "exec_z2z_forward",
            Direction::Backward => "exec_z2z_backward",
        };
        self.exec(call, plan, input, output)
    }
}
