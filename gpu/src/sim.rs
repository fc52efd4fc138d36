//! Simulated GPU runtime
//!
//! A deterministic stand-in for a real runtime: copies advance a virtual
//! clock by `latency + bytes / bandwidth`, events capture that clock, and
//! every call is logged. Faults can be injected at each step of the
//! measurement pipeline, optionally only after a number of successful calls
//! or only on one device. Live allocation counters make leaks observable.
//!
//! Resetting a simulated device does not reclaim its allocations, so leak
//! accounting stays exact across resets.

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;

use numacopy_shared::GpuId;

use crate::{DevicePtr, EventHandle, GpuError, GpuRuntime, HostPtr};

const ERR_INVALID_VALUE: i32 = 1;
const ERR_MEMORY_ALLOCATION: i32 = 2;
const ERR_INVALID_DEVICE: i32 = 101;
const ERR_INVALID_RESOURCE_HANDLE: i32 = 400;
const ERR_NOT_READY: i32 = 600;
const ERR_ILLEGAL_ADDRESS: i32 = 700;

/// Default simulated copy bandwidth (12 GB/s)
pub const DEFAULT_BANDWIDTH: f64 = 12.0e9;

/// Default simulated per-copy latency (10 us)
pub const DEFAULT_LATENCY_SECS: f64 = 10.0e-6;

/// Default simulated device memory per GPU (16 GiB)
pub const DEFAULT_DEVICE_MEMORY: u64 = 16 << 30;

/// Pipeline step at which a fault can be injected
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FaultPoint {
    DeviceCount,
    Reset,
    SetDevice,
    DeviceAlloc,
    DeviceFill,
    HostAlloc,
    EventCreate,
    Copy,
    ElapsedTime,
}

impl FaultPoint {
    fn error_code(self) -> i32 {
        match self {
            Self::DeviceCount | Self::Reset | Self::SetDevice => ERR_INVALID_DEVICE,
            Self::DeviceAlloc | Self::HostAlloc | Self::EventCreate => ERR_MEMORY_ALLOCATION,
            Self::DeviceFill => ERR_INVALID_VALUE,
            Self::Copy => ERR_ILLEGAL_ADDRESS,
            Self::ElapsedTime => ERR_NOT_READY,
        }
    }
}

/// An injected failure
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Fault {
    point: FaultPoint,
    device: Option<GpuId>,
    after: u64,
}

impl Fault {
    /// Fail every call at `point`
    pub fn new(point: FaultPoint) -> Self {
        Self {
            point,
            device: None,
            after: 0,
        }
    }

    /// Only fail once `calls` calls at this point have gone through
    pub fn after(mut self, calls: u64) -> Self {
        self.after = calls;
        self
    }

    /// Only fail calls targeting `device`
    pub fn on_device(mut self, device: GpuId) -> Self {
        self.device = Some(device);
        self
    }
}

/// Logged runtime call
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimCall {
    DeviceCount,
    Reset(GpuId),
    SetDevice(GpuId),
    MallocDevice(u64),
    MemsetDevice(u64),
    FreeDevice,
    HostAlloc(u64),
    FreeHost,
    CreateEvent,
    DestroyEvent,
    RecordEvent,
    MemcpyDtoH(u64),
    SynchronizeEvent,
    ElapsedTime,
}

#[derive(Debug, Default)]
struct SimState {
    current_device: Option<GpuId>,
    next_handle: u64,
    device_allocs: HashMap<u64, u64>,
    host_allocs: HashMap<usize, u64>,
    events: HashMap<usize, Option<f64>>,
    clock_secs: f64,
    passed: HashMap<FaultPoint, u64>,
    calls: Vec<SimCall>,
    device_allocs_total: u64,
    host_allocs_total: u64,
}

impl SimState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        0x1_0000_0000 + self.next_handle * 0x1000
    }
}

/// Deterministic GPU model
#[derive(Debug)]
pub struct SimulatedGpu {
    devices: u32,
    bandwidth: f64,
    latency_secs: f64,
    device_memory: u64,
    faults: Vec<Fault>,
    state: RefCell<SimState>,
}

impl SimulatedGpu {
    /// Simulate `devices` identical GPUs
    pub fn new(devices: u32) -> Self {
        Self {
            devices,
            bandwidth: DEFAULT_BANDWIDTH,
            latency_secs: DEFAULT_LATENCY_SECS,
            device_memory: DEFAULT_DEVICE_MEMORY,
            faults: Vec::new(),
            state: RefCell::new(SimState::default()),
        }
    }

    /// Copy bandwidth in bytes per second
    pub fn with_bandwidth(mut self, bytes_per_second: f64) -> Self {
        self.bandwidth = bytes_per_second;
        self
    }

    /// Fixed cost added to every copy
    pub fn with_latency_secs(mut self, secs: f64) -> Self {
        self.latency_secs = secs;
        self
    }

    /// Largest device allocation that succeeds
    pub fn with_device_memory(mut self, bytes: u64) -> Self {
        self.device_memory = bytes;
        self
    }

    /// Fail every call at `point`
    pub fn with_fault(self, point: FaultPoint) -> Self {
        self.with(Fault::new(point))
    }

    pub fn with(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<SimCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of logged calls matching `pred`
    pub fn call_count(&self, pred: impl Fn(&SimCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn live_device_allocations(&self) -> usize {
        self.state.borrow().device_allocs.len()
    }

    pub fn live_host_allocations(&self) -> usize {
        self.state.borrow().host_allocs.len()
    }

    pub fn live_events(&self) -> usize {
        self.state.borrow().events.len()
    }

    /// Successful device allocations since creation
    pub fn device_allocations_total(&self) -> u64 {
        self.state.borrow().device_allocs_total
    }

    /// Successful host allocations since creation
    pub fn host_allocations_total(&self) -> u64 {
        self.state.borrow().host_allocs_total
    }

    /// Log `call`, then apply fault injection for `point`
    fn begin(
        &self,
        api: &'static str,
        call: SimCall,
        point: Option<FaultPoint>,
        device: Option<GpuId>,
    ) -> Result<RefMut<'_, SimState>, GpuError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);

        if let Some(point) = point {
            let passed = state.passed.get(&point).copied().unwrap_or(0);
            let triggered = self.faults.iter().any(|f| {
                f.point == point && passed >= f.after && f.device.map_or(true, |d| Some(d) == device)
            });
            if triggered {
                return Err(error(api, point.error_code(), "injected fault"));
            }
            *state.passed.entry(point).or_insert(0) += 1;
        }

        Ok(state)
    }

    fn check_device(&self, api: &'static str, device: GpuId) -> Result<(), GpuError> {
        if device < self.devices {
            Ok(())
        } else {
            Err(error(api, ERR_INVALID_DEVICE, "invalid device ordinal"))
        }
    }
}

fn error(api: &'static str, code: i32, message: &str) -> GpuError {
    GpuError {
        api,
        code,
        message: message.to_string(),
    }
}

impl GpuRuntime for SimulatedGpu {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn device_count(&self) -> Result<u32, GpuError> {
        self.begin(
            "cudaGetDeviceCount",
            SimCall::DeviceCount,
            Some(FaultPoint::DeviceCount),
            None,
        )?;
        Ok(self.devices)
    }

    fn reset_device(&self, device: GpuId) -> Result<(), GpuError> {
        let api = "cudaDeviceReset";
        self.begin(api, SimCall::Reset(device), Some(FaultPoint::Reset), Some(device))?;
        self.check_device(api, device)
    }

    fn set_device(&self, device: GpuId) -> Result<(), GpuError> {
        let api = "cudaSetDevice";
        let mut state = self.begin(
            api,
            SimCall::SetDevice(device),
            Some(FaultPoint::SetDevice),
            Some(device),
        )?;
        self.check_device(api, device)?;
        state.current_device = Some(device);
        Ok(())
    }

    fn malloc_device(&self, bytes: u64) -> Result<DevicePtr, GpuError> {
        let device = self.state.borrow().current_device.unwrap_or(0);
        let mut state = self.begin(
            "cudaMalloc",
            SimCall::MallocDevice(bytes),
            Some(FaultPoint::DeviceAlloc),
            Some(device),
        )?;
        if bytes > self.device_memory {
            return Err(error("cudaMalloc", ERR_MEMORY_ALLOCATION, "out of memory"));
        }

        let ptr = state.next_handle();
        state.device_allocs.insert(ptr, bytes);
        state.device_allocs_total += 1;
        Ok(DevicePtr(ptr))
    }

    fn memset_device(&self, ptr: DevicePtr, _value: u8, bytes: u64) -> Result<(), GpuError> {
        let device = self.state.borrow().current_device.unwrap_or(0);
        let state = self.begin(
            "cudaMemset",
            SimCall::MemsetDevice(bytes),
            Some(FaultPoint::DeviceFill),
            Some(device),
        )?;
        match state.device_allocs.get(&ptr.0) {
            Some(&len) if len >= bytes => Ok(()),
            _ => Err(error("cudaMemset", ERR_INVALID_VALUE, "invalid device pointer")),
        }
    }

    fn free_device(&self, ptr: DevicePtr) -> Result<(), GpuError> {
        let mut state = self.begin("cudaFree", SimCall::FreeDevice, None, None)?;
        state
            .device_allocs
            .remove(&ptr.0)
            .map(|_| ())
            .ok_or_else(|| error("cudaFree", ERR_INVALID_VALUE, "invalid device pointer"))
    }

    fn host_alloc_write_combined(&self, bytes: u64) -> Result<HostPtr, GpuError> {
        let device = self.state.borrow().current_device.unwrap_or(0);
        let mut state = self.begin(
            "cudaHostAlloc",
            SimCall::HostAlloc(bytes),
            Some(FaultPoint::HostAlloc),
            Some(device),
        )?;

        let ptr = state.next_handle() as usize;
        state.host_allocs.insert(ptr, bytes);
        state.host_allocs_total += 1;
        Ok(HostPtr(ptr))
    }

    fn free_host(&self, ptr: HostPtr) -> Result<(), GpuError> {
        let mut state = self.begin("cudaFreeHost", SimCall::FreeHost, None, None)?;
        state
            .host_allocs
            .remove(&ptr.0)
            .map(|_| ())
            .ok_or_else(|| error("cudaFreeHost", ERR_INVALID_VALUE, "invalid host pointer"))
    }

    fn create_event(&self) -> Result<EventHandle, GpuError> {
        let device = self.state.borrow().current_device.unwrap_or(0);
        let mut state = self.begin(
            "cudaEventCreate",
            SimCall::CreateEvent,
            Some(FaultPoint::EventCreate),
            Some(device),
        )?;

        let handle = state.next_handle() as usize;
        state.events.insert(handle, None);
        Ok(EventHandle(handle))
    }

    fn destroy_event(&self, event: EventHandle) -> Result<(), GpuError> {
        let mut state = self.begin("cudaEventDestroy", SimCall::DestroyEvent, None, None)?;
        state
            .events
            .remove(&event.0)
            .map(|_| ())
            .ok_or_else(|| {
                error(
                    "cudaEventDestroy",
                    ERR_INVALID_RESOURCE_HANDLE,
                    "invalid resource handle",
                )
            })
    }

    fn record_event(&self, event: EventHandle) -> Result<(), GpuError> {
        let mut state = self.begin("cudaEventRecord", SimCall::RecordEvent, None, None)?;
        let now = state.clock_secs;
        match state.events.get_mut(&event.0) {
            Some(stamp) => {
                *stamp = Some(now);
                Ok(())
            }
            None => Err(error(
                "cudaEventRecord",
                ERR_INVALID_RESOURCE_HANDLE,
                "invalid resource handle",
            )),
        }
    }

    fn memcpy_dtoh_async(
        &self,
        dst: HostPtr,
        src: DevicePtr,
        bytes: u64,
    ) -> Result<(), GpuError> {
        let api = "cudaMemcpyAsync";
        let device = self.state.borrow().current_device.unwrap_or(0);
        let mut state = self.begin(
            api,
            SimCall::MemcpyDtoH(bytes),
            Some(FaultPoint::Copy),
            Some(device),
        )?;

        let src_ok = state.device_allocs.get(&src.0).is_some_and(|&len| len >= bytes);
        let dst_ok = state.host_allocs.get(&dst.0).is_some_and(|&len| len >= bytes);
        if !(src_ok && dst_ok) {
            return Err(error(api, ERR_INVALID_VALUE, "invalid argument"));
        }

        state.clock_secs += self.latency_secs + bytes as f64 / self.bandwidth;
        Ok(())
    }

    fn synchronize_event(&self, event: EventHandle) -> Result<(), GpuError> {
        let state = self.begin("cudaEventSynchronize", SimCall::SynchronizeEvent, None, None)?;
        if state.events.contains_key(&event.0) {
            Ok(())
        } else {
            Err(error(
                "cudaEventSynchronize",
                ERR_INVALID_RESOURCE_HANDLE,
                "invalid resource handle",
            ))
        }
    }

    fn event_elapsed_ms(&self, start: EventHandle, stop: EventHandle) -> Result<f32, GpuError> {
        let api = "cudaEventElapsedTime";
        let device = self.state.borrow().current_device.unwrap_or(0);
        let state = self.begin(
            api,
            SimCall::ElapsedTime,
            Some(FaultPoint::ElapsedTime),
            Some(device),
        )?;

        let stamp = |e: EventHandle| state.events.get(&e.0).copied().flatten();
        match (stamp(start), stamp(stop)) {
            (Some(t0), Some(t1)) => Ok(((t1 - t0) * 1000.0) as f32),
            _ => Err(error(api, ERR_NOT_READY, "event not recorded")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_count_and_invalid_device() {
        let gpu = SimulatedGpu::new(2);
        assert_eq!(gpu.device_count().unwrap(), 2);
        assert!(gpu.set_device(1).is_ok());

        let err = gpu.set_device(2).unwrap_err();
        assert_eq!(err.code, ERR_INVALID_DEVICE);
        assert_eq!(err.api, "cudaSetDevice");
    }

    #[test]
    fn test_fault_after_n_calls() {
        let gpu = SimulatedGpu::new(1).with(Fault::new(FaultPoint::DeviceAlloc).after(2));
        gpu.set_device(0).unwrap();

        let a = gpu.malloc_device(16).unwrap();
        let b = gpu.malloc_device(16).unwrap();
        assert_ne!(a, b);
        assert!(gpu.malloc_device(16).is_err());
        assert_eq!(gpu.device_allocations_total(), 2);
    }

    #[test]
    fn test_fault_on_single_device() {
        let gpu = SimulatedGpu::new(2).with(Fault::new(FaultPoint::Reset).on_device(1));
        assert!(gpu.reset_device(0).is_ok());
        assert!(gpu.reset_device(1).is_err());
    }

    #[test]
    fn test_out_of_memory() {
        let gpu = SimulatedGpu::new(1).with_device_memory(1 << 20);
        gpu.set_device(0).unwrap();
        let err = gpu.malloc_device(1 << 21).unwrap_err();
        assert_eq!(err.code, ERR_MEMORY_ALLOCATION);
        assert_eq!(gpu.live_device_allocations(), 0);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let gpu = SimulatedGpu::new(1);
        let ptr = gpu.host_alloc_write_combined(64).unwrap();
        assert!(gpu.free_host(ptr).is_ok());
        assert!(gpu.free_host(ptr).is_err());
    }

    #[test]
    fn test_unrecorded_events_have_no_elapsed_time() {
        let gpu = SimulatedGpu::new(1);
        let start = gpu.create_event().unwrap();
        let stop = gpu.create_event().unwrap();
        assert_eq!(
            gpu.event_elapsed_ms(start, stop).unwrap_err().code,
            ERR_NOT_READY
        );
    }

    #[test]
    fn test_calls_are_logged_in_order() {
        let gpu = SimulatedGpu::new(1);
        gpu.reset_device(0).unwrap();
        gpu.set_device(0).unwrap();
        let _ = gpu.malloc_device(8).unwrap();

        assert_eq!(
            gpu.calls(),
            vec![SimCall::Reset(0), SimCall::SetDevice(0), SimCall::MallocDevice(8)]
        );
    }
}
