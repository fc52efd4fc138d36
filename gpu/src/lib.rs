//! GPU runtime layer
//!
//! Everything the benchmark needs from a GPU runtime is expressed by the
//! [`GpuRuntime`] trait: device reset/selection, device and pinned host
//! allocations, timing events and the asynchronous device-to-host copy.
//! Allocations and events are wrapped in scoped owners ([`DeviceBuffer`],
//! [`HostBuffer`], [`TransferTimer`]) which release them on drop.
//!
//! Two back ends are provided: [`sim::SimulatedGpu`], a deterministic model
//! used by tests and dry runs, and `cuda::CudaRuntime` behind the `cuda`
//! feature.

pub mod buffer;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod sim;
pub mod timer;

pub use buffer::{DeviceBuffer, HostBuffer};
pub use timer::{TimerError, TimingSample, TransferTimer};

use numacopy_shared::GpuId;
use thiserror::Error;

/// Address of a device memory allocation
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct DevicePtr(pub u64);

/// Address of a pinned host memory allocation
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct HostPtr(pub usize);

/// Handle to a GPU timing event
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct EventHandle(pub usize);

/// Error reported by a GPU runtime entry point
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("GPU runtime call {api} failed with code {code}: {message}")]
pub struct GpuError {
    /// Runtime entry point that failed
    pub api: &'static str,

    /// Runtime-specific error code
    pub code: i32,

    /// Runtime-provided description of the error
    pub message: String,
}

/// Operations the benchmark needs from a GPU runtime
///
/// All operations act on the calling thread's current device. Copies and
/// event records go to the default stream.
pub trait GpuRuntime {
    /// Short back end name, used in reports
    fn name(&self) -> &'static str;

    /// Number of usable devices
    fn device_count(&self) -> Result<u32, GpuError>;

    /// Destroy all state associated with `device`
    fn reset_device(&self, device: GpuId) -> Result<(), GpuError>;

    /// Make `device` current for the calling thread
    fn set_device(&self, device: GpuId) -> Result<(), GpuError>;

    fn malloc_device(&self, bytes: u64) -> Result<DevicePtr, GpuError>;

    fn memset_device(&self, ptr: DevicePtr, value: u8, bytes: u64) -> Result<(), GpuError>;

    fn free_device(&self, ptr: DevicePtr) -> Result<(), GpuError>;

    /// Allocate page-locked host memory with write-combined caching
    fn host_alloc_write_combined(&self, bytes: u64) -> Result<HostPtr, GpuError>;

    fn free_host(&self, ptr: HostPtr) -> Result<(), GpuError>;

    fn create_event(&self) -> Result<EventHandle, GpuError>;

    fn destroy_event(&self, event: EventHandle) -> Result<(), GpuError>;

    fn record_event(&self, event: EventHandle) -> Result<(), GpuError>;

    /// Issue an asynchronous copy of `bytes` from `src` to `dst`
    fn memcpy_dtoh_async(&self, dst: HostPtr, src: DevicePtr, bytes: u64)
        -> Result<(), GpuError>;

    /// Block until `event` has completed
    fn synchronize_event(&self, event: EventHandle) -> Result<(), GpuError>;

    /// Elapsed time between two recorded events, in milliseconds
    fn event_elapsed_ms(&self, start: EventHandle, stop: EventHandle) -> Result<f32, GpuError>;
}
