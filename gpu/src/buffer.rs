//! Scoped device and host allocations

use tracing::{debug, warn};

use crate::{DevicePtr, GpuError, GpuRuntime, HostPtr};

/// Device memory owned for the lifetime of the value
pub struct DeviceBuffer<'rt, R: GpuRuntime + ?Sized> {
    runtime: &'rt R,
    ptr: DevicePtr,
    len: u64,
}

impl<'rt, R: GpuRuntime + ?Sized> DeviceBuffer<'rt, R> {
    /// Allocate `len` bytes on the current device
    pub fn allocate(runtime: &'rt R, len: u64) -> Result<Self, GpuError> {
        let ptr = runtime.malloc_device(len)?;
        debug!("allocated {} device bytes at {:#x}", len, ptr.0);
        Ok(Self { runtime, ptr, len })
    }

    /// Set every byte of the buffer to `value`
    pub fn fill(&mut self, value: u8) -> Result<(), GpuError> {
        self.runtime.memset_device(self.ptr, value, self.len)
    }

    pub fn as_ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<R: GpuRuntime + ?Sized> Drop for DeviceBuffer<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.free_device(self.ptr) {
            warn!("failed to free device buffer {:#x}: {}", self.ptr.0, e);
        }
    }
}

/// Pinned, write-combined host memory owned for the lifetime of the value
///
/// The host never reads or writes this memory; it only serves as a copy
/// destination, which is the access pattern write-combining favors.
pub struct HostBuffer<'rt, R: GpuRuntime + ?Sized> {
    runtime: &'rt R,
    ptr: HostPtr,
    len: u64,
}

impl<'rt, R: GpuRuntime + ?Sized> HostBuffer<'rt, R> {
    /// Allocate `len` bytes of pinned write-combined memory
    ///
    /// Page placement follows the calling thread's memory policy, so a NUMA
    /// binding must be in place before calling this.
    pub fn allocate_write_combined(runtime: &'rt R, len: u64) -> Result<Self, GpuError> {
        let ptr = runtime.host_alloc_write_combined(len)?;
        debug!("allocated {} write-combined host bytes at {:#x}", len, ptr.0);
        Ok(Self { runtime, ptr, len })
    }

    pub fn as_ptr(&self) -> HostPtr {
        self.ptr
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<R: GpuRuntime + ?Sized> Drop for HostBuffer<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.free_host(self.ptr) {
            warn!("failed to free host buffer {:#x}: {}", self.ptr.0, e);
        }
    }
}
