//! CUDA runtime API calls

use std::ffi::{c_int, c_void, CStr};
use std::ptr;

use cudarc::runtime::sys as rt;
use numacopy_shared::GpuId;
use tracing::debug;

use crate::{DevicePtr, EventHandle, GpuError, GpuRuntime, HostPtr};

/// Convert a CUDA runtime status into a `Result`
fn check(api: &'static str, status: rt::cudaError_t) -> Result<(), GpuError> {
    if status == rt::cudaError::cudaSuccess {
        return Ok(());
    }
    // SAFETY: cudaGetErrorString returns a static, NUL-terminated string for
    //         every status value
    let message = unsafe { CStr::from_ptr(rt::cudaGetErrorString(status)) }
        .to_string_lossy()
        .into_owned();
    Err(GpuError {
        api,
        code: status as i32,
        message,
    })
}

fn to_device_id(api: &'static str, device: GpuId) -> Result<c_int, GpuError> {
    c_int::try_from(device).map_err(|_| GpuError {
        api,
        code: rt::cudaError::cudaErrorInvalidDevice as i32,
        message: format!("device ordinal {} out of range", device),
    })
}

fn to_size(api: &'static str, bytes: u64) -> Result<usize, GpuError> {
    usize::try_from(bytes).map_err(|_| GpuError {
        api,
        code: rt::cudaError::cudaErrorInvalidValue as i32,
        message: format!("size {} does not fit in the address space", bytes),
    })
}

fn event(handle: EventHandle) -> rt::cudaEvent_t {
    handle.0 as rt::cudaEvent_t
}

/// CUDA runtime API back end
///
/// Copies and event records use the legacy default stream, so every copy is
/// ordered after the preceding event record.
#[derive(Debug, Default)]
pub struct CudaRuntime {
    _private: (),
}

impl CudaRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GpuRuntime for CudaRuntime {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn device_count(&self) -> Result<u32, GpuError> {
        let mut count: c_int = 0;
        // SAFETY: count is a valid out-pointer
        check("cudaGetDeviceCount", unsafe {
            rt::cudaGetDeviceCount(&mut count)
        })?;
        Ok(u32::try_from(count).unwrap_or(0))
    }

    fn reset_device(&self, device: GpuId) -> Result<(), GpuError> {
        let id = to_device_id("cudaSetDevice", device)?;
        // cudaDeviceReset acts on the current device
        // SAFETY: plain runtime calls without pointer arguments
        check("cudaSetDevice", unsafe { rt::cudaSetDevice(id) })?;
        check("cudaDeviceReset", unsafe { rt::cudaDeviceReset() })?;
        debug!("reset CUDA device {}", device);
        Ok(())
    }

    fn set_device(&self, device: GpuId) -> Result<(), GpuError> {
        let id = to_device_id("cudaSetDevice", device)?;
        // SAFETY: plain runtime call without pointer arguments
        check("cudaSetDevice", unsafe { rt::cudaSetDevice(id) })
    }

    fn malloc_device(&self, bytes: u64) -> Result<DevicePtr, GpuError> {
        let size = to_size("cudaMalloc", bytes)?;
        let mut dev: *mut c_void = ptr::null_mut();
        // SAFETY: dev is a valid out-pointer
        check("cudaMalloc", unsafe { rt::cudaMalloc(&mut dev, size) })?;
        Ok(DevicePtr(dev as usize as u64))
    }

    fn memset_device(&self, ptr: DevicePtr, value: u8, bytes: u64) -> Result<(), GpuError> {
        let size = to_size("cudaMemset", bytes)?;
        // SAFETY: ptr was returned by cudaMalloc with at least `bytes` bytes
        check("cudaMemset", unsafe {
            rt::cudaMemset(ptr.0 as usize as *mut c_void, c_int::from(value), size)
        })
    }

    fn free_device(&self, ptr: DevicePtr) -> Result<(), GpuError> {
        // SAFETY: ptr was returned by cudaMalloc and is freed once
        check("cudaFree", unsafe {
            rt::cudaFree(ptr.0 as usize as *mut c_void)
        })
    }

    fn host_alloc_write_combined(&self, bytes: u64) -> Result<HostPtr, GpuError> {
        let size = to_size("cudaHostAlloc", bytes)?;
        let mut host: *mut c_void = ptr::null_mut();
        // SAFETY: host is a valid out-pointer
        check("cudaHostAlloc", unsafe {
            rt::cudaHostAlloc(&mut host, size, rt::cudaHostAllocWriteCombined)
        })?;
        Ok(HostPtr(host as usize))
    }

    fn free_host(&self, ptr: HostPtr) -> Result<(), GpuError> {
        // SAFETY: ptr was returned by cudaHostAlloc and is freed once
        check("cudaFreeHost", unsafe {
            rt::cudaFreeHost(ptr.0 as *mut c_void)
        })
    }

    fn create_event(&self) -> Result<EventHandle, GpuError> {
        let mut ev: rt::cudaEvent_t = ptr::null_mut();
        // SAFETY: ev is a valid out-pointer
        check("cudaEventCreate", unsafe { rt::cudaEventCreate(&mut ev) })?;
        Ok(EventHandle(ev as usize))
    }

    fn destroy_event(&self, handle: EventHandle) -> Result<(), GpuError> {
        // SAFETY: handle was returned by cudaEventCreate and is destroyed once
        check("cudaEventDestroy", unsafe {
            rt::cudaEventDestroy(event(handle))
        })
    }

    fn record_event(&self, handle: EventHandle) -> Result<(), GpuError> {
        // SAFETY: live event, null stream is the default stream
        check("cudaEventRecord", unsafe {
            rt::cudaEventRecord(event(handle), ptr::null_mut())
        })
    }

    fn memcpy_dtoh_async(
        &self,
        dst: HostPtr,
        src: DevicePtr,
        bytes: u64,
    ) -> Result<(), GpuError> {
        let size = to_size("cudaMemcpyAsync", bytes)?;
        // SAFETY: both allocations hold at least `bytes` bytes and outlive
        //         the copy, which is fenced before either buffer is freed
        check("cudaMemcpyAsync", unsafe {
            rt::cudaMemcpyAsync(
                dst.0 as *mut c_void,
                src.0 as usize as *const c_void,
                size,
                rt::cudaMemcpyKind::cudaMemcpyDeviceToHost,
                ptr::null_mut(),
            )
        })
    }

    fn synchronize_event(&self, handle: EventHandle) -> Result<(), GpuError> {
        // SAFETY: live event
        check("cudaEventSynchronize", unsafe {
            rt::cudaEventSynchronize(event(handle))
        })
    }

    fn event_elapsed_ms(&self, start: EventHandle, stop: EventHandle) -> Result<f32, GpuError> {
        let mut millis: f32 = 0.0;
        // SAFETY: live events, millis is a valid out-pointer
        check("cudaEventElapsedTime", unsafe {
            rt::cudaEventElapsedTime(&mut millis, event(start), event(stop))
        })?;
        Ok(millis)
    }
}
