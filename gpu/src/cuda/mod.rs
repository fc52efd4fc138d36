//! CUDA runtime back end
//!
//! Maps [`GpuRuntime`](crate::GpuRuntime) onto the CUDA runtime API through
//! the raw `cudarc` bindings.

pub mod runtime;

pub use runtime::CudaRuntime;
