//! NUMA memory binding
//!
//! A case binds the calling thread's memory policy (and CPU affinity) to one
//! NUMA node while its host buffer is allocated and used. The binding is a
//! [`NumaBinding`] guard: it is established on construction and released on
//! drop, so no exit path leaves the policy bound.

#[cfg(target_os = "linux")]
pub mod linux;
pub mod sim;

use numacopy_shared::NumaNodeId;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(target_os = "linux")]
pub use linux::LinuxNuma;
pub use sim::SimulatedNuma;

/// NUMA binding failure
#[derive(Debug, Error)]
pub enum BindError {
    #[error("NUMA node {0} is not available on this host")]
    UnknownNode(NumaNodeId),

    #[error("NUMA control is not supported on this host")]
    Unsupported,

    #[error("{api} failed")]
    Os {
        api: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Control over the calling thread's NUMA placement
pub trait NumaControl {
    /// Whether NUMA policy calls work on this host
    fn is_available(&self) -> bool;

    /// Online NUMA node ids
    fn nodes(&self) -> Result<Vec<NumaNodeId>, BindError>;

    /// Restrict allocations and execution of the calling thread to `node`
    fn bind(&self, node: NumaNodeId) -> Result<(), BindError>;

    /// Restore the default (any node) policy
    fn unbind(&self) -> Result<(), BindError>;
}

/// Controller for hosts without NUMA support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNuma;

impl NumaControl for NoNuma {
    fn is_available(&self) -> bool {
        false
    }

    fn nodes(&self) -> Result<Vec<NumaNodeId>, BindError> {
        Ok(Vec::new())
    }

    fn bind(&self, _node: NumaNodeId) -> Result<(), BindError> {
        Err(BindError::Unsupported)
    }

    fn unbind(&self) -> Result<(), BindError> {
        Ok(())
    }
}

/// NUMA controller of the running host
pub fn host_numa() -> Box<dyn NumaControl> {
    #[cfg(target_os = "linux")]
    {
        Box::new(LinuxNuma::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(NoNuma)
    }
}

/// Active binding to one NUMA node, released on drop
pub struct NumaBinding<'a, N: NumaControl + ?Sized> {
    control: &'a N,
    node: NumaNodeId,
}

impl<'a, N: NumaControl + ?Sized> NumaBinding<'a, N> {
    /// Bind the calling thread to `node`
    ///
    /// A failed bind still restores the default policy, since the
    /// controller may have applied part of the binding.
    pub fn bind(control: &'a N, node: NumaNodeId) -> Result<Self, BindError> {
        if let Err(e) = control.bind(node) {
            restore_default(control);
            return Err(e);
        }
        debug!("bound to NUMA node {}", node);
        Ok(Self { control, node })
    }

    pub fn node(&self) -> NumaNodeId {
        self.node
    }
}

impl<N: NumaControl + ?Sized> Drop for NumaBinding<'_, N> {
    fn drop(&mut self) {
        restore_default(self.control);
        debug!("released binding to NUMA node {}", self.node);
    }
}

fn restore_default<N: NumaControl + ?Sized>(control: &N) {
    if let Err(e) = control.unbind() {
        warn!("failed to restore default NUMA policy: {}", e);
    }
}
