//! Linux NUMA policy through `set_mempolicy(2)` and `sched_setaffinity(2)`
//!
//! Binding a thread to a node means two things: its future page allocations
//! come from that node (`MPOL_BIND`) and it only runs on that node's CPUs.
//! Unbinding returns to `MPOL_DEFAULT` and to the CPU mask the thread had when
//! the controller was created.

use std::ffi::{c_int, c_long, c_ulong};
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr;

use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use numacopy_shared::utils::parse_id_list;
use numacopy_shared::NumaNodeId;
use tracing::{debug, warn};

use super::{BindError, NumaControl};

const MPOL_DEFAULT: c_int = 0;
const MPOL_BIND: c_int = 2;

/// Where the kernel describes NUMA nodes
pub const SYSFS_NODE_DIR: &str = "/sys/devices/system/node";

const MASK_BITS: usize = 8 * mem::size_of::<c_ulong>();

/// NUMA controller backed by the Linux kernel
pub struct LinuxNuma {
    sysfs_root: PathBuf,
    available: bool,
    default_affinity: Option<CpuSet>,
}

impl LinuxNuma {
    pub fn new() -> Self {
        Self::with_sysfs_root(SYSFS_NODE_DIR)
    }

    /// Read node topology from an alternate sysfs directory
    pub fn with_sysfs_root(root: impl Into<PathBuf>) -> Self {
        let default_affinity = sched_getaffinity(Pid::from_raw(0))
            .map_err(|e| warn!("cannot read CPU affinity, it will not be restored: {}", e))
            .ok();
        Self {
            sysfs_root: root.into(),
            available: mempolicy_supported(),
            default_affinity,
        }
    }

    fn node_cpus(&self, node: NumaNodeId) -> Result<Vec<u32>, BindError> {
        read_id_list(&self.sysfs_root.join(format!("node{}", node)).join("cpulist"))
    }
}

impl Default for LinuxNuma {
    fn default() -> Self {
        Self::new()
    }
}

impl NumaControl for LinuxNuma {
    fn is_available(&self) -> bool {
        self.available
    }

    fn nodes(&self) -> Result<Vec<NumaNodeId>, BindError> {
        read_id_list(&self.sysfs_root.join("online"))
    }

    fn bind(&self, node: NumaNodeId) -> Result<(), BindError> {
        if !self.available {
            return Err(BindError::Unsupported);
        }
        if !self.nodes()?.contains(&node) {
            return Err(BindError::UnknownNode(node));
        }

        let mut mask = vec![0 as c_ulong; node as usize / MASK_BITS + 1];
        mask[node as usize / MASK_BITS] |= 1 << (node as usize % MASK_BITS);
        set_mempolicy(MPOL_BIND, &mask)?;

        let cpus = self.node_cpus(node)?;
        if cpus.is_empty() {
            debug!("NUMA node {} has no CPUs, leaving affinity unchanged", node);
            return Ok(());
        }

        set_affinity(&cpu_set(&cpus))
    }

    fn unbind(&self) -> Result<(), BindError> {
        set_mempolicy(MPOL_DEFAULT, &[])?;
        if let Some(set) = &self.default_affinity {
            set_affinity(set)?;
        }
        Ok(())
    }
}

fn read_id_list(path: &Path) -> Result<Vec<u32>, BindError> {
    let os_err = |source| BindError::Os {
        api: "read sysfs node list",
        source,
    };
    let text = std::fs::read_to_string(path).map_err(os_err)?;
    parse_id_list(&text)
        .map_err(|e| os_err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())))
}

/// `get_mempolicy(NULL, NULL, 0, NULL, 0)` succeeds iff the kernel has NUMA
fn mempolicy_supported() -> bool {
    // SAFETY: all-null arguments only query the calling thread's policy mode
    let ret: c_long = unsafe {
        libc::syscall(
            libc::SYS_get_mempolicy,
            ptr::null_mut::<c_int>(),
            ptr::null_mut::<c_ulong>(),
            0 as c_ulong,
            ptr::null_mut::<libc::c_void>(),
            0 as c_ulong,
        )
    };
    ret == 0
}

fn set_mempolicy(mode: c_int, mask: &[c_ulong]) -> Result<(), BindError> {
    let (mask_ptr, maxnode) = if mask.is_empty() {
        (ptr::null(), 0)
    } else {
        (mask.as_ptr(), (mask.len() * MASK_BITS + 1) as c_ulong)
    };
    // SAFETY: mask_ptr covers maxnode - 1 bits, or is null with maxnode 0
    let ret: c_long =
        unsafe { libc::syscall(libc::SYS_set_mempolicy, mode, mask_ptr, maxnode) };
    if ret == 0 {
        Ok(())
    } else {
        Err(BindError::Os {
            api: "set_mempolicy",
            source: io::Error::last_os_error(),
        })
    }
}

/// CPU set holding `cpus`; ids beyond the set's capacity are dropped
fn cpu_set(cpus: &[u32]) -> CpuSet {
    let mut set = CpuSet::new();
    for &cpu in cpus {
        if set.set(cpu as usize).is_err() {
            debug!("CPU {} exceeds the affinity mask, ignoring it", cpu);
        }
    }
    set
}

fn set_affinity(set: &CpuSet) -> Result<(), BindError> {
    sched_setaffinity(Pid::from_raw(0), set).map_err(|errno| BindError::Os {
        api: "sched_setaffinity",
        source: io::Error::from(errno),
    })
}
