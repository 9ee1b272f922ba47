//! Socket paths derived from a VM name

use std::path::{Path, PathBuf};

pub const MONITOR_SOCKET_SUFFIX: &str = ".mon.sock";
pub const SPICE_SOCKET_SUFFIX: &str = ".spice.sock";

/// Hypervisor-created sockets for one VM
///
/// Never stored; the compiler and the lifecycle manager derive the same
/// values from the tmp directory and the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPaths {
    pub monitor: PathBuf,
    pub spice: PathBuf,
}

impl SocketPaths {
    pub fn new(tmp: &Path, name: &str) -> Self {
        Self {
            monitor: tmp.join(format!("{name}{MONITOR_SOCKET_SUFFIX}")),
            spice: tmp.join(format!("{name}{SPICE_SOCKET_SUFFIX}")),
        }
    }

    /// Viewer endpoint for the SPICE socket
    pub fn spice_uri(&self) -> String {
        format!("spice+unix://{}", self.spice.display())
    }
}
