// ============================================================================
// File: src/host.rs
// ----------------------------------------------------------------------------
// Host-sourced values the invocation compiler may request.
//
// The compiler is deterministic apart from these two inputs:
// - logical core count (only when `cores <= 0`)
// - a random seed for bridged-network MAC addresses
// ============================================================================

use std::sync::OnceLock;

use crate::error::{QvmError, QvmResult};

/// Source of host-dependent values
pub trait HostProbe: Send + Sync + std::fmt::Debug {
    /// Logical core count; fails if the host does not expose one
    fn cpu_cores(&self) -> QvmResult<u32>;

    /// Two random octets, constant for the lifetime of this value
    fn mac_seed(&self) -> [u8; 2];
}

/// Probe backed by the running system
#[derive(Debug, Default)]
pub struct SystemHost {
    seed: OnceLock<[u8; 2]>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostProbe for SystemHost {
    fn cpu_cores(&self) -> QvmResult<u32> {
        match num_cpus::get() {
            0 => Err(QvmError::HostCores {
                reason: "host reported zero logical cores".to_string(),
            }),
            cores => u32::try_from(cores).map_err(|e| QvmError::HostCores {
                reason: e.to_string(),
            }),
        }
    }

    fn mac_seed(&self) -> [u8; 2] {
        *self.seed.get_or_init(|| {
            let bytes = uuid::Uuid::new_v4().into_bytes();
            [bytes[0], bytes[1]]
        })
    }
}
