//! Bounded wait for hypervisor-created files

use std::path::Path;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for a socket before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub attempts: u32,
    pub interval: Duration,
}

impl Readiness {
    /// Check once, never sleep
    pub const fn immediate() -> Self {
        Self {
            attempts: 0,
            interval: Duration::ZERO,
        }
    }

    /// Poll every 100 ms for up to `total`
    pub fn within(total: Duration) -> Self {
        let attempts = total.as_millis().div_ceil(POLL_INTERVAL.as_millis());
        Self {
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            interval: POLL_INTERVAL,
        }
    }

    /// Bound applied right after starting a VM
    pub fn after_start() -> Self {
        Self::within(Duration::from_secs(5))
    }

    pub fn is_immediate(&self) -> bool {
        self.attempts == 0
    }

    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }

    /// True once `path` exists, false if the bound runs out first
    pub fn wait_for(&self, path: &Path) -> bool {
        if path.exists() {
            return true;
        }
        for _ in 0..self.attempts {
            thread::sleep(self.interval);
            if path.exists() {
                return true;
            }
        }
        false
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::immediate()
    }
}
