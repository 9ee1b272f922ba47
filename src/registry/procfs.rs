//! Process table backed by `/proc`

use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::{QvmError, QvmResult};

use super::{ProcessEntry, ProcessQuery};

/// Reads `/proc/<pid>/cmdline` and signals with `kill(2)`
#[derive(Debug, Clone)]
pub struct ProcFsQuery {
    root: PathBuf,
}

impl ProcFsQuery {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read an alternative proc-style tree
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcFsQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessQuery for ProcFsQuery {
    fn processes(&self) -> QvmResult<Vec<ProcessEntry>> {
        let entries = fs::read_dir(&self.root).map_err(|e| QvmError::ProcessTable {
            details: format!("{}: {}", self.root.display(), e),
        })?;

        let mut processes = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            // Processes may exit between listing and reading
            let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
                continue;
            };

            let argv: Vec<String> = raw
                .split(|byte| *byte == 0)
                .filter(|arg| !arg.is_empty())
                .map(|arg| String::from_utf8_lossy(arg).into_owned())
                .collect();

            if !argv.is_empty() {
                processes.push(ProcessEntry { pid, argv });
            }
        }

        debug!("Read {} processes from {}", processes.len(), self.root.display());
        Ok(processes)
    }

    fn terminate(&self, pid: u32) -> QvmResult<()> {
        let raw = i32::try_from(pid).map_err(|e| QvmError::ProcessTable {
            details: format!("invalid pid {pid}: {e}"),
        })?;

        kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| {
            warn!("Failed to signal process {}: {}", pid, errno);
            QvmError::ProcessTable {
                details: format!("kill {pid}: {errno}"),
            }
        })
    }
}
