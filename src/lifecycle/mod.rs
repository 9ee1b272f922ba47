// ============================================================================
// File: src/lifecycle/mod.rs
// ----------------------------------------------------------------------------
// Start, stop and attach operations for named VMs.
//
// VM state is observed, never stored:
// - Stopped: no hypervisor process carries `-name <vm>`
// - Running: at least one does
// Socket files are a feature signal for attaching, not a lock.
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::compiler::{self, Formatting, Invocation};
use crate::config::{self, DisplayMode, VmConfig};
use crate::error::{QvmError, QvmResult};
use crate::host::{HostProbe, SystemHost};
use crate::paths::SocketPaths;
use crate::registry::{ProcFsQuery, ProcessQuery, ProcessRegistry};
use crate::settings::Settings;

mod launcher;
mod readiness;

pub use launcher::{CommandAttacher, InteractiveAttacher, ProcessLauncher, SystemLauncher};
pub use readiness::Readiness;

/// Outcome of a successful stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub name: String,
    pub signalled: BTreeSet<u32>,
}

/// A launched VM, before any viewer is opened
#[derive(Debug, Clone)]
pub struct Started {
    pub name: String,
    pub invocation: Invocation,
    pub display: DisplayMode,
}

/// Orchestrates VM operations over injected collaborators
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    settings: Settings,
    host: Arc<dyn HostProbe>,
    processes: Arc<dyn ProcessQuery>,
    launcher: Arc<dyn ProcessLauncher>,
    attacher: Arc<dyn InteractiveAttacher>,
}

impl LifecycleManager {
    pub fn new(
        settings: Settings,
        host: Arc<dyn HostProbe>,
        processes: Arc<dyn ProcessQuery>,
        launcher: Arc<dyn ProcessLauncher>,
        attacher: Arc<dyn InteractiveAttacher>,
    ) -> Self {
        Self {
            settings,
            host,
            processes,
            launcher,
            attacher,
        }
    }

    /// Manager wired to the live system
    pub fn system(settings: Settings) -> Self {
        let attacher = CommandAttacher::new(settings.monitor_client.clone());
        Self::new(
            settings,
            Arc::new(SystemHost::new()),
            Arc::new(ProcFsQuery::new()),
            Arc::new(SystemLauncher),
            Arc::new(attacher),
        )
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn registry(&self) -> ProcessRegistry<'_> {
        ProcessRegistry::new(self.processes.as_ref(), &self.settings.hypervisor)
    }

    fn sockets(&self, name: &str) -> SocketPaths {
        SocketPaths::new(&self.settings.tmp, name)
    }

    /// Load the config for `name` from the home directory
    pub fn load(&self, name: &str) -> QvmResult<VmConfig> {
        let path = self.settings.config_path(name);
        if !path.exists() {
            return Err(QvmError::ConfigNotFound {
                name: name.to_string(),
                path,
            });
        }
        config::load(&path, &self.settings.load)
    }

    /// Load and compile, reporting degrade warnings
    pub fn compile(&self, name: &str) -> QvmResult<(VmConfig, Invocation)> {
        let config = self.load(name)?;
        let invocation = compiler::compile(name, &config, &self.settings, self.host.as_ref())?;
        for warning in &invocation.warnings {
            warn!("{}", warning);
        }
        Ok((config, invocation))
    }

    /// Rendered invocation, without running it
    pub fn command(&self, name: &str, formatting: Formatting) -> QvmResult<String> {
        let (_, invocation) = self.compile(name)?;
        Ok(invocation.render(formatting))
    }

    /// Compile and launch; returns once the hypervisor has daemonized
    ///
    /// Success means the hypervisor accepted the arguments, not that the
    /// guest is up. No viewer is opened here, see [`Self::open_viewer`].
    pub fn start(&self, name: &str) -> QvmResult<Started> {
        let (config, invocation) = self.compile(name)?;
        self.launch(name, invocation, config.display.mode)
    }

    /// Start from an installer ISO, forcing a window if the VM is headless
    pub fn start_cdrom(&self, name: &str, iso: &str) -> QvmResult<Started> {
        let (config, invocation) = self.compile(name)?;
        self.launch(name, invocation.with_cdrom(iso), config.display.mode)
    }

    /// Open the SPICE viewer for a freshly started VM
    ///
    /// Does nothing for other display modes. A failure here leaves the VM
    /// running.
    pub fn open_viewer(&self, started: &Started, readiness: Readiness) -> QvmResult<()> {
        if started.display != DisplayMode::Spice {
            debug!("'{}' has no SPICE display, not opening a viewer", started.name);
            return Ok(());
        }
        self.attach_display(&started.name, readiness)
    }

    fn launch(
        &self,
        name: &str,
        invocation: Invocation,
        display: DisplayMode,
    ) -> QvmResult<Started> {
        info!("Starting '{}' VM", name);
        self.launcher.run(&invocation.argv(), &self.settings.home)?;
        Ok(Started {
            name: name.to_string(),
            invocation,
            display,
        })
    }

    /// Terminate every process of the VM and remove its sockets
    ///
    /// A failed signal does not stop the remaining ones; the failure is
    /// reported after cleanup.
    pub fn stop(&self, name: &str) -> QvmResult<StopReport> {
        let registry = self.registry();
        let pids = registry.find_running(name)?;
        if pids.is_empty() {
            return Err(QvmError::NotActive {
                name: name.to_string(),
            });
        }

        let mut failed = Vec::new();
        for pid in &pids {
            match registry.terminate(*pid) {
                Ok(()) => debug!("Signalled process {} of '{}'", pid, name),
                Err(e) => {
                    error!("{}", e);
                    failed.push(*pid);
                }
            }
        }

        let sockets = self.sockets(name);
        remove_socket(&sockets.monitor);
        remove_socket(&sockets.spice);

        if !failed.is_empty() {
            return Err(QvmError::SignalFailed {
                name: name.to_string(),
                pids: failed,
            });
        }

        info!("Stopped '{}' VM ({} process(es))", name, pids.len());
        Ok(StopReport {
            name: name.to_string(),
            signalled: pids,
        })
    }

    /// Names of running VMs
    pub fn list(&self) -> QvmResult<BTreeSet<String>> {
        self.registry().list_names()
    }

    /// Connect the terminal to the VM's monitor socket
    pub fn attach_monitor(&self, name: &str, readiness: Readiness) -> QvmResult<()> {
        let socket = self.sockets(name).monitor;
        await_socket(name, "monitor", &socket, readiness)?;
        self.attacher.attach(&socket)
    }

    /// Open the SPICE viewer against the VM's socket
    pub fn attach_display(&self, name: &str, readiness: Readiness) -> QvmResult<()> {
        let sockets = self.sockets(name);
        await_socket(name, "SPICE", &sockets.spice, readiness)?;

        let argv = vec![self.settings.viewer.clone(), sockets.spice_uri()];
        self.launcher.run(&argv, &self.settings.home)
    }
}

fn await_socket(
    name: &str,
    kind: &'static str,
    path: &Path,
    readiness: Readiness,
) -> QvmResult<()> {
    if readiness.wait_for(path) {
        return Ok(());
    }
    if readiness.is_immediate() {
        Err(QvmError::SocketMissing {
            name: name.to_string(),
            kind,
            path: path.to_path_buf(),
        })
    } else {
        Err(QvmError::SocketTimeout {
            name: name.to_string(),
            kind,
            path: path.to_path_buf(),
            waited_ms: readiness.budget().as_millis(),
        })
    }
}

/// Missing files are fine; anything else is logged and ignored
fn remove_socket(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
