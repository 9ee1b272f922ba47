// ============================================================================
// File: src/settings.rs
// ----------------------------------------------------------------------------
// Immutable runtime settings for qvm.
//
// Built once at startup from the environment and passed by reference to
// every component that needs a path or an external program name.
// ============================================================================

use std::fs;
use std::path::{self, PathBuf};

use log::warn;

use crate::config::LoadOptions;
use crate::error::QvmResult;

/// Explicit home directory override
pub const ENV_HOME: &str = "QVM_HOME";
pub const ENV_XDG_DATA_HOME: &str = "XDG_DATA_HOME";
pub const ENV_XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";
pub const ENV_XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
pub const ENV_USER_HOME: &str = "HOME";

/// Program overrides
pub const ENV_HYPERVISOR: &str = "QVM_HYPERVISOR";
pub const ENV_VIEWER: &str = "QVM_VIEWER";
pub const ENV_MONITOR_CLIENT: &str = "QVM_MONITOR_CLIENT";

const DIR_NAME: &str = "qvm";
const TMP_DIR_NAME: &str = "tmp";

const DEFAULT_HYPERVISOR: &str = "qemu-system-x86_64";
const DEFAULT_VIEWER: &str = "remote-viewer";
const DEFAULT_MONITOR_CLIENT: &str = "nc";

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `<name>.json` VM configs
    pub home: PathBuf,

    /// Directory holding hypervisor-created sockets
    pub tmp: PathBuf,

    /// Hypervisor binary, first token of every invocation
    pub hypervisor: String,

    /// SPICE viewer binary
    pub viewer: String,

    /// Interactive Unix-socket client used for the monitor
    pub monitor_client: String,

    /// Config pre-processing and validation switches
    pub load: LoadOptions,
}

impl Settings {
    /// Create settings rooted at `home` with default program names
    ///
    /// A relative `home` is resolved against the working directory.
    pub fn new<P: Into<PathBuf>>(home: P) -> Self {
        let home = anchor(home.into());
        let tmp = home.join(TMP_DIR_NAME);
        Self {
            home,
            tmp,
            hypervisor: DEFAULT_HYPERVISOR.to_string(),
            viewer: DEFAULT_VIEWER.to_string(),
            monitor_client: DEFAULT_MONITOR_CLIENT.to_string(),
            load: LoadOptions::default(),
        }
    }

    /// Resolve settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let mut settings = Self::new(resolve_home(&get));
        if let Some(hypervisor) = get(ENV_HYPERVISOR) {
            settings.hypervisor = hypervisor;
        }
        if let Some(viewer) = get(ENV_VIEWER) {
            settings.viewer = viewer;
        }
        if let Some(client) = get(ENV_MONITOR_CLIENT) {
            settings.monitor_client = client;
        }
        settings
    }

    /// Replace config loading options
    pub fn with_load_options(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }

    /// Path of the config file for a VM
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.home.join(format!("{name}.json"))
    }

    /// Create the home and tmp directories if missing
    pub fn ensure_dirs(&self) -> QvmResult<()> {
        fs::create_dir_all(&self.home)?;
        fs::create_dir_all(&self.tmp)?;
        Ok(())
    }
}

fn anchor(home: PathBuf) -> PathBuf {
    match path::absolute(&home) {
        Ok(absolute) => absolute,
        Err(e) => {
            warn!("Failed to resolve {} against the working directory: {}", home.display(), e);
            home
        }
    }
}

/// Pick the home directory from the first set variable
///
/// Order: explicit override, XDG data, XDG runtime, XDG config, user home,
/// then the working directory.
fn resolve_home<F>(get: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(home) = get(ENV_HOME) {
        return PathBuf::from(home);
    }

    for key in [ENV_XDG_DATA_HOME, ENV_XDG_RUNTIME_DIR, ENV_XDG_CONFIG_HOME] {
        if let Some(base) = get(key) {
            return PathBuf::from(base).join(DIR_NAME);
        }
    }

    if let Some(user_home) = get(ENV_USER_HOME) {
        warn!(
            "Couldn't find {ENV_HOME}, {ENV_XDG_DATA_HOME}, {ENV_XDG_RUNTIME_DIR}, \
             {ENV_XDG_CONFIG_HOME} env variables, using {ENV_USER_HOME}."
        );
        return PathBuf::from(user_home).join(format!(".{DIR_NAME}"));
    }

    warn!(
        "Couldn't find {ENV_HOME}, {ENV_XDG_DATA_HOME}, {ENV_XDG_RUNTIME_DIR}, \
         {ENV_XDG_CONFIG_HOME} or even {ENV_USER_HOME} env variables, using working directory."
    );
    PathBuf::from(DIR_NAME)
}
