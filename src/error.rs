// ============================================================================
// File: src/error.rs
// ----------------------------------------------------------------------------
// Crate-wide error type
// ============================================================================

use std::path::PathBuf;

/// Fatal conditions
///
/// Anything that should stop the current operation and exit non-zero.
/// Degraded-but-successful conditions are not represented here; the
/// compiler reports those as [`crate::compiler::CompileWarning`]s.
#[derive(Debug, thiserror::Error)]
pub enum QvmError {
    /// No config file exists for the VM name
    #[error("Could not find '{name}' VM (expected {})", path.display())]
    ConfigNotFound { name: String, path: PathBuf },

    /// Config file exists but could not be read
    #[error("Failed to read {}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not well-formed JSON for the schema
    #[error("Malformed config {}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is missing or empty
    #[error("JSON: '.{field}' field is required.")]
    MissingField { field: &'static str },

    /// More bridged interfaces than distinct synthesized MAC addresses
    #[error("{count} TAP interfaces requested, but at most {limit} get distinct MAC addresses")]
    TooManyInterfaces { count: usize, limit: usize },

    /// Host did not expose a usable core count
    #[error("Could not detect host core count: {reason}")]
    HostCores { reason: String },

    /// Process table could not be enumerated
    #[error("Failed to query process table: {details}")]
    ProcessTable { details: String },

    /// Stop requested for a VM with no matching process
    #[error("'{name}' VM, not active.")]
    NotActive { name: String },

    /// Socket required for attaching does not exist
    #[error("'{name}' does not have an available {kind} socket at {}", path.display())]
    SocketMissing {
        name: String,
        kind: &'static str,
        path: PathBuf,
    },

    /// Socket did not appear within the readiness bound
    #[error("Timed out after {waited_ms} ms waiting for '{name}' {kind} socket at {}", path.display())]
    SocketTimeout {
        name: String,
        kind: &'static str,
        path: PathBuf,
        waited_ms: u128,
    },

    /// External program could not be run or exited unsuccessfully
    #[error("Failed to run {program}: {details}")]
    Launch { program: String, details: String },

    /// One or more processes did not accept the termination signal
    #[error("Failed to signal '{name}' VM processes: {pids:?}")]
    SignalFailed { name: String, pids: Vec<u32> },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for qvm operations
pub type QvmResult<T> = Result<T, QvmError>;
