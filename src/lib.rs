//! qvm: declarative JSON front-end for QEMU/KVM
//!
//! A VM is described by `<home>/<name>.json`. qvm compiles that description
//! into a hypervisor invocation and manages the resulting process using only
//! the OS process table and socket files as ground truth.

pub mod compiler;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod paths;
pub mod registry;
pub mod settings;

pub use compiler::{compile, Formatting, Invocation};
pub use config::{LoadOptions, VmConfig};
pub use error::{QvmError, QvmResult};
pub use lifecycle::{LifecycleManager, Readiness, Started, StopReport};
pub use settings::Settings;
