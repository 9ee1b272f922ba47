// ============================================================================
// File: src/lifecycle/launcher.rs
// ----------------------------------------------------------------------------
// External programs the lifecycle manager drives: the hypervisor itself,
// the SPICE viewer and the interactive monitor client.
// ============================================================================

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::{QvmError, QvmResult};

/// Runs a program to completion
pub trait ProcessLauncher: Send + Sync + std::fmt::Debug {
    /// `argv[0]` is the program; returns once it exits successfully
    fn run(&self, argv: &[String], cwd: &Path) -> QvmResult<()>;
}

/// Connects the terminal to a Unix socket
pub trait InteractiveAttacher: Send + Sync + std::fmt::Debug {
    fn attach(&self, socket: &Path) -> QvmResult<()>;
}

/// Launcher using `std::process`
///
/// The hypervisor daemonizes itself, so `run` returns as soon as the
/// foreground process has forked and exited.
#[derive(Debug, Default, Clone)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn run(&self, argv: &[String], cwd: &Path) -> QvmResult<()> {
        let Some((program, args)) = argv.split_first() else {
            return Err(QvmError::Launch {
                program: String::new(),
                details: "empty command line".to_string(),
            });
        };

        info!("Running {} in {}", program, cwd.display());
        debug!("Arguments: {:?}", args);

        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| launch_error(program, e))?;

        if !status.success() {
            return Err(QvmError::Launch {
                program: program.clone(),
                details: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}

/// Attacher that hands the terminal to a netcat-style client (`<client> -U <socket>`)
#[derive(Debug, Clone)]
pub struct CommandAttacher {
    client: String,
}

impl CommandAttacher {
    pub fn new<S: Into<String>>(client: S) -> Self {
        Self {
            client: client.into(),
        }
    }
}

impl InteractiveAttacher for CommandAttacher {
    fn attach(&self, socket: &Path) -> QvmResult<()> {
        info!("Attaching {} to {}", self.client, socket.display());

        let status = Command::new(&self.client)
            .arg("-U")
            .arg(socket)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| launch_error(&self.client, e))?;

        if !status.success() {
            return Err(QvmError::Launch {
                program: self.client.clone(),
                details: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}

fn launch_error(program: &str, err: io::Error) -> QvmError {
    let details = if err.kind() == io::ErrorKind::NotFound {
        "not found in PATH".to_string()
    } else {
        err.to_string()
    };
    QvmError::Launch {
        program: program.to_string(),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_program_in_directory() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir in test");
        let argv = vec!["touch".to_string(), "marker".to_string()];

        SystemLauncher
            .run(&argv, dir.path())
            .expect("Failed to run touch in test");
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn failing_program_is_an_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir in test");
        let result = SystemLauncher.run(&["false".to_string()], dir.path());
        assert!(matches!(result, Err(QvmError::Launch { .. })));
    }

    #[test]
    fn missing_program_is_reported() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir in test");
        let result = SystemLauncher.run(&["qvm-no-such-binary".to_string()], dir.path());
        match result {
            Err(QvmError::Launch { program, details }) => {
                assert_eq!(program, "qvm-no-such-binary");
                assert_eq!(details, "not found in PATH");
            }
            other => panic!("Expected launch error, got {other:?}"),
        }
    }

    #[test]
    fn empty_argv_is_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir in test");
        assert!(SystemLauncher.run(&[], dir.path()).is_err());
    }
}
