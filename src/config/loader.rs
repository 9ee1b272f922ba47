//! Reading and validating VM config files

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{QvmError, QvmResult};

use super::schema::VmConfig;

/// Pre-processing and validation switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Drop whole lines starting with `//` before parsing
    pub strip_comments: bool,

    /// Fail when `disks` is empty
    pub require_disks: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strip_comments: true,
            require_disks: false,
        }
    }
}

/// Load, parse and validate a config file
pub fn load(path: &Path, options: &LoadOptions) -> QvmResult<VmConfig> {
    debug!("Loading VM config from {}", path.display());

    let raw = fs::read_to_string(path).map_err(|source| QvmError::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse(&raw, options).map_err(|source| QvmError::ConfigMalformed {
        path: path.to_path_buf(),
        source,
    })?;

    config.validate(options)?;
    Ok(config)
}

/// Parse config text without validating required fields
pub fn parse(raw: &str, options: &LoadOptions) -> serde_json::Result<VmConfig> {
    if options.strip_comments {
        serde_json::from_str(&strip_comment_lines(raw))
    } else {
        serde_json::from_str(raw)
    }
}

/// Blank out `//` comment lines, keeping line numbers for parse errors
pub fn strip_comment_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            if line.trim_start().starts_with("//") {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
