// ============================================================================
// File: src/config/schema.rs
// ----------------------------------------------------------------------------
// Declarative VM description as read from `<home>/<name>.json`.
//
// Unknown fields are ignored. Unknown enum values degrade to "none" instead
// of failing; only required fields are fatal.
// ============================================================================

use serde::{Deserialize, Deserializer};

use crate::error::{QvmError, QvmResult};

use super::LoadOptions;

/// Core count used when the field is omitted
pub const DEFAULT_CORES: i64 = 2;

/// Prefix of synthesized mount tags
pub const MOUNT_TAG_PREFIX: &str = "virtfs";

/// One VM's declarative configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Hypervisor-native size, e.g. "6G"
    #[serde(deserialize_with = "null_as_default")]
    pub memory: String,

    /// `<= 0` means "use every host core"
    #[serde(deserialize_with = "cores_or_default")]
    pub cores: i64,

    /// Disk images, attached in order
    #[serde(deserialize_with = "null_as_default")]
    pub disks: Vec<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub display: Display,

    #[serde(deserialize_with = "null_as_default")]
    pub virtio: Virtio,

    /// Shared folders, attached in order
    #[serde(deserialize_with = "null_as_default")]
    pub mount: Vec<MountEntry>,

    #[serde(deserialize_with = "null_as_default")]
    pub net: Net,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            memory: String::new(),
            cores: DEFAULT_CORES,
            disks: Vec::new(),
            display: Display::default(),
            virtio: Virtio::default(),
            mount: Vec::new(),
            net: Net::default(),
        }
    }
}

impl VmConfig {
    /// Required-field checks
    ///
    /// `memory` must hold at least two characters ("6G"); `disks` must be
    /// non-empty only when the options ask for it.
    pub fn validate(&self, options: &LoadOptions) -> QvmResult<()> {
        if self.memory.chars().count() < 2 {
            return Err(QvmError::MissingField { field: "memory" });
        }
        if options.require_disks && self.disks.is_empty() {
            return Err(QvmError::MissingField { field: "disks" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Display {
    pub mode: DisplayMode,
    pub gl: bool,
    pub audio: bool,
}

/// Display backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum DisplayMode {
    Sdl,
    Gtk,
    Spice,
    Vnc,
    #[default]
    None,
}

impl From<Option<String>> for DisplayMode {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("sdl") => Self::Sdl,
            Some("gtk") => Self::Gtk,
            Some("spice") => Self::Spice,
            Some("vnc") => Self::Vnc,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Virtio {
    /// Only the literal "virtio" enables the RNG device
    pub rng: Option<String>,
    pub balloon: bool,
}

impl Virtio {
    pub fn rng_enabled(&self) -> bool {
        self.rng.as_deref() == Some("virtio")
    }
}

/// Shared folder, either a bare host path or a host/tag pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MountEntry {
    Path(String),
    Tagged {
        host: String,
        #[serde(default)]
        tag: String,
    },
}

impl MountEntry {
    pub fn host(&self) -> &str {
        match self {
            Self::Path(host) => host,
            Self::Tagged { host, .. } => host,
        }
    }

    /// Caller-supplied tag, or `virtfs<index>` by position
    pub fn tag(&self, index: usize) -> String {
        match self {
            Self::Tagged { tag, .. } if !tag.is_empty() => tag.clone(),
            _ => format!("{MOUNT_TAG_PREFIX}{index}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Net {
    pub mode: NetMode,

    /// NAT port forwards
    #[serde(deserialize_with = "null_as_default")]
    pub map: Vec<PortMap>,

    /// Bridged TAP interface names
    #[serde(deserialize_with = "null_as_default")]
    pub tap: Vec<String>,
}

/// Network backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum NetMode {
    Nat,
    Bridged,
    #[default]
    None,
}

impl From<Option<String>> for NetMode {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("nat") => Self::Nat,
            Some("bridged") => Self::Bridged,
            _ => Self::None,
        }
    }
}

/// Host-to-guest TCP forward
///
/// Ports are passed through unchecked; the hypervisor rejects bad ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortMap {
    pub guest: i64,
    pub host: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn cores_or_default<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(DEFAULT_CORES))
}
