// ============================================================================
// File: src/compiler/mod.rs
// ----------------------------------------------------------------------------
// Translates a VM config into the hypervisor invocation.
//
// Block order is fixed and some hypervisor builds are sensitive to it:
// base, name, memory, cores, display, audio, rng, balloon, mounts, disks,
// network, monitor.
// ============================================================================

use std::fmt;

use log::debug;

use crate::config::VmConfig;
use crate::error::QvmResult;
use crate::host::HostProbe;
use crate::paths::SocketPaths;
use crate::settings::Settings;

mod devices;
mod network;

pub use network::{MAC_OUI, MAX_TAP_INTERFACES};

/// Flags every invocation starts with, after the binary name
const BASE_FLAGS: [&str; 4] = ["-cpu", "host", "-enable-kvm", "-daemonize"];

/// Display used by the CD-ROM installer when the config is headless
const CDROM_DISPLAY: &str = "gtk,show-cursor=off";

/// Cosmetic layout of a rendered invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting {
    /// Everything on one line
    SingleLine,
    /// One block per line with shell continuations
    Multiline,
}

/// Role of a block within the invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Base,
    Name,
    Memory,
    Cores,
    Display,
    Audio,
    Rng,
    Balloon,
    Mount,
    Disk,
    Network,
    Monitor,
    Cdrom,
}

/// A group of tokens rendered on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub args: Vec<String>,
}

impl Block {
    pub fn new<I, S>(kind: BlockKind, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Degraded-but-successful conditions found while compiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileWarning {
    BridgedWithoutTap,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BridgedWithoutTap => write!(
                f,
                "Bridged network mode selected, but no TAP interfaces specified. Disabling network."
            ),
        }
    }
}

/// Fully resolved hypervisor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub blocks: Vec<Block>,
    pub warnings: Vec<CompileWarning>,
}

impl Invocation {
    /// Every token, binary name included
    pub fn argv(&self) -> Vec<String> {
        self.tokens().cloned().collect()
    }

    fn tokens(&self) -> impl Iterator<Item = &String> {
        self.blocks.iter().flat_map(|block| block.args.iter())
    }

    pub fn blocks_of(&self, kind: BlockKind) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |block| block.kind == kind)
    }

    pub fn render(&self, formatting: Formatting) -> String {
        let separator = match formatting {
            Formatting::SingleLine => " ",
            Formatting::Multiline => " \\\n\t",
        };
        self.blocks
            .iter()
            .map(|block| block.args.join(" "))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Derive the installer invocation: boot from `iso` and force a window
    /// if the config is headless
    pub fn with_cdrom(mut self, iso: &str) -> Self {
        let headless = devices::headless_args();
        for block in &mut self.blocks {
            if block.kind == BlockKind::Display && block.args == headless {
                block.args = vec!["-display".to_string(), CDROM_DISPLAY.to_string()];
            }
        }
        self.blocks.push(Block::new(
            BlockKind::Cdrom,
            vec![
                "-cdrom".to_string(),
                iso.to_string(),
                "-boot".to_string(),
                "d".to_string(),
            ],
        ));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Formatting::SingleLine))
    }
}

/// `cores > 0` is used verbatim, anything else asks the host
pub fn resolve_cores(cores: i64, host: &dyn HostProbe) -> QvmResult<u32> {
    match u32::try_from(cores) {
        Ok(cores) if cores > 0 => Ok(cores),
        _ => host.cpu_cores(),
    }
}

/// Compile a VM config into its invocation
pub fn compile(
    name: &str,
    config: &VmConfig,
    settings: &Settings,
    host: &dyn HostProbe,
) -> QvmResult<Invocation> {
    config.validate(&settings.load)?;

    let sockets = SocketPaths::new(&settings.tmp, name);
    let cores = resolve_cores(config.cores, host)?;

    let mut base = vec![settings.hypervisor.clone()];
    base.extend(BASE_FLAGS.iter().map(|flag| flag.to_string()));

    let mut blocks = vec![
        Block::new(BlockKind::Base, base),
        Block::new(BlockKind::Name, ["-name", name]),
        Block::new(BlockKind::Memory, ["-m", config.memory.as_str()]),
        Block::new(BlockKind::Cores, vec!["-smp".to_string(), cores.to_string()]),
        devices::display_block(&config.display, &sockets.spice),
    ];

    if config.display.audio {
        blocks.push(devices::audio_block());
    }
    blocks.extend(devices::virtio_blocks(&config.virtio));
    blocks.extend(devices::mount_blocks(&config.mount));
    blocks.extend(devices::disk_blocks(&config.disks));

    let (network, warning) = network::network_blocks(&config.net, || host.mac_seed())?;
    blocks.extend(network);

    blocks.push(Block::new(
        BlockKind::Monitor,
        vec![
            "-monitor".to_string(),
            format!("unix:{},server,nowait", sockets.monitor.display()),
        ],
    ));

    debug!("Compiled {} blocks for '{}'", blocks.len(), name);

    Ok(Invocation {
        blocks,
        warnings: warning.into_iter().collect(),
    })
}
