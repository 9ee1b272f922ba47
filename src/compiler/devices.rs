// ============================================================================
// File: src/compiler/devices.rs
// ----------------------------------------------------------------------------
// Display, audio, virtio, shared-folder and disk blocks.
// ============================================================================

use std::path::Path;

use crate::config::{Display, DisplayMode, MountEntry, Virtio};

use super::{Block, BlockKind};

/// VNC display index; every VM on the host binds the same one
const VNC_DISPLAY: &str = ":0";

const SPICE_AGENT_CHANNEL: &str = "com.redhat.spice.0";

/// Display block; unknown or absent modes yield a headless VM
pub(super) fn display_block(display: &Display, spice_socket: &Path) -> Block {
    let args: Vec<String> = match display.mode {
        DisplayMode::Sdl | DisplayMode::Gtk => {
            let backend = if display.mode == DisplayMode::Sdl {
                "sdl"
            } else {
                "gtk"
            };
            if display.gl {
                vec![
                    "-device".into(),
                    "virtio-vga,virgl=on".into(),
                    "-display".into(),
                    format!("{backend},gl=on,show-cursor=on"),
                ]
            } else {
                vec!["-display".into(), format!("{backend},show-cursor=off")]
            }
        }
        DisplayMode::Spice => {
            let gl = if display.gl { ",gl=on" } else { "" };
            vec![
                "-vga".into(),
                "qxl".into(),
                "-spice".into(),
                format!(
                    "addr={},disable-ticketing=on,unix=on{gl}",
                    spice_socket.display()
                ),
                "-device".into(),
                "virtio-serial".into(),
                "-chardev".into(),
                "spicevmc,id=vdagent,name=vdagent".into(),
                "-device".into(),
                format!("virtserialport,chardev=vdagent,name={SPICE_AGENT_CHANNEL}"),
            ]
        }
        DisplayMode::Vnc => vec!["-vnc".into(), VNC_DISPLAY.into()],
        DisplayMode::None => headless_args(),
    };
    Block::new(BlockKind::Display, args)
}

pub(super) fn headless_args() -> Vec<String> {
    vec!["-display".into(), "none".into()]
}

pub(super) fn audio_block() -> Block {
    Block::new(
        BlockKind::Audio,
        ["-device", "intel-hda", "-device", "hda-duplex"],
    )
}

pub(super) fn virtio_blocks(virtio: &Virtio) -> Vec<Block> {
    let mut blocks = Vec::new();
    if virtio.rng_enabled() {
        blocks.push(Block::new(
            BlockKind::Rng,
            [
                "-object",
                "rng-random,id=rng0,filename=/dev/urandom",
                "-device",
                "virtio-rng-pci,rng=rng0",
            ],
        ));
    }
    if virtio.balloon {
        blocks.push(Block::new(BlockKind::Balloon, ["-device", "virtio-balloon"]));
    }
    blocks
}

pub(super) fn mount_blocks(mounts: &[MountEntry]) -> impl Iterator<Item = Block> + '_ {
    mounts.iter().enumerate().map(|(index, mount)| {
        Block::new(
            BlockKind::Mount,
            vec![
                "-virtfs".to_string(),
                format!(
                    "local,path={},mount_tag={},security_model=mapped-xattr",
                    mount.host(),
                    mount.tag(index)
                ),
            ],
        )
    })
}

pub(super) fn disk_blocks(disks: &[String]) -> impl Iterator<Item = Block> + '_ {
    disks.iter().map(|disk| {
        Block::new(
            BlockKind::Disk,
            vec!["-drive".to_string(), format!("file={disk},media=disk")],
        )
    })
}
