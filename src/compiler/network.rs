//! Network blocks

use crate::config::{Net, NetMode};
use crate::error::{QvmError, QvmResult};

use super::{Block, BlockKind, CompileWarning};

/// Locally administered prefix shared by every synthesized MAC
pub const MAC_OUI: &str = "22:d0:46";

/// The interface index is the last MAC octet
pub const MAX_TAP_INTERFACES: usize = 256;

/// Network blocks plus an optional degrade warning
///
/// Bridged mode without TAP interfaces falls back to no networking rather
/// than emitting a half-built device.
pub(super) fn network_blocks(
    net: &Net,
    seed: impl FnOnce() -> [u8; 2],
) -> QvmResult<(Vec<Block>, Option<CompileWarning>)> {
    match net.mode {
        NetMode::Nat => {
            let mut user = String::from("user");
            for mapping in &net.map {
                user.push_str(&format!(",hostfwd=tcp::{}-:{}", mapping.host, mapping.guest));
            }
            let block = Block::new(
                BlockKind::Network,
                vec!["-net".to_string(), user, "-net".to_string(), "nic".to_string()],
            );
            Ok((vec![block], None))
        }
        NetMode::Bridged if net.tap.is_empty() => {
            Ok((vec![no_network()], Some(CompileWarning::BridgedWithoutTap)))
        }
        NetMode::Bridged if net.tap.len() > MAX_TAP_INTERFACES => {
            Err(QvmError::TooManyInterfaces {
                count: net.tap.len(),
                limit: MAX_TAP_INTERFACES,
            })
        }
        NetMode::Bridged => {
            let [a, b] = seed();
            let blocks = net
                .tap
                .iter()
                .enumerate()
                .map(|(index, tap)| {
                    Block::new(
                        BlockKind::Network,
                        vec![
                            "-device".to_string(),
                            format!(
                                "virtio-net,netdev=n{index},mac={MAC_OUI}:{a:02x}:{b:02x}:{index:02x}"
                            ),
                            "-netdev".to_string(),
                            format!(
                                "tap,id=n{index},ifname={tap},script=no,downscript=no,vhost=on"
                            ),
                        ],
                    )
                })
                .collect();
            Ok((blocks, None))
        }
        NetMode::None => Ok((vec![no_network()], None)),
    }
}

fn no_network() -> Block {
    Block::new(BlockKind::Network, ["-nic", "none"])
}
