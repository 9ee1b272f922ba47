//! VM configuration model

mod loader;
mod schema;

pub use loader::{load, parse, strip_comment_lines, LoadOptions};
pub use schema::{
    Display, DisplayMode, MountEntry, Net, NetMode, PortMap, Virtio, VmConfig, DEFAULT_CORES,
    MOUNT_TAG_PREFIX,
};
