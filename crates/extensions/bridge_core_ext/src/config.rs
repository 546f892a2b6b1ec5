use crate::ids::NodeId;
use crate::lifecycle::EvictionConfig;
use std::collections::HashSet;

/// Core-facing configuration: everything `bridge_mapper` resolves from
/// the environment before handing the coordinator a ready-to-run config
/// (§6 Configuration — name/index resolution and env parsing happen
/// upstream of this crate).
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Resolved channel indices the bridge accepts packets on. Empty
    /// means "channel 0 only" (§4.1-a).
    pub allowed_channels: HashSet<u32>,
    /// Channel used for Matrix→mesh sends with no reply target to infer
    /// a channel from.
    pub default_outbound_channel: u32,
    /// The locally attached radio's own node id, recorded as the sender
    /// of Matrix-originated packets.
    pub own_node: NodeId,
    pub eviction: EvictionConfig,
}

impl CoreConfig {
    pub fn channel_is_allowed(&self, channel: u32) -> bool {
        if self.allowed_channels.is_empty() {
            channel == 0
        } else {
            self.allowed_channels.contains(&channel)
        }
    }
}
