use std::fmt;

/// A packet identifier assigned by the mesh. Unique within a rolling
/// window, not globally unique (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u32);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{:08x}", self.0)
    }
}

/// Identifies a radio on the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{:08x}", self.0)
    }
}

/// Identifies the specific radio that reported a reception: either an
/// MQTT gateway node, or the synthetic `"lan"` identity of the locally
/// attached radio (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayId {
    Node(NodeId),
    Lan,
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayId::Node(node) => write!(f, "{node}"),
            GatewayId::Lan => write!(f, "lan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_id_renders_as_lowercase_hex_with_bang_prefix() {
        assert_eq!(PacketId(0x1111).to_string(), "!00001111");
        assert_eq!(PacketId(0xAE614908).to_string(), "!ae614908");
    }

    #[test]
    fn lan_gateway_renders_as_lan() {
        assert_eq!(GatewayId::Lan.to_string(), "lan");
        assert_eq!(GatewayId::Node(NodeId(0xAE61)).to_string(), "!0000ae61");
    }
}
