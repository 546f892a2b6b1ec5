use crate::ids::GatewayId;
use crate::ids::NodeId;
use crate::ids::PacketId;
use clock::Timestamp;
use std::collections::HashSet;

/// Where a packet observation was reported from (§4.1 entrypoint tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Mqtt,
    Lan,
}

/// A single gateway's observation of a packet (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ReceptionStats {
    pub gateway_id: GatewayId,
    /// dBm, 0 if unknown.
    pub rssi: i32,
    /// dB, 0.0 if unknown.
    pub snr: f32,
    /// `hop_start - hop_limit` at the receiving node; 0 is direct reception.
    pub hop_count: u32,
    pub timestamp: Timestamp,
}

/// Insertion-ordered set of per-gateway receptions: rendering needs
/// arrival order (§8.2), membership tests need to be O(1) (§4.1-f).
#[derive(Debug, Clone, Default)]
pub struct ReceptionList {
    seen: HashSet<GatewayId>,
    ordered: Vec<ReceptionStats>,
}

impl ReceptionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `stats` iff no entry with the same `gateway_id` exists yet.
    /// Returns whether it was inserted.
    pub fn insert(&mut self, stats: ReceptionStats) -> bool {
        if self.seen.insert(stats.gateway_id) {
            self.ordered.push(stats);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReceptionStats> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// One per logical mesh packet the bridge has surfaced in the Matrix room
/// (§3).
#[derive(Debug, Clone)]
pub struct MessageState {
    pub packet_id: PacketId,
    pub matrix_event_id: Option<String>,
    pub sender_node: NodeId,
    pub channel_index: u32,
    pub original_text: String,
    pub reception_list: ReceptionList,
    pub is_matrix_origin: bool,
    pub matrix_origin_event_id: Option<String>,
    pub parent_packet_id: Option<PacketId>,
    pub replies: Vec<PacketId>,
    pub reactions: Vec<Reaction>,
    pub created_at: Timestamp,
    pub last_update_at: Timestamp,
}

/// A tapback recorded against its parent, aggregated by emoji at render
/// time (§4.2).
#[derive(Debug, Clone)]
pub struct Reaction {
    pub emoji: String,
    pub reactor: String,
}

impl MessageState {
    pub fn new(
        packet_id: PacketId,
        sender_node: NodeId,
        channel_index: u32,
        original_text: String,
        now: Timestamp,
    ) -> Self {
        MessageState {
            packet_id,
            matrix_event_id: None,
            sender_node,
            channel_index,
            original_text,
            reception_list: ReceptionList::new(),
            is_matrix_origin: false,
            matrix_origin_event_id: None,
            parent_packet_id: None,
            replies: Vec::new(),
            reactions: Vec::new(),
            created_at: now,
            last_update_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;

    fn stats_for(node: u32) -> ReceptionStats {
        ReceptionStats {
            gateway_id: GatewayId::Node(NodeId(node)),
            rssi: 0,
            snr: 0.0,
            hop_count: 0,
            timestamp: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    proptest! {
        /// The number of distinct gateways a [ReceptionList] ends up holding
        /// doesn't depend on the order receptions arrive in, even though
        /// the list itself preserves arrival order for rendering (§8.2).
        #[test]
        fn dedup_count_is_order_independent(mut ids in proptest::collection::vec(0u32..6, 0..6)) {
            ids.sort();
            ids.dedup();
            let mut forward = ReceptionList::new();
            for &id in &ids {
                forward.insert(stats_for(id));
            }
            let mut reversed = ReceptionList::new();
            for &id in ids.iter().rev() {
                reversed.insert(stats_for(id));
            }
            prop_assert_eq!(forward.len(), reversed.len());
            prop_assert_eq!(forward.len(), ids.len());
        }
    }
}
