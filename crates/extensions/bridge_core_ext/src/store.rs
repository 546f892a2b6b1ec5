use crate::error::BridgeError;
use crate::ids::PacketId;
use crate::state::MessageState;
use std::collections::HashMap;

/// Holds every [MessageState] the bridge currently tracks, indexed both by
/// the mesh `packet_id` and by the Matrix event it was rendered to (§3).
///
/// Owned exclusively by the [crate::actor::BridgeActor] task: the actor
/// model is what gives us serialization across concurrent packet arrivals
/// (§9), so this store does no locking of its own.
#[derive(Debug, Default)]
pub struct MessageStore {
    by_packet: HashMap<PacketId, MessageState>,
    by_event: HashMap<String, PacketId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, packet_id: PacketId) -> Option<&MessageState> {
        self.by_packet.get(&packet_id)
    }

    pub fn get_mut(&mut self, packet_id: PacketId) -> Option<&mut MessageState> {
        self.by_packet.get_mut(&packet_id)
    }

    pub fn get_by_event_id(&self, event_id: &str) -> Option<&MessageState> {
        self.by_event
            .get(event_id)
            .and_then(|packet_id| self.by_packet.get(packet_id))
    }

    pub fn contains(&self, packet_id: PacketId) -> bool {
        self.by_packet.contains_key(&packet_id)
    }

    /// Insert a freshly created state. At most one state per packet_id (§3
    /// invariant): a second insert for the same packet_id is a programming
    /// error, not a transient condition, so it's rejected rather than
    /// silently overwriting the existing state.
    pub fn insert(&mut self, state: MessageState) -> Result<(), BridgeError> {
        if self.by_packet.contains_key(&state.packet_id) {
            return Err(BridgeError::PacketAlreadyStored(state.packet_id));
        }
        self.by_packet.insert(state.packet_id, state);
        Ok(())
    }

    /// Record the Matrix event a packet was rendered to. May be called only
    /// once per packet (§3 invariant: assigned once, immutable thereafter).
    pub fn assign_event_id(
        &mut self,
        packet_id: PacketId,
        event_id: String,
    ) -> Result<(), BridgeError> {
        let state = self
            .by_packet
            .get_mut(&packet_id)
            .ok_or(BridgeError::UnknownPacket(packet_id))?;
        if state.matrix_event_id.is_some() {
            return Err(BridgeError::EventIdAlreadyAssigned(packet_id));
        }
        state.matrix_event_id = Some(event_id.clone());
        self.by_event.insert(event_id, packet_id);
        Ok(())
    }

    pub fn remove(&mut self, packet_id: PacketId) -> Option<MessageState> {
        let state = self.by_packet.remove(&packet_id)?;
        if let Some(event_id) = &state.matrix_event_id {
            self.by_event.remove(event_id);
        }
        Some(state)
    }

    pub fn len(&self) -> usize {
        self.by_packet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_packet.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &MessageState> {
        self.by_packet.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use time::macros::datetime;

    fn state(packet_id: u32) -> MessageState {
        MessageState::new(
            PacketId(packet_id),
            NodeId(1),
            0,
            "hello".to_string(),
            datetime!(2026-01-01 00:00:00 UTC),
        )
    }

    #[test]
    fn assigns_event_id_exactly_once() {
        let mut store = MessageStore::new();
        store.insert(state(1)).unwrap();
        store
            .assign_event_id(PacketId(1), "$evt1".to_string())
            .unwrap();
        let err = store
            .assign_event_id(PacketId(1), "$evt2".to_string())
            .unwrap_err();
        assert!(matches!(err, BridgeError::EventIdAlreadyAssigned(_)));
    }

    #[test]
    fn finds_state_by_event_id() {
        let mut store = MessageStore::new();
        store.insert(state(7)).unwrap();
        store
            .assign_event_id(PacketId(7), "$evt7".to_string())
            .unwrap();
        assert_eq!(
            store.get_by_event_id("$evt7").map(|s| s.packet_id),
            Some(PacketId(7))
        );
    }

    #[test]
    fn remove_clears_the_event_index_too() {
        let mut store = MessageStore::new();
        store.insert(state(3)).unwrap();
        store
            .assign_event_id(PacketId(3), "$evt3".to_string())
            .unwrap();
        store.remove(PacketId(3));
        assert!(store.get_by_event_id("$evt3").is_none());
        assert!(store.get(PacketId(3)).is_none());
    }
}
