//! Narrow interfaces onto the systems this crate deliberately does not
//! implement: the Matrix client, the mesh transports, the name directory,
//! and SQLite persistence (§6). `bridge_mapper` wires concrete
//! implementations from `matrix_ext`, `mesh_ext`, and `bridge_store`
//! behind these traits.
use crate::error::BridgeError;
use crate::ids::NodeId;
use crate::state::MessageState;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Sends mesh-bound traffic originating from the Matrix side (§6 mesh sink
/// contract).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MeshSink: Send + Sync {
    async fn send_text(
        &self,
        text: &str,
        channel: u32,
        reply_id: Option<u32>,
    ) -> Result<u32, BridgeError>;

    async fn send_tapback(
        &self,
        target_packet_id: u32,
        emoji: &str,
        channel: u32,
    ) -> Result<u32, BridgeError>;
}

/// Posts and edits events in the bridged Matrix room (§6 Matrix
/// collaborator contract).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatrixClient: Send + Sync {
    async fn post_message(
        &self,
        body_plain: &str,
        body_html: &str,
        in_reply_to_event_id: Option<&str>,
    ) -> Result<String, BridgeError>;

    async fn edit_message(
        &self,
        event_id: &str,
        body_plain: &str,
        body_html: &str,
    ) -> Result<(), BridgeError>;

    async fn display_name(&self, user_id: &str) -> Option<String>;
}

/// The NODEINFO-derived name directory: a simple key/value map from node
/// id to the display names used when rendering (§6, out of scope per §1).
#[cfg_attr(test, automock)]
pub trait NameDirectory: Send + Sync {
    fn node_display_name(&self, node: NodeId) -> Option<String>;
    fn record_node_info(&self, node: NodeId, short_name: &str, long_name: &str);
}

/// SQLite-backed persistence of [MessageState] and node names (§6
/// persistence contract).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn save_message_state(&self, state: &MessageState) -> Result<(), BridgeError>;
    async fn load_all_message_states(&self) -> Result<Vec<MessageState>, BridgeError>;
    async fn delete_message_state(&self, packet_id: crate::ids::PacketId) -> Result<(), BridgeError>;
}
