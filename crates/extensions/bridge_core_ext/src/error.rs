use crate::ids::PacketId;

/// Failures raised while correlating or rendering bridge state.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no message state found for packet {0}")]
    UnknownPacket(PacketId),

    #[error("matrix_event_id already assigned for packet {0}, cannot reassign")]
    EventIdAlreadyAssigned(PacketId),

    #[error("message state already stored for packet {0}, cannot insert again")]
    PacketAlreadyStored(PacketId),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("matrix client failure: {0}")]
    Matrix(String),

    #[error("mesh transport failure: {0}")]
    Mesh(String),
}
