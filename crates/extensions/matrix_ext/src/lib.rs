//! The Matrix side of the bridge: authenticates against a homeserver,
//! posts and edits events in the configured room, and forwards inbound
//! room activity to the [bridge_core_ext::BridgeActor] (§6 Matrix
//! collaborator contract).
mod client;
mod sync;

pub use client::MatrixCollaborator;
pub use client::MatrixCredentials;
pub use sync::MatrixSyncActor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixExtError {
    #[error("matrix login failed: {0}")]
    Login(String),
    #[error("matrix room {0} not found or not joined")]
    RoomNotFound(String),
    #[error("matrix request failed: {0}")]
    Request(#[from] matrix_sdk::Error),
}

impl From<MatrixExtError> for bridge_core_ext::BridgeError {
    fn from(error: MatrixExtError) -> Self {
        bridge_core_ext::BridgeError::Matrix(error.to_string())
    }
}
