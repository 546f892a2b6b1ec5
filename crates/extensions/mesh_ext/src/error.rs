#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("mqtt client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("malformed mesh envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("channel PSK decryption failed: {0}")]
    Decrypt(String),

    #[error("radio tcp interface error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no mesh sink is configured")]
    NoSink,
}

impl From<MeshError> for bridge_core_ext::BridgeError {
    fn from(error: MeshError) -> Self {
        bridge_core_ext::BridgeError::Mesh(error.to_string())
    }
}
