#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("malformed stored json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed stored timestamp: {0}")]
    Timestamp(#[from] time::error::Parse),
}

impl From<StoreError> for bridge_core_ext::BridgeError {
    fn from(error: StoreError) -> Self {
        bridge_core_ext::BridgeError::Persistence(error.to_string())
    }
}
