use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("Fail to send a message: the peer has been dropped")]
    SendError,

    #[error("Fail to receive a message: the peer has been dropped")]
    ReceiveError,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ChannelError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ChannelError::SendError
    }
}

#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error(transparent)]
    ChannelError(#[from] ChannelError),

    #[error("The runtime has been cancelled")]
    RuntimeCancellation,

    #[error("The runtime panicked")]
    RuntimePanic,

    #[error("Actor failed: {0}")]
    ActorError(String),
}
