use crate::RuntimeError;
use async_trait::async_trait;

/// An actor processes messages from its message box in turn, updating
/// whatever state it owns and sending output messages to its peers.
///
/// There are no constraints beyond this: an actor is free to run a simple
/// `while let Some(input) = self.messages.recv().await` loop, or to
/// interleave several input sources with `tokio::select!`.
#[async_trait]
pub trait Actor: 'static + Send + Sync {
    /// Used only for logging and for the name the runtime assigns the
    /// spawned task.
    fn name(&self) -> &str;

    /// Run the actor to completion: either the message box is closed, or
    /// a [crate::RuntimeRequest::Shutdown] is observed.
    async fn run(&mut self) -> Result<(), RuntimeError>;
}
