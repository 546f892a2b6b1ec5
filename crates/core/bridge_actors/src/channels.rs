//! Sending and receiving messages between actors.
use crate::ChannelError;
use crate::Message;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A sender of messages of type `M`, type-erased so actors don't need to
/// know the concrete channel implementation used by their peers.
pub type DynSender<M> = Box<dyn CloneSender<M>>;

#[async_trait]
pub trait Sender<M>: 'static + Send + Sync {
    async fn send(&mut self, message: M) -> Result<(), ChannelError>;
}

pub trait CloneSender<M>: Sender<M> {
    fn sender_clone(&self) -> DynSender<M>;
}

impl<M, S: Clone + Sender<M>> CloneSender<M> for S {
    fn sender_clone(&self) -> DynSender<M> {
        Box::new(self.clone())
    }
}

impl<M, S: Clone + Sender<M>> From<S> for DynSender<M> {
    fn from(sender: S) -> Self {
        Box::new(sender)
    }
}

#[async_trait]
impl<M: Message> Sender<M> for mpsc::Sender<M> {
    async fn send(&mut self, message: M) -> Result<(), ChannelError> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| ChannelError::SendError)
    }
}

/// A sender that discards every message sent to it. Used for collaborators
/// an actor doesn't (yet) need to connect, akin to `/dev/null`.
#[derive(Clone)]
pub struct NullSender;

#[async_trait]
impl<M: Message> Sender<M> for NullSender {
    async fn send(&mut self, _message: M) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// A sender wrapper that traces every message at `trace!` before
/// forwarding it, named after the peer it sends to.
pub struct LoggingSender<M> {
    name: String,
    inner: DynSender<M>,
}

impl<M> LoggingSender<M> {
    pub fn new(name: String, inner: DynSender<M>) -> Self {
        LoggingSender { name, inner }
    }
}

impl<M: 'static> Clone for LoggingSender<M> {
    fn clone(&self) -> Self {
        LoggingSender {
            name: self.name.clone(),
            inner: self.inner.sender_clone(),
        }
    }
}

#[async_trait]
impl<M: Message> Sender<M> for LoggingSender<M> {
    async fn send(&mut self, message: M) -> Result<(), ChannelError> {
        tracing::debug!(target: "bridge", actor = %self.name, "send {:?}", message);
        self.inner.send(message).await
    }
}
