//! Message boxes: an actor's only way to interact with its peers.
use crate::ChannelError;
use crate::DynSender;
use crate::Message;
use crate::RuntimeRequest;
use tokio::sync::mpsc;

/// Either a regular message or a runtime request, returned by
/// [CombinedReceiver::recv_message] so callers can give the latter
/// priority.
pub enum WrappedInput<Input> {
    Message(Input),
    RuntimeRequest(RuntimeRequest),
}

/// A receiver that multiplexes an actor's regular input channel with its
/// (higher priority) runtime-signal channel, mirroring the teacher's
/// `biased select!` so a pending shutdown is never starved by a busy
/// input queue.
pub struct CombinedReceiver<Input> {
    input_receiver: mpsc::Receiver<Input>,
    signal_receiver: mpsc::Receiver<RuntimeRequest>,
}

impl<Input> CombinedReceiver<Input> {
    pub fn new(
        input_receiver: mpsc::Receiver<Input>,
        signal_receiver: mpsc::Receiver<RuntimeRequest>,
    ) -> Self {
        CombinedReceiver {
            input_receiver,
            signal_receiver,
        }
    }

    pub async fn recv_message(&mut self) -> Option<WrappedInput<Input>> {
        tokio::select! {
            biased;

            Some(request) = self.signal_receiver.recv() => {
                Some(WrappedInput::RuntimeRequest(request))
            }
            Some(message) = self.input_receiver.recv() => {
                Some(WrappedInput::Message(message))
            }
            else => None,
        }
    }

    /// Receive the next regular message, returning `None` both on channel
    /// closure and on a runtime shutdown request (the caller's `run` loop
    /// is expected to stop either way).
    pub async fn recv(&mut self) -> Option<Input> {
        match self.recv_message().await {
            Some(WrappedInput::Message(message)) => Some(message),
            _ => None,
        }
    }
}

/// The basic message box: a combined input receiver plus a single output
/// sender. Most bridge actors need nothing more sophisticated than this.
pub struct SimpleMessageBox<Input, Output> {
    name: String,
    input: CombinedReceiver<Input>,
    output: DynSender<Output>,
}

impl<Input: Message, Output: Message> SimpleMessageBox<Input, Output> {
    pub fn new(name: impl Into<String>, input: CombinedReceiver<Input>, output: DynSender<Output>) -> Self {
        SimpleMessageBox {
            name: name.into(),
            input,
            output,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn recv(&mut self) -> Option<Input> {
        self.input.recv().await
    }

    pub async fn send(&mut self, message: Output) -> Result<(), ChannelError> {
        self.output.send(message).await
    }
}
