//! Building blocks for driving an actor under test without a [crate::Runtime].
use crate::runtime::signal_channel;
use crate::CombinedReceiver;
use crate::DynSender;
use crate::Message;
use crate::NoMessage;
use crate::NullSender;
use crate::RuntimeRequest;
use crate::SimpleMessageBox;
use tokio::sync::mpsc;

/// A [SimpleMessageBox] plus the handles a test needs to drive it: the
/// sender side of its input channel and the signal sender a test can use
/// to request shutdown the same way a [crate::Runtime] would.
pub struct ClientBox<Input, Output> {
    pub input: mpsc::Sender<Input>,
    pub signal: mpsc::Sender<RuntimeRequest>,
    pub messages: SimpleMessageBox<Input, Output>,
}

/// Builds a message box an actor under test can own, wired to an output
/// sender supplied by the caller (a channel sender for assertions, or
/// [NullSender] when only the input side matters).
pub fn new_client_box<Input: Message, Output: Message>(
    name: &str,
    capacity: usize,
    output: DynSender<Output>,
) -> ClientBox<Input, Output> {
    let (input_tx, input_rx) = mpsc::channel(capacity);
    let (signal_tx, signal_rx) = signal_channel();
    let messages = SimpleMessageBox::new(name, CombinedReceiver::new(input_rx, signal_rx), output);
    ClientBox {
        input: input_tx,
        signal: signal_tx,
        messages,
    }
}

/// Shorthand for an actor that produces nothing, discarding its output.
pub fn new_silent_client_box<Input: Message>(name: &str, capacity: usize) -> ClientBox<Input, NoMessage> {
    new_client_box(name, capacity, Box::new(NullSender))
}
