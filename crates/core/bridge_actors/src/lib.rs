//! A small actor runtime used to compose the bridge's concurrent parts.
//!
//! The bridge coordinator, the Matrix collaborator and the mesh
//! collaborators are each [Actor]s: they own their state, exchange
//! messages over typed channels, and are supervised by a [Runtime] that
//! can request a cooperative shutdown.
//!
//! This is deliberately a small subset of a general actor framework: just
//! enough to express the concurrency model of §5 (an event loop per
//! actor, off-loop worker roles for persistence, cooperative
//! cancellation) without the generality a multi-cloud mapper framework
//! needs.

mod actor;
mod channels;
mod errors;
mod macros;
mod message_box;
mod messages;
mod runtime;
pub mod test_helpers;

pub use actor::*;
pub use channels::*;
pub use errors::*;
pub use message_box::*;
pub use messages::*;
pub use runtime::*;
