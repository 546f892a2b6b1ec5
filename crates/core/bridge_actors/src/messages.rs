use std::fmt::Debug;

/// A message exchanged between two actors.
pub trait Message: Debug + Send + 'static {}

/// There is no need to tag messages as such.
impl<T: Debug + Send + 'static> Message for T {}

/// A message type with no inhabitants, used where an actor produces or
/// consumes nothing of a given direction.
#[derive(Debug)]
pub enum NoMessage {}
