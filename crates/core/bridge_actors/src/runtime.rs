//! Supervise the actors of the bridge.
use crate::Actor;
use crate::DynSender;
use crate::RuntimeError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

/// Requests sent by the runtime to a running actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeRequest {
    Shutdown,
}

/// The bridge actor runtime: spawns actors as tasks, tracks them, and can
/// drain them with a bounded shutdown grace period (§5 cancellation).
pub struct Runtime {
    running: HashMap<String, (JoinHandle<Result<(), RuntimeError>>, DynSender<RuntimeRequest>)>,
    next_id: usize,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            running: HashMap::new(),
            next_id: 0,
        }
    }

    /// Spawn an actor as a background task, giving it a unique name derived
    /// from [Actor::name].
    pub fn spawn<A>(&mut self, mut actor: A, signal_sender: DynSender<RuntimeRequest>)
    where
        A: Actor,
    {
        let running_name = format!("{}-{}", actor.name(), self.next_id);
        self.next_id += 1;
        info!(target: "Runtime", "spawning {running_name}");
        let task = tokio::spawn(async move { actor.run().await });
        self.running.insert(running_name, (task, signal_sender));
    }

    /// Request every running actor to shut down, then wait up to
    /// `grace_period` for them to finish before giving up.
    pub async fn shutdown(self, grace_period: Duration) {
        let mut handles = Vec::new();
        for (name, (task, mut signal)) in self.running {
            if let Err(error) = signal.send(RuntimeRequest::Shutdown).await {
                error!(target: "Runtime", %name, ?error, "failed to deliver shutdown request");
            }
            handles.push((name, task));
        }

        let drain = async {
            for (name, task) in handles {
                match task.await {
                    Ok(Ok(())) => info!(target: "Runtime", %name, "stopped"),
                    Ok(Err(error)) => error!(target: "Runtime", %name, ?error, "actor failed"),
                    Err(error) => error!(target: "Runtime", %name, ?error, "actor panicked"),
                }
            }
        };

        if tokio::time::timeout(grace_period, drain).await.is_err() {
            error!(target: "Runtime", "timed out waiting for actors to shut down");
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a channel pair for [RuntimeRequest] signals, sized at 1: a single
/// pending shutdown request is all an actor ever needs to observe.
pub fn signal_channel() -> (mpsc::Sender<RuntimeRequest>, mpsc::Receiver<RuntimeRequest>) {
    mpsc::channel(1)
}
