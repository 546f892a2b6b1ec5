//! Drives whichever mesh sources are configured (MQTT, the local radio, or
//! both) and forwards their observations into the bridge's inbox, mirroring
//! how [matrix_ext](../../matrix_ext)'s `MatrixSyncActor` races its own I/O
//! loop against a shutdown signal.
use crate::error::MeshError;
use bridge_actors::Actor;
use bridge_actors::CombinedReceiver;
use bridge_actors::DynSender;
use bridge_actors::NoMessage;
use bridge_actors::RuntimeError;
use bridge_actors::SimpleMessageBox;
use bridge_core_ext::BridgeInput;
use bridge_core_ext::MeshObservation;
use futures::future::BoxFuture;
use std::pin::Pin;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

pub struct MeshIngestActor {
    name: String,
    messages: SimpleMessageBox<NoMessage, NoMessage>,
    observations: UnboundedReceiver<MeshObservation>,
    bridge_output: DynSender<BridgeInput>,
    receive_loops: Vec<BoxFuture<'static, Result<(), MeshError>>>,
}

impl MeshIngestActor {
    pub fn new(
        name: impl Into<String>,
        input: CombinedReceiver<NoMessage>,
        output: DynSender<NoMessage>,
        observations: UnboundedReceiver<MeshObservation>,
        bridge_output: DynSender<BridgeInput>,
        receive_loops: Vec<Pin<Box<dyn std::future::Future<Output = Result<(), MeshError>> + Send>>>,
    ) -> Self {
        let name = name.into();
        MeshIngestActor {
            messages: SimpleMessageBox::new(name.clone(), input, output),
            name,
            observations,
            bridge_output,
            receive_loops,
        }
    }
}

#[async_trait::async_trait]
impl Actor for MeshIngestActor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> Result<(), RuntimeError> {
        let receive_loops = std::mem::take(&mut self.receive_loops);
        let io = async {
            if receive_loops.is_empty() {
                std::future::pending::<()>().await;
                Ok(())
            } else {
                let (result, _, _) = futures::future::select_all(receive_loops).await;
                result
            }
        };
        tokio::pin!(io);

        loop {
            tokio::select! {
                _ = self.messages.recv() => return Ok(()),
                result = &mut io => {
                    return result.map_err(|error| RuntimeError::ActorError(error.to_string()));
                }
                maybe_observation = self.observations.recv() => {
                    match maybe_observation {
                        Some(observation) => {
                            if let Err(error) = self.bridge_output.send(observation.into()).await {
                                warn!(target: "mesh_ext", %error, "bridge inbox closed, dropping mesh observation");
                            }
                        }
                        None => {
                            // All sources dropped their sender; nothing left to forward.
                        }
                    }
                }
            }
        }
    }
}
