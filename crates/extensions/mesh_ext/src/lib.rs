//! The mesh side of the bridge: MQTT gateway ingestion and the local
//! radio's TCP interface, each usable as a [bridge_core_ext::MeshSink] for
//! outbound sends and as a source feeding [MeshIngestActor]'s forwarding
//! loop (§6 mesh source contract).
mod actor;
mod envelope;
mod error;
mod lan;
mod mqtt;
mod psk;

pub use actor::MeshIngestActor;
pub use error::MeshError;
pub use lan::LanRadio;
pub use lan::LanRadioConfig;
pub use mqtt::MqttGateway;
pub use mqtt::MqttGatewayConfig;
