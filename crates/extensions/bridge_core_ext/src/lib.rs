//! The bridge state manager (§1-§4): correlates mesh packets observed
//! from multiple gateways, aggregates their reception stats into a
//! single evolving Matrix event, threads replies, and mirrors reactions
//! in both directions. Everything this crate does not implement itself —
//! the Matrix client, the mesh transports, persistence, the name
//! directory — is a narrow trait in [collaborators].

mod actor;
mod collaborators;
mod config;
mod error;
mod extract;
mod ids;
mod lifecycle;
mod packet;
mod render;
mod resolver;
mod state;
mod store;

pub use actor::BridgeActor;
pub use actor::BridgeInput;
pub use actor::MatrixInboundEvent;
pub use actor::MeshObservation;
pub use actor::Tick;
pub use collaborators::MatrixClient;
pub use collaborators::MeshSink;
pub use collaborators::NameDirectory;
pub use collaborators::PersistenceStore;
pub use config::CoreConfig;
pub use error::BridgeError;
pub use ids::GatewayId;
pub use ids::NodeId;
pub use ids::PacketId;
pub use lifecycle::EvictionConfig;
pub use packet::MeshPacket;
pub use packet::Port;
pub use render::render;
pub use render::RenderedBody;
pub use resolver::Role;
pub use state::MessageState;
pub use state::Reaction;
pub use state::ReceptionList;
pub use state::ReceptionStats;
pub use state::SourceTag;
pub use store::MessageStore;
