//! MQTT gateway collaborator: many independent Meshtastic gateways publish
//! the packets they overhear to a shared broker topic; this module
//! subscribes to that topic and is also usable as the outbound
//! [MeshSink] when no local radio is configured (§6 "at least one of
//! MQTT or MESHTASTIC_HOST").
use crate::envelope::text_envelope;
use crate::envelope::tapback_envelope;
use crate::envelope::RawEnvelope;
use crate::error::MeshError;
use async_trait::async_trait;
use bridge_core_ext::BridgeError;
use bridge_core_ext::GatewayId;
use bridge_core_ext::MeshObservation;
use bridge_core_ext::MeshSink;
use bridge_core_ext::NodeId;
use bridge_core_ext::ReceptionStats;
use bridge_core_ext::SourceTag;
use clock::Clock;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct MqttGatewayConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    pub psk: Option<Vec<u8>>,
    pub own_node: NodeId,
}

impl MqttGatewayConfig {
    fn mqtt_options(&self) -> MqttOptions {
        let client_id: String = std::iter::repeat_with(fastrand_lowercase)
            .take(10)
            .collect();
        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_clean_session(true);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            options.set_credentials(user.clone(), password.clone());
        }
        options
    }
}

fn fastrand_lowercase() -> char {
    let letters = b"abcdefghijklmnopqrstuvwxyz";
    letters[rand::random::<usize>() % letters.len()] as char
}

/// Publishes to and reads from the configured MQTT broker. Cloning shares
/// the underlying `rumqttc` client handle, so this can double as a
/// [MeshSink] while a background task drains the event loop.
pub struct MqttGateway {
    client: AsyncClient,
    config: MqttGatewayConfig,
}

impl MqttGateway {
    /// Connects and returns the gateway plus the background receive loop.
    /// The caller is expected to `tokio::spawn` (or `tokio::select!` on)
    /// the returned future alongside its own shutdown signal.
    pub fn connect(
        config: MqttGatewayConfig,
        clock: Arc<dyn Clock>,
        forward: UnboundedSender<MeshObservation>,
    ) -> (Self, impl std::future::Future<Output = Result<(), MeshError>>) {
        let (client, mut event_loop) = AsyncClient::new(config.mqtt_options(), 64);
        let topic = config.topic.clone();
        let psk = config.psk.clone();
        let subscribe_client = client.clone();

        let receive_loop = async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(target: "mesh_ext", %topic, "mqtt connected, subscribing");
                        if let Err(error) = subscribe_client.subscribe(&topic, QoS::AtMostOnce).await {
                            warn!(target: "mesh_ext", %error, "mqtt subscribe failed");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match serde_json::from_slice::<RawEnvelope>(&publish.payload) {
                            Ok(envelope) => {
                                let rssi = envelope.rssi;
                                let snr = envelope.snr;
                                match envelope.into_mesh_packet(psk.as_deref()) {
                                    Ok(packet) => {
                                        let stats = ReceptionStats {
                                            gateway_id: GatewayId::Node(packet.from),
                                            rssi,
                                            snr,
                                            hop_count: packet.hop_count(),
                                            timestamp: clock.now(),
                                        };
                                        let _ = forward.send(MeshObservation {
                                            packet,
                                            source: SourceTag::Mqtt,
                                            stats,
                                        });
                                    }
                                    Err(error) => {
                                        debug!(target: "mesh_ext", %error, "dropping undecodable mqtt envelope");
                                    }
                                }
                            }
                            Err(error) => {
                                debug!(target: "mesh_ext", %error, "dropping non-json mqtt publish");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(error) => {
                        error!(target: "mesh_ext", %error, "mqtt connection error, retrying");
                        sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        };

        (MqttGateway { client, config }, receive_loop)
    }

    /// A cloned handle to the underlying client, for collaborators (the
    /// health heartbeat) that need to publish outside the [MeshSink]
    /// contract.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

#[async_trait]
impl MeshSink for MqttGateway {
    async fn send_text(&self, text: &str, channel: u32, reply_id: Option<u32>) -> Result<u32, BridgeError> {
        let packet_id: u32 = rand::random();
        let envelope = text_envelope(packet_id, self.config.own_node.0, channel, text, reply_id);
        let payload = serde_json::to_vec(&envelope).map_err(MeshError::from)?;
        self.client
            .publish(&self.config.topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(MeshError::from)?;
        Ok(packet_id)
    }

    async fn send_tapback(&self, target_packet_id: u32, emoji: &str, channel: u32) -> Result<u32, BridgeError> {
        let packet_id: u32 = rand::random();
        let envelope = tapback_envelope(packet_id, self.config.own_node.0, channel, target_packet_id, emoji);
        let payload = serde_json::to_vec(&envelope).map_err(MeshError::from)?;
        self.client
            .publish(&self.config.topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(MeshError::from)?;
        Ok(packet_id)
    }
}
