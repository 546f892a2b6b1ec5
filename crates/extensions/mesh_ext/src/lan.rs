//! The locally attached radio's TCP interface: a persistent connection to
//! a Meshtastic device's network API, framed with the device's `0x94 0xC3`
//! magic bytes followed by a big-endian length prefix (the framing real
//! Meshtastic firmware uses for its protobuf stream; this collaborator
//! carries a JSON-encoded [RawEnvelope] in the frame body instead, for the
//! same reason `mqtt.rs` does — see its module doc).
use crate::envelope::tapback_envelope;
use crate::envelope::text_envelope;
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
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;

const MAGIC: [u8; 2] = [0x94, 0xC3];

async fn write_frame(writer: &mut OwnedWriteHalf, payload: &[u8]) -> Result<(), MeshError> {
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    Ok(())
}

/// Reconnects to the radio after the connection drops, swapping the new
/// write half into the shared handle so outstanding [LanRadio] clones keep
/// working. Retries forever; reconnection is the collaborator's
/// responsibility (mirrors `mqtt.rs`'s poll-and-retry loop).
async fn reconnect(host: &str, writer: &Arc<Mutex<OwnedWriteHalf>>) -> BufReader<tokio::net::tcp::OwnedReadHalf> {
    loop {
        match TcpStream::connect((host, 4403)).await {
            Ok(stream) => {
                let (read_half, write_half) = stream.into_split();
                *writer.lock().await = write_half;
                info!(target: "mesh_ext", %host, "reconnected to local radio");
                return BufReader::new(read_half);
            }
            Err(error) => {
                warn!(target: "mesh_ext", %error, %host, "radio reconnect failed, retrying");
                sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

/// Scans byte-by-byte for the magic sequence rather than reading fixed
/// 2-byte chunks, so a misaligned or odd number of junk bytes ahead of a
/// frame doesn't hide it from detection.
async fn read_frame<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut window = [0u8; 2];
    reader.read_exact(&mut window).await?;
    while window != MAGIC {
        window[0] = window[1];
        reader.read_exact(&mut window[1..]).await?;
    }
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes).await?;
    let len = u16::from_be_bytes(len_bytes) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

#[derive(Debug, Clone)]
pub struct LanRadioConfig {
    pub host: String,
    pub default_channel: u32,
    pub own_node: NodeId,
}

/// A persistent connection to the locally attached radio. The write half
/// is shared so [MeshSink] sends and the receive loop can run
/// concurrently.
pub struct LanRadio {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    config: LanRadioConfig,
}

impl LanRadio {
    pub async fn connect(
        config: LanRadioConfig,
        clock: Arc<dyn Clock>,
        forward: UnboundedSender<MeshObservation>,
    ) -> Result<(Self, impl std::future::Future<Output = Result<(), MeshError>>), MeshError> {
        let stream = TcpStream::connect((config.host.as_str(), 4403)).await?;
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(write_half));

        let receive_loop = {
            let writer = writer.clone();
            let host = config.host.clone();
            async move {
                let mut reader = BufReader::new(read_half);
                loop {
                    match read_frame(&mut reader).await {
                        Ok(payload) => match serde_json::from_slice::<RawEnvelope>(&payload) {
                            Ok(envelope) => {
                                let rssi = envelope.rssi;
                                let snr = envelope.snr;
                                match envelope.into_mesh_packet(None) {
                                    Ok(packet) => {
                                        let stats = ReceptionStats {
                                            gateway_id: GatewayId::Lan,
                                            rssi,
                                            snr,
                                            hop_count: packet.hop_count(),
                                            timestamp: clock.now(),
                                        };
                                        let _ = forward.send(MeshObservation {
                                            packet,
                                            source: SourceTag::Lan,
                                            stats,
                                        });
                                    }
                                    Err(error) => {
                                        debug!(target: "mesh_ext", %error, "dropping undecodable radio frame");
                                    }
                                }
                            }
                            Err(error) => {
                                debug!(target: "mesh_ext", %error, "dropping non-json radio frame");
                            }
                        },
                        Err(error) => {
                            warn!(target: "mesh_ext", %error, "radio tcp connection lost, reconnecting");
                            reader = reconnect(&host, &writer).await;
                        }
                    }
                }
            }
        };

        info!(target: "mesh_ext", host = %config.host, "connected to local radio");
        Ok((LanRadio { writer, config }, receive_loop))
    }
}

#[async_trait]
impl MeshSink for LanRadio {
    async fn send_text(&self, text: &str, channel: u32, reply_id: Option<u32>) -> Result<u32, BridgeError> {
        let packet_id: u32 = rand::random();
        let envelope = text_envelope(packet_id, self.config.own_node.0, channel, text, reply_id);
        let payload = serde_json::to_vec(&envelope).map_err(MeshError::from)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, &payload).await?;
        Ok(packet_id)
    }

    async fn send_tapback(&self, target_packet_id: u32, emoji: &str, channel: u32) -> Result<u32, BridgeError> {
        let packet_id: u32 = rand::random();
        let envelope = tapback_envelope(
            packet_id,
            self.config.own_node.0,
            channel,
            target_packet_id,
            emoji,
        );
        let payload = serde_json::to_vec(&envelope).map_err(MeshError::from)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, &payload).await?;
        Ok(packet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trips_through_magic_and_length_prefix() {
        let (client, server) = tokio::io::duplex(256);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, _server_write) = tokio::io::split(server);

        let payload = br#"{"portnum":"TEXT_MESSAGE_APP"}"#;
        let mut frame = Vec::new();
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(payload);
        client_write.write_all(&frame).await.unwrap();
        drop(client_write);

        let received = read_frame(&mut server_read).await.unwrap();
        assert_eq!(received, payload);
        let _ = client_read;
    }

    #[tokio::test]
    async fn junk_bytes_before_magic_are_skipped() {
        let (client, server) = tokio::io::duplex(256);
        let (_client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, _server_write) = tokio::io::split(server);

        let payload = b"hi";
        let mut frame = vec![0xff, 0x00, 0x94];
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(payload);
        client_write.write_all(&frame).await.unwrap();
        drop(client_write);

        let received = read_frame(&mut server_read).await.unwrap();
        assert_eq!(received, payload);
    }
}
