//! Resolves the bridge's configuration from the environment (§6): name and
//! channel-index resolution, credential alternatives, and the fail-fast
//! validation that at least one mesh transport and exactly one Matrix
//! credential form are configured.
use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    matrix_homeserver: Option<String>,
    matrix_user: Option<String>,
    matrix_password: Option<String>,
    matrix_token: Option<String>,
    matrix_room: Option<String>,

    mqtt_broker: Option<String>,
    mqtt_port: Option<u16>,
    mqtt_user: Option<String>,
    mqtt_password: Option<String>,
    mqtt_topic: Option<String>,
    mqtt_psk: Option<String>,

    meshtastic_host: Option<String>,
    meshtastic_channel_idx: Option<u32>,
    meshtastic_channels: Option<String>,
    meshtastic_own_node: Option<String>,

    node_db_path: Option<String>,
    message_state_max_age_sec: Option<u64>,
    message_state_max_size: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration from the environment: {0}")]
    Figment(#[from] figment::Error),

    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("at least one of MQTT_BROKER or MESHTASTIC_HOST must be configured")]
    NoMeshTransport,

    #[error("exactly one of MATRIX_PASSWORD or MATRIX_TOKEN must be configured, got {0}")]
    AmbiguousMatrixCredentials(&'static str),

    #[error("{0} must be a valid hex-encoded node id: {1}")]
    InvalidNodeId(&'static str, String),

    #[error("MQTT_PSK must be valid hex: {0}")]
    InvalidPsk(String),
}

pub struct MatrixConfig {
    pub homeserver: String,
    pub credentials: matrix_ext::MatrixCredentials,
    pub room_id: String,
}

pub struct BridgeConfig {
    pub matrix: MatrixConfig,
    pub mqtt: Option<mesh_ext::MqttGatewayConfig>,
    pub lan: Option<mesh_ext::LanRadioConfig>,
    pub core: bridge_core_ext::CoreConfig,
    pub node_db_path: String,
}

fn parse_node_id(var: &'static str, raw: &str) -> Result<bridge_core_ext::NodeId, ConfigError> {
    let hex = raw.trim_start_matches('!');
    u32::from_str_radix(hex, 16)
        .map(bridge_core_ext::NodeId)
        .map_err(|_| ConfigError::InvalidNodeId(var, raw.to_string()))
}

fn parse_psk(raw: &str) -> Result<Vec<u8>, ConfigError> {
    (0..raw.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(raw.get(i..i + 2).unwrap_or_default(), 16)
                .map_err(|error| ConfigError::InvalidPsk(error.to_string()))
        })
        .collect()
}

/// Comma-separated `name:index` pairs or bare indices, e.g.
/// `"general:0,admin:1"` or `"0,1,2"`; names are accepted but only the
/// index is used downstream (§6's name-to-index resolution lives here,
/// one level up from the core, which only ever deals in numeric channel
/// indices).
fn parse_channel_set(raw: &str) -> HashSet<u32> {
    raw.split(',')
        .filter_map(|entry| {
            let index = entry.rsplit(':').next()?.trim();
            index.parse::<u32>().ok()
        })
        .collect()
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: RawConfig = Figment::new().merge(Env::raw()).extract()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let homeserver = raw.matrix_homeserver.ok_or(ConfigError::Missing("MATRIX_HOMESERVER"))?;
        let room_id = raw.matrix_room.ok_or(ConfigError::Missing("MATRIX_ROOM"))?;

        let credentials = match (raw.matrix_user, raw.matrix_password, raw.matrix_token) {
            (Some(user), Some(password), None) => matrix_ext::MatrixCredentials::Password { user, password },
            (None, None, Some(token)) => matrix_ext::MatrixCredentials::Token(token),
            (None, None, None) => return Err(ConfigError::Missing("MATRIX_PASSWORD or MATRIX_TOKEN")),
            _ => return Err(ConfigError::AmbiguousMatrixCredentials(
                "set either MATRIX_USER+MATRIX_PASSWORD or MATRIX_TOKEN, not both forms",
            )),
        };

        let own_node = raw
            .meshtastic_own_node
            .as_deref()
            .map(|raw| parse_node_id("MESHTASTIC_OWN_NODE", raw))
            .transpose()?
            .unwrap_or(bridge_core_ext::NodeId(0));

        let psk = raw.mqtt_psk.as_deref().map(parse_psk).transpose()?;

        let mqtt = match raw.mqtt_broker {
            Some(host) => Some(mesh_ext::MqttGatewayConfig {
                host,
                port: raw.mqtt_port.unwrap_or(1883),
                user: raw.mqtt_user,
                password: raw.mqtt_password,
                topic: raw.mqtt_topic.unwrap_or_else(|| "msh/#".to_string()),
                psk,
                own_node,
            }),
            None => None,
        };

        let lan = match raw.meshtastic_host {
            Some(host) => Some(mesh_ext::LanRadioConfig {
                host,
                default_channel: raw.meshtastic_channel_idx.unwrap_or(0),
                own_node,
            }),
            None => None,
        };

        if mqtt.is_none() && lan.is_none() {
            return Err(ConfigError::NoMeshTransport);
        }

        let allowed_channels = raw
            .meshtastic_channels
            .as_deref()
            .map(parse_channel_set)
            .unwrap_or_default();

        let core = bridge_core_ext::CoreConfig {
            allowed_channels,
            default_outbound_channel: raw.meshtastic_channel_idx.unwrap_or(0),
            own_node,
            eviction: bridge_core_ext::EvictionConfig {
                max_age: raw
                    .message_state_max_age_sec
                    .map(|secs| time::Duration::seconds(secs as i64))
                    .unwrap_or(bridge_core_ext::EvictionConfig::DEFAULT_MAX_AGE),
                max_size: raw
                    .message_state_max_size
                    .unwrap_or(bridge_core_ext::EvictionConfig::DEFAULT_MAX_SIZE),
            },
        };

        Ok(BridgeConfig {
            matrix: MatrixConfig {
                homeserver,
                credentials,
                room_id,
            },
            mqtt,
            lan,
            core,
            node_db_path: raw.node_db_path.unwrap_or_else(|| "bridge.sqlite".to_string()),
        })
    }
}

/// §4.6's lifecycle sweep runs on this schedule; not configurable, matching
/// the "nominally hourly" wording.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RawConfig {
        RawConfig {
            matrix_homeserver: Some("https://matrix.example.org".to_string()),
            matrix_room: Some("!room:example.org".to_string()),
            matrix_token: Some("token".to_string()),
            meshtastic_host: Some("192.168.1.50".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn requires_at_least_one_mesh_transport() {
        let mut raw = base_raw();
        raw.meshtastic_host = None;
        let error = BridgeConfig::from_raw(raw).unwrap_err();
        assert!(matches!(error, ConfigError::NoMeshTransport));
    }

    #[test]
    fn rejects_both_matrix_credential_forms() {
        let mut raw = base_raw();
        raw.matrix_user = Some("bridge".to_string());
        raw.matrix_password = Some("secret".to_string());
        let error = BridgeConfig::from_raw(raw).unwrap_err();
        assert!(matches!(error, ConfigError::AmbiguousMatrixCredentials(_)));
    }

    #[test]
    fn channel_set_accepts_names_and_bare_indices() {
        let set = parse_channel_set("general:0,admin:2,3");
        assert_eq!(set, HashSet::from([0, 2, 3]));
    }

    #[test]
    fn valid_config_resolves_both_transports_when_both_are_set() {
        let mut raw = base_raw();
        raw.mqtt_broker = Some("mqtt.example.org".to_string());
        let config = BridgeConfig::from_raw(raw).unwrap();
        assert!(config.mqtt.is_some());
        assert!(config.lan.is_some());
    }

    #[test]
    fn psk_parses_as_hex_bytes() {
        let bytes = parse_psk("AABBCC").unwrap();
        assert_eq!(bytes, vec![0xAA, 0xBB, 0xCC]);
    }
}
