//! Liveness heartbeat, grounded on `tedge_api::health`'s up/down status
//! messages: published retained so anything watching the broker can tell
//! the bridge is alive without polling it directly.
use clock::Clock;
use rumqttc::AsyncClient;
use rumqttc::QoS;
use serde_json::json;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const HEALTH_TOPIC: &str = "bridge/health";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

fn health_status_up(clock: &dyn Clock) -> String {
    let timestamp = clock
        .now()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    json!({
        "status": "up",
        "pid": process::id(),
        "time": timestamp,
    })
    .to_string()
}

/// Spawns a background task publishing a retained heartbeat to
/// [HEALTH_TOPIC] every [HEARTBEAT_INTERVAL], reusing the mesh MQTT
/// gateway's client handle rather than opening a second connection.
pub fn spawn_heartbeat(client: AsyncClient, clock: Arc<dyn Clock>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            let payload = health_status_up(clock.as_ref());
            if let Err(error) = client
                .publish(HEALTH_TOPIC, QoS::AtLeastOnce, true, payload)
                .await
            {
                warn!(target: "bridge_mapper", %error, "failed to publish health heartbeat");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock::MockClock;
    use time::macros::datetime;

    #[test]
    fn status_message_is_rfc3339_and_up() {
        let mut clock = MockClock::new();
        clock.expect_now().returning(|| datetime!(2026-07-27 12:00:00 UTC));
        let payload = health_status_up(&clock);
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["status"], "up");
        assert_eq!(value["time"], "2026-07-27T12:00:00Z");
    }
}
