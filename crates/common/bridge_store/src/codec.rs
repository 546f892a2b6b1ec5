//! Hand-rolled JSON encoding for the [MessageState] fields that don't carry
//! `serde` derives upstream — `bridge_core_ext` keeps its domain types free
//! of persistence concerns, so the mapping lives here instead.
use crate::error::StoreError;
use bridge_core_ext::GatewayId;
use bridge_core_ext::NodeId;
use bridge_core_ext::PacketId;
use bridge_core_ext::Reaction;
use bridge_core_ext::ReceptionList;
use bridge_core_ext::ReceptionStats;
use clock::Timestamp;
use time::format_description::well_known::Rfc3339;

pub fn encode_timestamp(ts: Timestamp) -> String {
    ts.format(&Rfc3339).expect("Rfc3339 formatting never fails for a valid OffsetDateTime")
}

pub fn decode_timestamp(raw: &str) -> Result<Timestamp, StoreError> {
    Ok(Timestamp::parse(raw, &Rfc3339)?)
}

fn encode_gateway_id(gateway: GatewayId) -> serde_json::Value {
    match gateway {
        GatewayId::Node(node) => serde_json::json!({"node": node.0}),
        GatewayId::Lan => serde_json::json!("lan"),
    }
}

fn decode_gateway_id(value: &serde_json::Value) -> Option<GatewayId> {
    if value.as_str() == Some("lan") {
        return Some(GatewayId::Lan);
    }
    value
        .get("node")
        .and_then(|v| v.as_u64())
        .map(|id| GatewayId::Node(NodeId(id as u32)))
}

pub fn encode_reception_list(list: &ReceptionList) -> Result<String, StoreError> {
    let entries: Vec<serde_json::Value> = list
        .iter()
        .map(|stats| {
            serde_json::json!({
                "gateway_id": encode_gateway_id(stats.gateway_id),
                "rssi": stats.rssi,
                "snr": stats.snr,
                "hop_count": stats.hop_count,
                "timestamp": encode_timestamp(stats.timestamp),
            })
        })
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

pub fn decode_reception_list(raw: &str) -> Result<ReceptionList, StoreError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    let mut list = ReceptionList::new();
    for entry in entries {
        let gateway_id = match entry.get("gateway_id").and_then(decode_gateway_id) {
            Some(gateway_id) => gateway_id,
            None => continue,
        };
        let timestamp = match entry.get("timestamp").and_then(|v| v.as_str()) {
            Some(raw) => decode_timestamp(raw)?,
            None => continue,
        };
        list.insert(ReceptionStats {
            gateway_id,
            rssi: entry.get("rssi").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
            snr: entry.get("snr").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
            hop_count: entry.get("hop_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            timestamp,
        });
    }
    Ok(list)
}

pub fn encode_reactions(reactions: &[Reaction]) -> Result<String, StoreError> {
    let entries: Vec<serde_json::Value> = reactions
        .iter()
        .map(|reaction| serde_json::json!({"emoji": reaction.emoji, "reactor": reaction.reactor}))
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

pub fn decode_reactions(raw: &str) -> Result<Vec<Reaction>, StoreError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let emoji = entry.get("emoji")?.as_str()?.to_string();
            let reactor = entry.get("reactor")?.as_str()?.to_string();
            Some(Reaction { emoji, reactor })
        })
        .collect())
}

pub fn encode_replies(replies: &[PacketId]) -> String {
    let ids: Vec<u32> = replies.iter().map(|id| id.0).collect();
    serde_json::to_string(&ids).expect("Vec<u32> serialization never fails")
}

pub fn decode_replies(raw: &str) -> Result<Vec<PacketId>, StoreError> {
    let ids: Vec<u32> = serde_json::from_str(raw)?;
    Ok(ids.into_iter().map(PacketId).collect())
}
