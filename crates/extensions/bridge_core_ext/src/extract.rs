use crate::packet::MeshPacket;

/// Derive the payload text in priority order: decoded text field → decoded
/// emoji field → raw payload bytes interpreted as UTF-8 (§4.1-c). Returns
/// an empty string when none of the three sources yields text; callers
/// decide whether an empty result should be dropped.
pub fn extract_text(packet: &MeshPacket) -> String {
    if let Some(text) = packet.text.as_deref().filter(|t| !t.is_empty()) {
        return text.to_string();
    }
    if let Some(emoji) = packet
        .decoded
        .get("emoji")
        .and_then(|v| v.as_str())
        .filter(|e| !e.is_empty())
    {
        return emoji.to_string();
    }
    if let Some(payload) = &packet.payload {
        if let Ok(text) = std::str::from_utf8(payload) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    String::new()
}
