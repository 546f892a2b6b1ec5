//! Classifies an inbound mesh packet as new, a reply, or a reaction, and
//! locates the packet it targets when it is one of the latter two (§4.3).
use crate::ids::PacketId;
use crate::packet::MeshPacket;
use crate::packet::Port;
use clock::Timestamp;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use time::Duration;
use unicode_segmentation::UnicodeSegmentation;

/// How long an emoji-only packet can be correlated to the channel's last
/// seen packet before it's treated as unrelated (§9 open question).
pub const CORRELATION_WINDOW: Duration = Duration::minutes(10);

/// Deep linkage scans never recurse past this depth (§9).
const MAX_SCAN_DEPTH: u32 = 4;

static LEGACY_REACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[Reaction to !([0-9a-fA-F]{8})\]: (.+)$").unwrap());

static LINKAGE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)reply.?id|reference.?id").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    New,
    Reply,
    Reaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub role: Role,
    pub parent_packet_id: Option<PacketId>,
}

impl Resolution {
    fn new_message() -> Self {
        Resolution {
            role: Role::New,
            parent_packet_id: None,
        }
    }
}

/// Tracks, per channel, the most recently classified non-reaction packet —
/// the `last_seen_packet_id` the emoji-only heuristic and reply resolution
/// fall back to (§4.3, §4.4).
#[derive(Debug, Default)]
pub struct ChannelTracker {
    last_seen: HashMap<u32, (PacketId, Timestamp)>,
}

impl ChannelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, channel: u32, packet_id: PacketId, at: Timestamp) {
        self.last_seen.insert(channel, (packet_id, at));
    }

    pub fn last_seen(&self, channel: u32) -> Option<(PacketId, Timestamp)> {
        self.last_seen.get(&channel).copied()
    }
}

/// Classify `packet` given its already-extracted `text`, the channel
/// tracker, the current time, and a predicate telling whether a given
/// packet_id is a Matrix-originated echo still pending its own reception
/// (used to suppress the legacy textual reaction parsing for the bridge's
/// own tapbacks, §4.3 rule 3).
pub fn resolve(
    packet: &MeshPacket,
    text: &str,
    channels: &ChannelTracker,
    now: Timestamp,
    is_matrix_origin: impl Fn(PacketId) -> bool,
) -> Resolution {
    if let Some(parent) = explicit_reply_id(packet) {
        let role = if packet.port == Port::REACTION {
            Role::Reaction
        } else {
            Role::Reply
        };
        return Resolution {
            role,
            parent_packet_id: Some(PacketId(parent)),
        };
    }

    if let Some(parent) = deep_linkage_scan(&packet.decoded, 0) {
        return Resolution {
            role: Role::Reply,
            parent_packet_id: Some(PacketId(parent)),
        };
    }

    if let Some(captures) = LEGACY_REACTION_RE.captures(text) {
        if let Ok(parent) = u32::from_str_radix(&captures[1], 16) {
            let parent_id = PacketId(parent);
            if !is_matrix_origin(parent_id) {
                return Resolution {
                    role: Role::Reaction,
                    parent_packet_id: Some(parent_id),
                };
            }
        }
    }

    if is_emoji_only(text) {
        if let Some((last_id, last_at)) = channels.last_seen(packet.channel) {
            if now - last_at <= CORRELATION_WINDOW {
                return Resolution {
                    role: Role::Reaction,
                    parent_packet_id: Some(last_id),
                };
            }
        }
    }

    Resolution::new_message()
}

fn explicit_reply_id(packet: &MeshPacket) -> Option<u32> {
    if let Some(id) = packet.reply_id.filter(|id| *id != 0) {
        return Some(id);
    }
    for path in [&["reply_id"][..], &["decoded", "reply_id"], &["reaction", "reply_id"]] {
        if let Some(value) = dig(&packet.decoded, path) {
            if let Some(id) = value.as_u64() {
                if id != 0 {
                    return Some(id as u32);
                }
            }
        }
    }
    None
}

fn dig<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn deep_linkage_scan(value: &serde_json::Value, depth: u32) -> Option<u32> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                if LINKAGE_FIELD_RE.is_match(key) {
                    if let Some(id) = child.as_u64() {
                        if id != 0 {
                            return Some(id as u32);
                        }
                    }
                }
            }
            for child in map.values() {
                if let Some(found) = deep_linkage_scan(child, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        serde_json::Value::Array(items) => {
            items.iter().find_map(|item| deep_linkage_scan(item, depth + 1))
        }
        _ => None,
    }
}

/// True iff every grapheme cluster in `text` is made up of emoji or
/// variation/joining characters rather than ordinary script text.
fn is_emoji_only(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    text.graphemes(true).all(|grapheme| {
        grapheme.chars().all(|c| {
            let cp = c as u32;
            is_emoji_codepoint(cp) || matches!(cp, 0x200d | 0xfe0f | 0x20e3)
        })
    })
}

fn is_emoji_codepoint(cp: u32) -> bool {
    matches!(
        cp,
        0x1F300..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2190..=0x21FF
            | 0x2B00..=0x2BFF
            | 0x1F1E6..=0x1F1FF
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use serde_json::json;
    use test_case::test_case;
    use time::macros::datetime;

    #[test_case(Port::TEXT_MESSAGE => Role::Reply; "text message with explicit reply is a reply")]
    #[test_case(Port::REACTION => Role::Reaction; "reaction port with explicit reply is a reaction")]
    fn explicit_reply_role_depends_on_port(port: Port) -> Role {
        let packet = base_packet(json!({}), Some(0x1111), port);
        resolve(
            &packet,
            "x",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        )
        .role
    }

    #[test_case(Port::TEXT_MESSAGE => Role::Reply; "text message deep scan is a reply")]
    #[test_case(Port::REACTION => Role::Reply; "reaction port deep scan is still a reply, no carve-out")]
    fn deep_scan_role_ignores_port(port: Port) -> Role {
        let decoded = json!({ "nested": { "referenceId": 4660 } });
        let packet = base_packet(decoded, None, port);
        resolve(
            &packet,
            "x",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        )
        .role
    }

    fn base_packet(decoded: serde_json::Value, reply_id: Option<u32>, port: Port) -> MeshPacket {
        MeshPacket {
            id: PacketId(2),
            from: NodeId(1),
            channel: 0,
            decoded,
            hop_start: 3,
            hop_limit: 3,
            reply_id,
            port,
            text: None,
            payload: None,
        }
    }

    #[test]
    fn explicit_reply_field_wins_over_everything_else() {
        let packet = base_packet(json!({}), Some(0x1111), Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "not emoji",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::Reply);
        assert_eq!(resolution.parent_packet_id, Some(PacketId(0x1111)));
    }

    #[test]
    fn explicit_reply_field_on_reaction_port_is_a_reaction() {
        let packet = base_packet(json!({}), Some(0x1111), Port::REACTION);
        let resolution = resolve(
            &packet,
            "👍",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::Reaction);
    }

    #[test]
    fn deep_scan_finds_nested_reference_id() {
        let decoded = json!({ "nested": { "referenceId": 4660 } });
        let packet = base_packet(decoded, None, Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "whatever",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::Reply);
        assert_eq!(resolution.parent_packet_id, Some(PacketId(0x1234)));
    }

    #[test]
    fn deep_scan_on_reaction_port_is_still_a_reply() {
        let decoded = json!({ "nested": { "referenceId": 4660 } });
        let packet = base_packet(decoded, None, Port::REACTION);
        let resolution = resolve(
            &packet,
            "👍",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::Reply);
    }

    #[test]
    fn legacy_textual_reaction_is_parsed() {
        let packet = base_packet(json!({}), None, Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "[Reaction to !ae614908]: 🎉",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::Reaction);
        assert_eq!(resolution.parent_packet_id, Some(PacketId(0xae614908)));
    }

    #[test]
    fn legacy_textual_reaction_suppressed_for_matrix_origin_echo() {
        let packet = base_packet(json!({}), None, Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "[Reaction to !ae614908]: 🎉",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |id| id == PacketId(0xae614908),
        );
        assert_eq!(resolution.role, Role::New);
    }

    #[test]
    fn emoji_only_within_window_correlates_to_last_seen() {
        let mut channels = ChannelTracker::new();
        channels.record(0, PacketId(0x1111), datetime!(2026-01-01 00:00:00 UTC));
        let packet = base_packet(json!({}), None, Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "👍",
            &channels,
            datetime!(2026-01-01 00:05:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::Reaction);
        assert_eq!(resolution.parent_packet_id, Some(PacketId(0x1111)));
    }

    #[test]
    fn emoji_only_outside_window_is_a_new_message() {
        let mut channels = ChannelTracker::new();
        channels.record(0, PacketId(0x1111), datetime!(2026-01-01 00:00:00 UTC));
        let packet = base_packet(json!({}), None, Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "👍",
            &channels,
            datetime!(2026-01-01 00:15:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::New);
    }

    #[test]
    fn ordinary_text_with_no_linkage_is_new() {
        let packet = base_packet(json!({}), None, Port::TEXT_MESSAGE);
        let resolution = resolve(
            &packet,
            "hello there",
            &ChannelTracker::new(),
            datetime!(2026-01-01 00:00:00 UTC),
            |_| false,
        );
        assert_eq!(resolution.role, Role::New);
        assert_eq!(resolution.parent_packet_id, None);
    }
}
