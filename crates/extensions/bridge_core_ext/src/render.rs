//! Deterministic rendering of a [MessageState] into the Matrix body shown
//! to the room (§4.2). Rendering never touches external collaborators
//! beyond resolving display names: identical state always yields an
//! identical body.
use crate::collaborators::NameDirectory;
use crate::ids::GatewayId;
use crate::ids::NodeId;
use crate::state::MessageState;
use crate::state::Reaction;
use crate::state::ReceptionList;
use crate::store::MessageStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    pub plain: String,
    pub html: String,
}

pub(crate) fn node_label(names: &dyn NameDirectory, node: NodeId) -> String {
    names
        .node_display_name(node)
        .unwrap_or_else(|| format!("Node{node}"))
}

fn gateway_label(names: &dyn NameDirectory, gateway: GatewayId) -> String {
    match gateway {
        GatewayId::Node(node) => node_label(names, node),
        GatewayId::Lan => "lan".to_string(),
    }
}

fn metric(hop_count: u32, rssi: i32) -> String {
    if hop_count == 0 {
        format!("-{}dB", rssi.abs())
    } else {
        format!("{hop_count} hops")
    }
}

/// `<gateway> (<metric>), <gateway> (<metric>), ...` in arrival order.
pub fn stats_string(reception_list: &ReceptionList, names: &dyn NameDirectory) -> String {
    reception_list
        .iter()
        .map(|r| format!("{} ({})", gateway_label(names, r.gateway_id), metric(r.hop_count, r.rssi)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn reaction_summary_lines(reactions: &[Reaction]) -> Vec<String> {
    let mut by_emoji: Vec<(String, Vec<String>)> = Vec::new();
    for reaction in reactions {
        match by_emoji.iter_mut().find(|(emoji, _)| *emoji == reaction.emoji) {
            Some((_, reactors)) => reactors.push(reaction.reactor.clone()),
            None => by_emoji.push((reaction.emoji.clone(), vec![reaction.reactor.clone()])),
        }
    }
    by_emoji
        .into_iter()
        .map(|(emoji, reactors)| format!("  ↳ {emoji} — {}", reactors.join(", ")))
        .collect()
}

fn reply_block_lines(state: &MessageState, store: &MessageStore, names: &dyn NameDirectory) -> Vec<String> {
    let mut lines = Vec::new();
    for packet_id in &state.replies {
        let Some(child) = store.get(*packet_id) else {
            continue;
        };
        lines.push(format!(
            "  ↳ {}: {} ({})",
            node_label(names, child.sender_node),
            child.original_text,
            stats_string(&child.reception_list, names)
        ));
    }
    lines.extend(reaction_summary_lines(&state.reactions));
    lines
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render `state`'s current body in both plain-text and HTML form (§4.2).
pub fn render(state: &MessageState, store: &MessageStore, names: &dyn NameDirectory) -> RenderedBody {
    let stats = stats_string(&state.reception_list, names);
    let reply_lines = reply_block_lines(state, store, names);

    let mut plain_lines = if state.is_matrix_origin {
        vec![format!("(Received by: {stats})")]
    } else {
        vec![
            format!("{}: {}", node_label(names, state.sender_node), state.original_text),
            format!("(Received by: {stats})"),
        ]
    };
    plain_lines.extend(reply_lines.iter().cloned());
    let plain = plain_lines.join("\n");

    let mut html_lines = if state.is_matrix_origin {
        vec![format!("(Received by: {})", escape_html(&stats))]
    } else {
        vec![
            format!(
                "<strong>{}</strong>: {}",
                escape_html(&node_label(names, state.sender_node)),
                escape_html(&state.original_text)
            ),
            format!("(Received by: {})", escape_html(&stats)),
        ]
    };
    html_lines.extend(reply_lines.iter().map(|line| escape_html(line)));
    let html = html_lines.join("<br/>");

    RenderedBody { plain, html }
}
