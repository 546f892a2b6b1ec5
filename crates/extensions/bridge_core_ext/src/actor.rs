//! The Bridge coordinator (§4.1, §4.5): the only actor that touches the
//! message-state store, so sequential processing of its inbox is what
//! realises the per-`packet_id` serialisation of §4.1-b and the
//! single-threaded event-loop model of §5 — no additional locking needed.
use crate::collaborators::MatrixClient;
use crate::collaborators::MeshSink;
use crate::collaborators::NameDirectory;
use crate::collaborators::PersistenceStore;
use crate::config::CoreConfig;
use crate::error::BridgeError;
use crate::extract::extract_text;
use crate::ids::PacketId;
use crate::lifecycle;
use crate::packet::MeshPacket;
use crate::packet::Port;
use crate::render::node_label;
use crate::render::render;
use crate::resolver::resolve;
use crate::resolver::ChannelTracker;
use crate::resolver::Role;
use crate::state::MessageState;
use crate::state::Reaction;
use crate::state::ReceptionStats;
use crate::state::SourceTag;
use crate::store::MessageStore;
use bridge_actors::fan_in_message_type;
use bridge_actors::Actor;
use bridge_actors::NoMessage;
use bridge_actors::RuntimeError;
use bridge_actors::SimpleMessageBox;
use clock::Clock;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// A single gateway's report of a mesh packet, tagged with where it came
/// from (§6 mesh source contract).
#[derive(Debug)]
pub struct MeshObservation {
    pub packet: MeshPacket,
    pub source: SourceTag,
    pub stats: ReceptionStats,
}

/// A Matrix-room event relevant to the bridge, already filtered to
/// exclude the bridge's own posts by sender (§4.5).
#[derive(Debug)]
pub enum MatrixInboundEvent {
    Text {
        event_id: String,
        sender: String,
        in_reply_to: Option<String>,
        body: String,
    },
    Reaction {
        target_event_id: String,
        emoji: String,
        reactor: String,
    },
    Edit {
        original_event_id: String,
    },
}

/// Fires on the lifecycle manager's schedule, nominally hourly (§4.6).
#[derive(Debug)]
pub struct Tick;

fan_in_message_type!(BridgeInput[MeshObservation, MatrixInboundEvent, Tick] : Debug);

pub struct BridgeActor {
    name: String,
    messages: SimpleMessageBox<BridgeInput, NoMessage>,
    config: CoreConfig,
    store: MessageStore,
    channels: ChannelTracker,
    mesh_sink: Arc<dyn MeshSink>,
    matrix: Arc<dyn MatrixClient>,
    names: Arc<dyn NameDirectory>,
    persistence: Arc<dyn PersistenceStore>,
    clock: Arc<dyn Clock>,
}

impl BridgeActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        messages: SimpleMessageBox<BridgeInput, NoMessage>,
        config: CoreConfig,
        rehydrated: Vec<MessageState>,
        mesh_sink: Arc<dyn MeshSink>,
        matrix: Arc<dyn MatrixClient>,
        names: Arc<dyn NameDirectory>,
        persistence: Arc<dyn PersistenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let channels = lifecycle::recompute_channel_tracker(&rehydrated);
        let mut store = MessageStore::new();
        for state in rehydrated {
            store
                .insert(state)
                .expect("persisted message states must have unique packet_ids");
        }
        BridgeActor {
            name: "bridge".to_string(),
            messages,
            config,
            store,
            channels,
            mesh_sink,
            matrix,
            names,
            persistence,
            clock,
        }
    }

    async fn handle_mesh_packet(&mut self, obs: MeshObservation) -> Result<(), BridgeError> {
        let MeshObservation { packet, stats, .. } = obs;

        if !self.config.channel_is_allowed(packet.channel) {
            return Ok(());
        }

        let text = extract_text(&packet);
        if text.is_empty() && packet.port != Port::NODEINFO && packet.port != Port::REACTION {
            debug!(target: "bridge", packet_id = %packet.id, "dropping empty-text packet");
            return Ok(());
        }
        if packet.port == Port::NODEINFO {
            self.handle_nodeinfo(&packet, &text);
            return Ok(());
        }

        let now = self.clock.now();
        let resolution = resolve(&packet, &text, &self.channels, now, |id| {
            self.store.get(id).map(|s| s.is_matrix_origin).unwrap_or(false)
        });

        let is_new = !self.store.contains(packet.id);
        if is_new {
            let mut state = MessageState::new(packet.id, packet.from, packet.channel, text.clone(), now);
            state.parent_packet_id = resolution.parent_packet_id;
            self.store.insert(state)?;
            self.link_to_parent(packet.id, resolution.role, resolution.parent_packet_id, &packet, &text);
        }

        let mut stats_changed = false;
        if let Some(state) = self.store.get_mut(packet.id) {
            stats_changed = state.reception_list.insert(stats);
            if stats_changed {
                state.last_update_at = now;
            }
        }

        self.render_and_push(packet.id, resolution.role, is_new, stats_changed).await?;
        self.persist(packet.id).await;

        if !matches!(resolution.role, Role::Reaction) {
            self.channels.record(packet.channel, packet.id, now);
        }

        Ok(())
    }

    fn handle_nodeinfo(&mut self, packet: &MeshPacket, text: &str) {
        let short = packet
            .decoded
            .get("short_name")
            .and_then(|v| v.as_str())
            .unwrap_or(text);
        let long = packet
            .decoded
            .get("long_name")
            .and_then(|v| v.as_str())
            .unwrap_or(text);
        self.names.record_node_info(packet.from, short, long);
    }

    fn link_to_parent(
        &mut self,
        packet_id: PacketId,
        role: Role,
        parent_packet_id: Option<PacketId>,
        packet: &MeshPacket,
        text: &str,
    ) {
        let Some(parent_id) = parent_packet_id else {
            return;
        };
        let reactor = node_label(self.names.as_ref(), packet.from);
        let Some(parent) = self.store.get_mut(parent_id) else {
            return;
        };
        match role {
            Role::Reply => parent.replies.push(packet_id),
            Role::Reaction => parent.reactions.push(Reaction {
                emoji: text.to_string(),
                reactor,
            }),
            Role::New => {}
        }
    }

    /// Re-render and push to Matrix: a fresh `post_message` the first time
    /// a non-reaction packet is seen, an `edit_message` when a later
    /// observation actually changed the reception stats, and for
    /// reactions an edit of the *parent's* event, once, on first sight
    /// (§4.1-g, §4.2). A duplicate re-delivery that adds nothing new
    /// issues no Matrix call at all (§8.1 dedup convergence).
    async fn render_and_push(
        &mut self,
        packet_id: PacketId,
        role: Role,
        is_new: bool,
        stats_changed: bool,
    ) -> Result<(), BridgeError> {
        let target_id = match role {
            Role::Reaction => match self.store.get(packet_id).and_then(|s| s.parent_packet_id) {
                Some(parent_id) if self.store.contains(parent_id) => parent_id,
                _ => return Ok(()),
            },
            Role::New | Role::Reply => packet_id,
        };

        let Some(state) = self.store.get(target_id) else {
            return Ok(());
        };
        let rendered = render(state, &self.store, self.names.as_ref());
        let existing_event_id = state.matrix_event_id.clone();
        let parent_packet_id = state.parent_packet_id;

        match existing_event_id {
            None => {
                let in_reply_to = match (role, parent_packet_id) {
                    (Role::Reply, Some(parent_id)) => self
                        .store
                        .get(parent_id)
                        .and_then(|parent| parent.matrix_event_id.clone()),
                    _ => None,
                };
                let event_id = self
                    .matrix
                    .post_message(&rendered.plain, &rendered.html, in_reply_to.as_deref())
                    .await?;
                self.store.assign_event_id(target_id, event_id)?;
            }
            Some(event_id) if (role == Role::Reaction && is_new) || stats_changed => {
                self.matrix.edit_message(&event_id, &rendered.plain, &rendered.html).await?;
            }
            Some(_) => {}
        }

        Ok(())
    }

    async fn persist(&mut self, packet_id: PacketId) {
        if let Some(state) = self.store.get(packet_id) {
            if let Err(error) = self.persistence.save_message_state(state).await {
                warn!(target: "bridge", %error, packet_id = %packet_id, "failed to persist message state");
            }
        }
    }

    async fn handle_matrix_event(&mut self, event: MatrixInboundEvent) -> Result<(), BridgeError> {
        match event {
            MatrixInboundEvent::Text {
                event_id,
                sender,
                in_reply_to,
                body,
            } => self.handle_matrix_text(event_id, sender, in_reply_to, body).await,
            MatrixInboundEvent::Reaction {
                target_event_id,
                emoji,
                ..
            } => self.handle_matrix_reaction(target_event_id, emoji).await,
            MatrixInboundEvent::Edit { original_event_id } => {
                debug!(target: "bridge", event_id = %original_event_id, "ignoring matrix edit, mesh has no edit primitive");
                Ok(())
            }
        }
    }

    async fn handle_matrix_text(
        &mut self,
        event_id: String,
        sender: String,
        in_reply_to: Option<String>,
        body: String,
    ) -> Result<(), BridgeError> {
        let display_name = self.matrix.display_name(&sender).await.unwrap_or(sender);
        let parts = split_matrix_text(&display_name, &body);

        let (reply_target, channel) = match in_reply_to.as_deref().and_then(|id| self.store.get_by_event_id(id)) {
            Some(parent) => (Some(parent.packet_id.0), parent.channel_index),
            None => (None, self.config.default_outbound_channel),
        };

        let now = self.clock.now();
        for (index, part) in parts.iter().enumerate() {
            let reply_id = if index == 0 { reply_target } else { None };
            let packet_id = self.mesh_sink.send_text(part, channel, reply_id).await?;
            let mut state = MessageState::new(
                PacketId(packet_id),
                self.config.own_node,
                channel,
                part.clone(),
                now,
            );
            state.is_matrix_origin = true;
            state.matrix_origin_event_id = Some(event_id.clone());
            self.store.insert(state)?;
            self.persist(PacketId(packet_id)).await;
        }
        Ok(())
    }

    async fn handle_matrix_reaction(&mut self, target_event_id: String, emoji: String) -> Result<(), BridgeError> {
        let Some(target_packet_id) = self.store.get_by_event_id(&target_event_id).map(|s| s.packet_id) else {
            return Ok(());
        };
        let channel = self.store.get(target_packet_id).map(|s| s.channel_index).unwrap_or(self.config.default_outbound_channel);
        let packet_id = self.mesh_sink.send_tapback(target_packet_id.0, &emoji, channel).await?;

        let now = self.clock.now();
        let mut state = MessageState::new(PacketId(packet_id), self.config.own_node, channel, emoji, now);
        state.is_matrix_origin = true;
        state.parent_packet_id = Some(target_packet_id);
        self.store.insert(state)?;
        self.persist(PacketId(packet_id)).await;
        Ok(())
    }

    async fn handle_tick(&mut self) {
        let now = self.clock.now();
        let evicted = lifecycle::sweep(&mut self.store, &self.config.eviction, now);
        for packet_id in evicted {
            if let Err(error) = self.persistence.delete_message_state(packet_id).await {
                warn!(target: "bridge", %error, %packet_id, "failed to persist eviction");
            }
        }
    }
}

/// Strip Matrix's quoted-fallback prefix (leading `>` lines up to the
/// first blank line), prepend `[<display_name>]: `, then split on
/// grapheme-safe boundaries into ≤200-byte parts, numbering them
/// `(n/N)` when there's more than one (§4.5).
pub fn split_matrix_text(display_name: &str, body: &str) -> Vec<String> {
    const MAX_LEN: usize = 200;
    const SUFFIX_RESERVE: usize = 12;

    let content = strip_quoted_fallback(body);
    let prefixed = format!("[{display_name}]: {content}");
    let budget = MAX_LEN - SUFFIX_RESERVE;

    let mut chunks = Vec::new();
    let mut current = String::new();
    for grapheme in prefixed.graphemes(true) {
        if current.len() + grapheme.len() > budget && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(grapheme);
    }
    chunks.push(current);

    let total = chunks.len();
    if total > 1 {
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| format!("{chunk} ({}/{total})", index + 1))
            .collect()
    } else {
        chunks
    }
}

fn strip_quoted_fallback(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first().map(|line| line.starts_with('>')).unwrap_or(false) {
        if let Some(blank_at) = lines.iter().position(|line| line.trim().is_empty()) {
            return lines[blank_at + 1..].join("\n");
        }
    }
    text.to_string()
}

#[async_trait::async_trait]
impl Actor for BridgeActor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> Result<(), RuntimeError> {
        while let Some(input) = self.messages.recv().await {
            let result = match input {
                BridgeInput::MeshObservation(obs) => self.handle_mesh_packet(obs).await,
                BridgeInput::MatrixInboundEvent(event) => self.handle_matrix_event(event).await,
                BridgeInput::Tick(Tick) => {
                    self.handle_tick().await;
                    Ok(())
                }
            };
            if let Err(error) = result {
                warn!(target: "bridge", %error, "packet handler failed, continuing");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_not_split() {
        let parts = split_matrix_text("alice", "hello");
        assert_eq!(parts, vec!["[alice]: hello".to_string()]);
    }

    #[test]
    fn long_text_splits_into_numbered_parts_under_200_bytes() {
        let long = "a".repeat(450);
        let parts = split_matrix_text("alice", &long);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= 200);
        }
        assert!(parts[0].starts_with("[alice]: "));
        assert!(parts.last().unwrap().ends_with(&format!("({}/{})", parts.len(), parts.len())));
    }

    #[test]
    fn strips_leading_quoted_fallback() {
        let body = "> original message\n\nmy reply";
        assert_eq!(strip_quoted_fallback(body), "my reply");
    }

    #[test]
    fn leaves_text_without_quote_fallback_untouched() {
        let body = "just a normal message";
        assert_eq!(strip_quoted_fallback(body), body);
    }

    use proptest::prelude::*;

    proptest! {
        /// Splitting is a pure function of its inputs: running it twice on
        /// the same display name and body yields identical output (§8.5).
        #[test]
        fn split_matrix_text_is_idempotent(name in "[a-zA-Z ]{0,20}", body in ".{0,600}") {
            let first = split_matrix_text(&name, &body);
            let second = split_matrix_text(&name, &body);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn split_matrix_text_parts_stay_under_budget(name in "[a-zA-Z ]{0,20}", body in ".{0,600}") {
            let parts = split_matrix_text(&name, &body);
            for part in &parts {
                prop_assert!(part.len() <= 200);
            }
        }
    }

    use crate::collaborators::MockMatrixClient;
    use crate::collaborators::MockMeshSink;
    use crate::collaborators::MockNameDirectory;
    use crate::collaborators::MockPersistenceStore;
    use crate::ids::GatewayId;
    use crate::ids::NodeId;
    use bridge_actors::test_helpers::new_silent_client_box;
    use clock::MockClock;
    use mockall::predicate::eq;
    use time::macros::datetime;

    fn text_packet(id: u32, from: u32, channel: u32, text: &str, reply_id: Option<u32>, port: Port) -> MeshPacket {
        MeshPacket {
            id: PacketId(id),
            from: NodeId(from),
            channel,
            decoded: serde_json::json!({}),
            hop_start: 0,
            hop_limit: 0,
            reply_id,
            port,
            text: Some(text.to_string()),
            payload: None,
        }
    }

    fn stats(gateway: GatewayId, rssi: i32, snr: f32) -> ReceptionStats {
        ReceptionStats {
            gateway_id: gateway,
            rssi,
            snr,
            hop_count: 0,
            timestamp: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    fn new_actor(
        mesh_sink: MockMeshSink,
        matrix: MockMatrixClient,
        names: MockNameDirectory,
        persistence: MockPersistenceStore,
    ) -> BridgeActor {
        let mut clock = MockClock::new();
        clock.expect_now().returning(|| datetime!(2026-01-01 00:00:00 UTC));
        let client = new_silent_client_box::<BridgeInput>("bridge-test", 8);
        BridgeActor::new(
            client.messages,
            CoreConfig {
                allowed_channels: Default::default(),
                default_outbound_channel: 0,
                own_node: NodeId(0xdeadbeef),
                eviction: crate::lifecycle::EvictionConfig::default(),
            },
            Vec::new(),
            Arc::new(mesh_sink),
            Arc::new(matrix),
            Arc::new(names),
            Arc::new(persistence),
            Arc::new(clock),
        )
    }

    fn permissive_names() -> MockNameDirectory {
        let mut names = MockNameDirectory::new();
        names.expect_node_display_name().returning(|_| None);
        names.expect_record_node_info().returning(|_, _, _| ());
        names
    }

    fn permissive_persistence() -> MockPersistenceStore {
        let mut persistence = MockPersistenceStore::new();
        persistence.expect_save_message_state().returning(|_| Ok(()));
        persistence
    }

    /// S1: a single MQTT reception of a new packet posts exactly one
    /// Matrix message.
    #[tokio::test]
    async fn new_packet_posts_one_matrix_message() {
        let mut matrix = MockMatrixClient::new();
        matrix
            .expect_post_message()
            .times(1)
            .returning(|_, _, _| Ok("$event1".to_string()));

        let mut actor = new_actor(
            MockMeshSink::new(),
            matrix,
            permissive_names(),
            permissive_persistence(),
        );

        let obs = MeshObservation {
            packet: text_packet(0x1111, 0xae614908, 0, "hello", None, Port::TEXT_MESSAGE),
            source: SourceTag::Mqtt,
            stats: stats(GatewayId::Node(NodeId(0xae61)), -40, 8.0),
        };
        actor.handle_mesh_packet(obs).await.unwrap();
    }

    /// S2/S3: a second gateway's reception of the same packet edits the
    /// existing event once; an identical re-delivery from a gateway
    /// already recorded issues no further Matrix call.
    #[tokio::test]
    async fn redelivery_from_known_gateway_is_deduped() {
        let mut matrix = MockMatrixClient::new();
        matrix
            .expect_post_message()
            .times(1)
            .returning(|_, _, _| Ok("$event1".to_string()));
        matrix
            .expect_edit_message()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut actor = new_actor(
            MockMeshSink::new(),
            matrix,
            permissive_names(),
            permissive_persistence(),
        );

        let packet = text_packet(0x1111, 0xae614908, 0, "hello", None, Port::TEXT_MESSAGE);
        actor
            .handle_mesh_packet(MeshObservation {
                packet: packet.clone(),
                source: SourceTag::Mqtt,
                stats: stats(GatewayId::Node(NodeId(0xae61)), -40, 8.0),
            })
            .await
            .unwrap();

        actor
            .handle_mesh_packet(MeshObservation {
                packet: packet.clone(),
                source: SourceTag::Lan,
                stats: stats(GatewayId::Lan, -30, 9.5),
            })
            .await
            .unwrap();

        // Same gateway re-delivering identical stats: no further edit.
        actor
            .handle_mesh_packet(MeshObservation {
                packet,
                source: SourceTag::Mqtt,
                stats: stats(GatewayId::Node(NodeId(0xae61)), -40, 8.0),
            })
            .await
            .unwrap();
    }

    /// S4: a reaction packet with an explicit `reply_id` edits its
    /// parent's event and posts no new message of its own.
    #[tokio::test]
    async fn reaction_edits_parent_and_posts_nothing_new() {
        let mut matrix = MockMatrixClient::new();
        matrix
            .expect_post_message()
            .times(1)
            .returning(|_, _, _| Ok("$event1".to_string()));
        matrix
            .expect_edit_message()
            .with(eq("$event1"), mockall::predicate::always(), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut actor = new_actor(
            MockMeshSink::new(),
            matrix,
            permissive_names(),
            permissive_persistence(),
        );

        actor
            .handle_mesh_packet(MeshObservation {
                packet: text_packet(0x1111, 0xae614908, 0, "hello", None, Port::TEXT_MESSAGE),
                source: SourceTag::Mqtt,
                stats: stats(GatewayId::Node(NodeId(0xae61)), -40, 8.0),
            })
            .await
            .unwrap();

        actor
            .handle_mesh_packet(MeshObservation {
                packet: text_packet(0x2222, 0xae614908, 0, "👍", Some(0x1111), Port::REACTION),
                source: SourceTag::Mqtt,
                stats: stats(GatewayId::Node(NodeId(0xae61)), -35, 7.0),
            })
            .await
            .unwrap();
    }
}
