use crate::client::MatrixCollaborator;
use async_trait::async_trait;
use bridge_actors::Actor;
use bridge_actors::CombinedReceiver;
use bridge_actors::DynSender;
use bridge_actors::NoMessage;
use bridge_actors::RuntimeError;
use bridge_actors::SimpleMessageBox;
use bridge_core_ext::BridgeInput;
use bridge_core_ext::MatrixInboundEvent;
use matrix_sdk::config::SyncSettings;
use matrix_sdk::room::Room;
use matrix_sdk::ruma::events::reaction::OriginalSyncReactionEvent;
use matrix_sdk::ruma::events::room::message::MessageType;
use matrix_sdk::ruma::events::room::message::OriginalSyncRoomMessageEvent;
use matrix_sdk::ruma::events::room::message::Relation;
use matrix_sdk::ruma::OwnedUserId;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;

/// Drives the `matrix-sdk` sync loop and forwards room events the bridge
/// did not itself originate into the [BridgeActor](bridge_core_ext::BridgeActor)'s
/// inbox (§4.5).
pub struct MatrixSyncActor {
    name: String,
    messages: SimpleMessageBox<NoMessage, NoMessage>,
    collaborator: Arc<MatrixCollaborator>,
}

impl MatrixSyncActor {
    pub fn new(
        name: impl Into<String>,
        input: CombinedReceiver<NoMessage>,
        output: DynSender<NoMessage>,
        collaborator: Arc<MatrixCollaborator>,
        bridge_output: DynSender<BridgeInput>,
        own_user_id: OwnedUserId,
    ) -> Self {
        register_handlers(&collaborator, bridge_output, own_user_id);
        let name = name.into();
        MatrixSyncActor {
            messages: SimpleMessageBox::new(name.clone(), input, output),
            name,
            collaborator,
        }
    }
}

fn register_handlers(
    collaborator: &Arc<MatrixCollaborator>,
    bridge_output: DynSender<BridgeInput>,
    own_user_id: OwnedUserId,
) {
    let client = collaborator.client().clone();
    let room_id = collaborator.room_id().clone();

    let text_sender = bridge_output.sender_clone();
    let text_room_id = room_id.clone();
    let text_own_user = own_user_id.clone();
    client.add_event_handler(move |event: OriginalSyncRoomMessageEvent, room: Room| {
        let mut sender = text_sender.sender_clone();
        let room_id = text_room_id.clone();
        let own_user = text_own_user.clone();
        async move {
            if room.room_id() != room_id || event.sender == own_user {
                return;
            }
            let forwarded = match (&event.content.msgtype, &event.content.relates_to) {
                (MessageType::Text(text), Some(Relation::Replacement(_))) => {
                    let _ = text;
                    MatrixInboundEvent::Edit {
                        original_event_id: event.event_id.to_string(),
                    }
                }
                (MessageType::Text(text), relation) => {
                    let in_reply_to = match relation {
                        Some(Relation::Reply { in_reply_to }) => Some(in_reply_to.event_id.to_string()),
                        _ => None,
                    };
                    MatrixInboundEvent::Text {
                        event_id: event.event_id.to_string(),
                        sender: event.sender.to_string(),
                        in_reply_to,
                        body: text.body.clone(),
                    }
                }
                _ => return,
            };
            if let Err(error) = sender.send(forwarded.into()).await {
                warn!(target: "matrix_ext", %error, "bridge inbox closed, dropping matrix text event");
            }
        }
    });

    let reaction_sender = bridge_output.sender_clone();
    let reaction_room_id = room_id;
    let reaction_own_user = own_user_id;
    client.add_event_handler(move |event: OriginalSyncReactionEvent, room: Room| {
        let mut sender = reaction_sender.sender_clone();
        let room_id = reaction_room_id.clone();
        let own_user = reaction_own_user.clone();
        async move {
            if room.room_id() != room_id || event.sender == own_user {
                return;
            }
            let forwarded = MatrixInboundEvent::Reaction {
                target_event_id: event.content.relates_to.event_id.to_string(),
                emoji: event.content.relates_to.key.clone(),
                reactor: event.sender.to_string(),
            };
            if let Err(error) = sender.send(forwarded.into()).await {
                warn!(target: "matrix_ext", %error, "bridge inbox closed, dropping matrix reaction event");
            }
        }
    });

    debug!(target: "matrix_ext", "registered matrix event handlers");
}

#[async_trait]
impl Actor for MatrixSyncActor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> Result<(), RuntimeError> {
        let client = self.collaborator.client().clone();
        tokio::select! {
            _ = self.messages.recv() => Ok(()),
            result = client.sync(SyncSettings::default()) => {
                result.map_err(|error| RuntimeError::ActorError(error.to_string()))
            }
        }
    }
}
