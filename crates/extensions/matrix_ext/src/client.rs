use crate::MatrixExtError;
use async_trait::async_trait;
use bridge_core_ext::BridgeError;
use bridge_core_ext::MatrixClient;
use matrix_sdk::config::SyncSettings;
use matrix_sdk::room::Room;
use matrix_sdk::ruma::events::room::message::RoomMessageEventContent;
use matrix_sdk::ruma::events::relation::Replacement;
use matrix_sdk::ruma::OwnedEventId;
use matrix_sdk::ruma::OwnedRoomId;
use matrix_sdk::ruma::OwnedUserId;
use matrix_sdk::Client;

/// Either password or access-token login, mirroring the `MATRIX_PASSWORD`
/// / `MATRIX_TOKEN` alternatives of §6's configuration surface.
pub enum MatrixCredentials {
    Password { user: String, password: String },
    Token(String),
}

/// Owns the authenticated `matrix-sdk` client and the single room the
/// bridge mirrors (§1 Non-goals: no multi-room fan-out).
pub struct MatrixCollaborator {
    client: Client,
    room_id: OwnedRoomId,
}

impl MatrixCollaborator {
    pub async fn login(
        homeserver: &str,
        credentials: MatrixCredentials,
        room_id: OwnedRoomId,
    ) -> Result<Self, MatrixExtError> {
        let client = Client::builder()
            .homeserver_url(homeserver)
            .build()
            .await?;

        match credentials {
            MatrixCredentials::Password { user, password } => {
                client
                    .matrix_auth()
                    .login_username(&user, &password)
                    .initial_device_display_name("mesh-matrix-bridge")
                    .send()
                    .await
                    .map_err(|error| MatrixExtError::Login(error.to_string()))?;
            }
            MatrixCredentials::Token(token) => {
                client
                    .matrix_auth()
                    .restore_session(matrix_sdk::authentication::matrix::MatrixSession {
                        meta: matrix_sdk::SessionMeta {
                            user_id: client
                                .whoami()
                                .await
                                .map(|info| info.user_id)
                                .unwrap_or_else(|_| OwnedUserId::try_from("@bridge:unknown").unwrap()),
                            device_id: "BRIDGE".into(),
                        },
                        tokens: matrix_sdk::authentication::matrix::MatrixSessionTokens {
                            access_token: token,
                            refresh_token: None,
                        },
                    })
                    .await
                    .map_err(|error| MatrixExtError::Login(error.to_string()))?;
            }
        }

        client.sync_once(SyncSettings::default()).await?;

        Ok(MatrixCollaborator { client, room_id })
    }

    fn room(&self) -> Result<Room, MatrixExtError> {
        self.client
            .get_room(&self.room_id)
            .ok_or_else(|| MatrixExtError::RoomNotFound(self.room_id.to_string()))
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn room_id(&self) -> &OwnedRoomId {
        &self.room_id
    }

    /// The bridge's own Matrix user id, used to filter its own posts back
    /// out of the inbound event stream (§4.5). Set once login succeeds.
    pub fn own_user_id(&self) -> Option<OwnedUserId> {
        self.client.user_id().map(ToOwned::to_owned)
    }
}

#[async_trait]
impl MatrixClient for MatrixCollaborator {
    async fn post_message(
        &self,
        body_plain: &str,
        body_html: &str,
        in_reply_to_event_id: Option<&str>,
    ) -> Result<String, BridgeError> {
        let room = self.room().map_err(BridgeError::from)?;
        let mut content = RoomMessageEventContent::text_html(body_plain, body_html);

        if let Some(parent) = in_reply_to_event_id {
            if let Ok(parent_event_id) = OwnedEventId::try_from(parent) {
                if let Ok(Some(parent_event)) = room.event(&parent_event_id, None).await.map(Some) {
                    if let Ok(original) = parent_event.event.deserialize() {
                        content = content.make_reply_to(
                            &original,
                            matrix_sdk::ruma::events::room::message::ForwardThread::Yes,
                            matrix_sdk::ruma::events::room::message::AddMentions::Yes,
                        );
                    }
                }
            }
        }

        let response = room.send(content).await.map_err(MatrixExtError::from)?;
        Ok(response.event_id.to_string())
    }

    async fn edit_message(
        &self,
        event_id: &str,
        new_body_plain: &str,
        new_body_html: &str,
    ) -> Result<(), BridgeError> {
        let room = self.room().map_err(BridgeError::from)?;
        let target =
            OwnedEventId::try_from(event_id).map_err(|error| BridgeError::Matrix(error.to_string()))?;

        let new_content = RoomMessageEventContent::text_html(new_body_plain, new_body_html);
        let mut replacement_content = RoomMessageEventContent::text_html(
            format!("* {new_body_plain}"),
            format!("* {new_body_html}"),
        );
        replacement_content.relates_to = Some(matrix_sdk::ruma::events::room::message::Relation::Replacement(
            Replacement::new(target, new_content.into()),
        ));

        room.send(replacement_content).await.map_err(MatrixExtError::from)?;
        Ok(())
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        let room = self.room().ok()?;
        let user_id = OwnedUserId::try_from(user_id).ok()?;
        let member = room.get_member(&user_id).await.ok().flatten()?;
        member
            .display_name()
            .map(str::to_string)
            .or_else(|| Some(user_id.to_string()))
    }
}
