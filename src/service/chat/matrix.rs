//! Matrix integration for msc-bot.
//!
//! This module provides the Matrix implementation of `GenericChatClient`:
//! - Logging in (or restoring a saved session) and keeping the sync loop running
//! - Accepting room invites
//! - Receiving room messages and sending notices

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::{self, room_message::RoomMessage},
    scanner::{IncomingMessage, MessageKind, MscScanner},
    service::resolver::MscResolver,
};
use async_trait::async_trait;
use matrix_sdk::{
    Client, Room, SessionMeta,
    authentication::{SessionTokens, matrix::MatrixSession},
    config::SyncSettings,
    event_handler::Ctx,
    ruma::{
        RoomId, UserId,
        events::room::{
            member::{MembershipState, StrippedRoomMemberEvent},
            message::{MessageType, OriginalSyncRoomMessageEvent, Relation, RoomMessageEventContent},
        },
    },
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use std::{path::Path, sync::Arc};

use super::{ChatClient, GenericChatClient};

// Extra methods on `ChatClient` applied by the matrix implementation.

impl ChatClient {
    /// Creates a new Matrix chat client.
    pub async fn matrix(config: &Config, scanner: Arc<MscScanner>, resolver: MscResolver) -> Res<Self> {
        let client = MatrixChatClient::new(config, scanner, resolver).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<MatrixChatClient> for ChatClient {
    fn from(client: MatrixChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// Handler context for the matrix event handlers.
#[derive(Clone)]
struct MatrixUserState {
    scanner: Arc<MscScanner>,
    resolver: MscResolver,
    chat: ChatClient,
}

/// Matrix client implementation.
#[derive(Clone)]
struct MatrixChatClient {
    pub client: Client,
    pub bot_user_id: String,
    pub autojoin: bool,
    pub scanner: Arc<MscScanner>,
    pub resolver: MscResolver,
}

/// Login session kept on disk between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SavedSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user_id: String,
    device_id: String,
}

impl SavedSession {
    fn into_matrix_session(self) -> Res<MatrixSession> {
        Ok(MatrixSession {
            meta: SessionMeta {
                user_id: UserId::parse(&self.user_id)?,
                device_id: self.device_id.into(),
            },
            tokens: SessionTokens {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
            },
        })
    }
}

fn load_session(path: &Path) -> Res<Option<SavedSession>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;

    Ok(Some(serde_json::from_str(&raw)?))
}

fn save_session(path: &Path, session: &SavedSession) -> Res<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, serde_json::to_string_pretty(session)?)?;

    Ok(())
}

impl MatrixChatClient {
    /// Create a new Matrix chat client and sign in.
    #[instrument(name = "MatrixChatClient::new", skip_all)]
    pub async fn new(config: &Config, scanner: Arc<MscScanner>, resolver: MscResolver) -> Res<Self> {
        // Initialize the Matrix client.

        let mut builder = Client::builder().homeserver_url(&config.matrix_homeserver_url);

        if let Some(store_path) = &config.matrix_store_path {
            builder = builder.sqlite_store(store_path, None);
        }

        let client = builder.build().await?;

        // Restore the previous session, so that the device (and its store) is reused;
        // otherwise log in and remember the new session.

        let session_path = config.matrix_session_path();

        let bot_user_id = match session_path.as_deref().map(load_session).transpose()?.flatten() {
            Some(session) => {
                info!("Restoring session for device {} ...", session.device_id);

                let user_id = session.user_id.clone();
                client.restore_session(session.into_matrix_session()?).await?;

                user_id
            }
            None => {
                let response = client
                    .matrix_auth()
                    .login_username(&config.matrix_username, &config.matrix_password)
                    .initial_device_display_name(&config.matrix_device_name)
                    .send()
                    .await?;

                let session = SavedSession {
                    access_token: response.access_token.clone(),
                    refresh_token: response.refresh_token.clone(),
                    user_id: response.user_id.to_string(),
                    device_id: response.device_id.to_string(),
                };

                match &session_path {
                    Some(path) => save_session(path, &session)?,
                    None => warn!("No session file configured; a new device is registered on every start."),
                }

                session.user_id
            }
        };

        info!("Matrix bot user ID: {}", bot_user_id);

        Ok(Self {
            client,
            bot_user_id,
            autojoin: config.matrix_autojoin,
            scanner,
            resolver,
        })
    }
}

#[async_trait]
impl GenericChatClient for MatrixChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self) -> Void {
        // Invites that arrived while offline come with the first sync, so the
        // invite handler has to be in place before it.

        if self.autojoin {
            self.client.add_event_handler(handle_invite_event);
        }

        // Skip the message backlog, so that old messages are not answered on startup.

        let response = self.client.sync_once(SyncSettings::default()).await?;

        // Register the message handler.

        self.client.add_event_handler_context(MatrixUserState {
            scanner: self.scanner.clone(),
            resolver: self.resolver.clone(),
            chat: ChatClient::from(self.clone()),
        });

        self.client.add_event_handler(handle_room_message_event);

        // Sync until the process is shut down.

        info!("Listening for room messages ...");

        self.client.sync(SyncSettings::default().token(response.next_batch)).await?;

        Ok(())
    }

    #[instrument(skip(self, markdown))]
    async fn send_notice(&self, room_id: &str, markdown: &str) -> Void {
        let room_id = RoomId::parse(room_id)?;
        let room = self.client.get_room(&room_id).ok_or(anyhow::anyhow!("Room {} is not known to the client", room_id))?;

        let content = RoomMessageEventContent::notice_markdown(markdown);

        let _ = room.send(content).await.map_err(|e| anyhow::anyhow!("Failed to send notice: {}", e))?;

        Ok(())
    }
}

// Event handlers for Matrix.

/// Accepts invites addressed to the bot.
#[instrument(skip_all, fields(room_id = %room.room_id()))]
async fn handle_invite_event(event: StrippedRoomMemberEvent, room: Room, client: Client) {
    let Some(own_id) = client.user_id() else {
        return;
    };

    if !is_invite_for(&event, own_id) {
        return;
    }

    info!("Joining invited room ...");

    if let Err(e) = room.join().await {
        warn!("Failed to accept invite: {}", e);
    }
}

/// Whether the membership event invites the given user.
fn is_invite_for(event: &StrippedRoomMemberEvent, user_id: &UserId) -> bool {
    event.content.membership == MembershipState::Invite && event.state_key == user_id.as_str()
}

/// Whether the message replaces an earlier one.
fn is_edit(content: &RoomMessageEventContent) -> bool {
    matches!(content.relates_to, Some(Relation::Replacement(_)))
}

/// Handles room message events from Matrix.
#[instrument(skip_all, fields(room_id = %room.room_id()))]
async fn handle_room_message_event(event: OriginalSyncRoomMessageEvent, room: Room, Ctx(state): Ctx<MatrixUserState>) {
    let message = RoomMessage {
        room_id: room.room_id().to_string(),
        event_id: event.event_id.to_string(),
        sender: event.sender.to_string(),
        is_edit: is_edit(&event.content),
        message: to_incoming_message(&event.content.msgtype),
    };

    interaction::room_message::handle_room_message(message, state.scanner, state.resolver, state.chat);
}

/// Maps Matrix message types onto the kinds the scanner distinguishes.
fn to_incoming_message(msgtype: &MessageType) -> IncomingMessage {
    match msgtype {
        MessageType::Text(content) => IncomingMessage::new(content.body.as_str(), MessageKind::Normal),
        MessageType::Emote(content) => IncomingMessage::new(content.body.as_str(), MessageKind::Normal),
        MessageType::Notice(content) => IncomingMessage::new(content.body.as_str(), MessageKind::Notice),
        other => IncomingMessage::new(other.body(), MessageKind::Other),
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use matrix_sdk::ruma::{
        EventId,
        events::{
            relation::{InReplyTo, Replacement},
            room::message::{EmoteMessageEventContent, RoomMessageEventContentWithoutRelation},
        },
    };
    use serde_json::json;

    use super::*;

    fn invite_event(membership: &str, state_key: &str) -> StrippedRoomMemberEvent {
        serde_json::from_value(json!({
            "type": "m.room.member",
            "sender": "@alice:example.org",
            "state_key": state_key,
            "content": { "membership": membership },
        }))
        .unwrap()
    }

    #[test]
    fn test_message_kinds() {
        let text = to_incoming_message(&MessageType::text_plain("see msc1234"));
        assert_eq!(text, IncomingMessage::new("see msc1234", MessageKind::Normal));

        let emote = to_incoming_message(&MessageType::Emote(EmoteMessageEventContent::plain("reads msc1")));
        assert_eq!(emote.kind, MessageKind::Normal);

        let notice = to_incoming_message(&MessageType::notice_plain("msc1234"));
        assert_eq!(notice, IncomingMessage::new("msc1234", MessageKind::Notice));
    }

    #[test]
    fn test_edit_detection() {
        let original = EventId::parse("$original:example.org").unwrap();

        let plain = RoomMessageEventContent::text_plain("msc1234");
        assert!(!is_edit(&plain));

        let mut edit = RoomMessageEventContent::text_plain("* msc1234");
        edit.relates_to = Some(Relation::Replacement(Replacement::new(original.clone(), RoomMessageEventContentWithoutRelation::text_plain("msc1234"))));
        assert!(is_edit(&edit));

        let mut reply = RoomMessageEventContent::text_plain("msc1234");
        reply.relates_to = Some(Relation::Reply { in_reply_to: InReplyTo::new(original) });
        assert!(!is_edit(&reply));
    }

    #[test]
    fn test_invite_filter() {
        let own_id = UserId::parse("@mscbot:example.org").unwrap();

        assert!(is_invite_for(&invite_event("invite", "@mscbot:example.org"), &own_id));
        assert!(!is_invite_for(&invite_event("invite", "@bob:example.org"), &own_id));
        assert!(!is_invite_for(&invite_event("join", "@mscbot:example.org"), &own_id));
    }

    #[test]
    fn test_session_round_trip() {
        let dir = std::env::temp_dir().join(format!("msc-bot-session-{}", std::process::id()));
        let path = dir.join("nested").join("session.json");

        assert_eq!(load_session(&path).unwrap(), None);

        let session = SavedSession {
            access_token: "syt_token".to_string(),
            refresh_token: None,
            user_id: "@mscbot:example.org".to_string(),
            device_id: "ABCDEFGH".to_string(),
        };
        save_session(&path, &session).unwrap();

        let loaded = load_session(&path).unwrap().unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(loaded, session);

        let matrix_session = loaded.into_matrix_session().unwrap();
        assert_eq!(matrix_session.meta.user_id.as_str(), "@mscbot:example.org");
        assert_eq!(matrix_session.meta.device_id.as_str(), "ABCDEFGH");
        assert_eq!(matrix_session.tokens.access_token, "syt_token");
    }

    #[test]
    fn test_session_with_bad_user_id_is_rejected() {
        let session = SavedSession {
            access_token: "syt_token".to_string(),
            refresh_token: None,
            user_id: "not-a-user-id".to_string(),
            device_id: "ABCDEFGH".to_string(),
        };

        assert!(session.into_matrix_session().is_err());
    }
}
