use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{db::Message, MessageId, RoomId, UserId};

/// Events a connection may send. Joining is implicit on connect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat message")]
    ChatMessage { text: String },
    #[serde(rename = "voice message")]
    VoiceMessage { payload: String },
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "stop typing")]
    StopTyping,
    #[serde(rename = "start recording")]
    StartRecording,
    #[serde(rename = "stop recording")]
    StopRecording,
    #[serde(rename = "delete message")]
    DeleteMessage { target_id: MessageId },
    #[serde(rename = "check room")]
    CheckRoom,
}

impl ClientEvent {
    /// Parses one text frame. A frame that is not a known event comes back
    /// as the `error` event to send to its connection.
    pub fn decode(text: &str) -> Result<ClientEvent, ServerEvent> {
        serde_json::from_str(text).map_err(|err| ServerEvent::Error { message: format!("malformed event: {err}") })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "joined_room")]
    JoinedRoom { room_id: RoomId, messages: Vec<Message> },
    #[serde(rename = "update users")]
    UpdateUsers { users: Vec<String> },
    #[serde(rename = "chat message")]
    ChatMessage {
        id: MessageId,
        user_id: UserId,
        user: String,
        text: String,
        #[serde(with = "time::serde::rfc3339")]
        ts: OffsetDateTime,
    },
    #[serde(rename = "voice message")]
    VoiceMessage {
        id: MessageId,
        user_id: UserId,
        user: String,
        payload: String,
        #[serde(with = "time::serde::rfc3339")]
        ts: OffsetDateTime,
    },
    #[serde(rename = "typing")]
    Typing { user: String },
    #[serde(rename = "stop typing")]
    StopTyping { user: String },
    #[serde(rename = "start recording")]
    StartRecording { user: String },
    #[serde(rename = "stop recording")]
    StopRecording { user: String },
    #[serde(rename = "delete message")]
    DeleteMessage { target_id: MessageId },
    #[serde(rename = "room status")]
    RoomStatus { filled: bool, code: Option<String> },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    /// Broadcast form of a persisted message.
    pub fn from_message(message: Message) -> ServerEvent {
        use crate::db::MessageKind::*;
        match message.kind {
            Text => ServerEvent::ChatMessage {
                id: message.id,
                user_id: message.sender_id,
                user: message.sender,
                text: message.content,
                ts: message.created_at,
            },
            Voice => ServerEvent::VoiceMessage {
                id: message.id,
                user_id: message.sender_id,
                user: message.sender,
                payload: message.content,
                ts: message.created_at,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::JoinedRoom { .. } => "joined_room",
            ServerEvent::UpdateUsers { .. } => "update users",
            ServerEvent::ChatMessage { .. } => "chat message",
            ServerEvent::VoiceMessage { .. } => "voice message",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::StopTyping { .. } => "stop typing",
            ServerEvent::StartRecording { .. } => "start recording",
            ServerEvent::StopRecording { .. } => "stop recording",
            ServerEvent::DeleteMessage { .. } => "delete message",
            ServerEvent::RoomStatus { .. } => "room status",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Ephemeral activity indicators. Never persisted, never echoed to their origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Typing,
    StopTyping,
    StartRecording,
    StopRecording,
}

impl Indicator {
    pub fn event(self, user: String) -> ServerEvent {
        match self {
            Indicator::Typing => ServerEvent::Typing { user },
            Indicator::StopTyping => ServerEvent::StopTyping { user },
            Indicator::StartRecording => ServerEvent::StartRecording { user },
            Indicator::StopRecording => ServerEvent::StopRecording { user },
        }
    }
}
