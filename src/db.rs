use serde::Serialize;
use time::OffsetDateTime;

use crate::{MessageId, RoomId, UserId};

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS rooms (
    room_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_a_id INTEGER NOT NULL UNIQUE REFERENCES users(user_id) ON DELETE CASCADE,
    user_b_id INTEGER UNIQUE REFERENCES users(user_id),
    code TEXT UNIQUE,
    locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER NOT NULL REFERENCES rooms(room_id) ON DELETE CASCADE,
    sender_id INTEGER NOT NULL REFERENCES users(user_id),
    kind TEXT NOT NULL DEFAULT 'text',
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, message_id);
"#;

/// A durable pairing of up to two users.
///
/// `user_a` created the room and owns its join code; `user_b` is filled at
/// most once, which also locks the room and retires the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub room_id: RoomId,
    pub user_a: UserId,
    pub user_b: Option<UserId>,
    pub code: Option<String>,
    pub locked: bool,
}

pub(crate) type RoomRow = (RoomId, UserId, Option<UserId>, Option<String>, bool);

impl From<RoomRow> for Room {
    fn from((room_id, user_a, user_b, code, locked): RoomRow) -> Self {
        Room { room_id, user_a, user_b, code, locked }
    }
}

impl Room {
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.user_a == user_id || self.user_b == Some(user_id)
    }

    pub fn is_paired(&self) -> bool {
        self.user_b.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Voice,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
        }
    }

    pub(crate) fn from_column(kind: &str) -> MessageKind {
        match kind {
            "voice" => MessageKind::Voice,
            _ => MessageKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender: String,
    pub kind: MessageKind,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub(crate) type MessageRow = (MessageId, RoomId, UserId, String, String, String, OffsetDateTime);

impl From<MessageRow> for Message {
    fn from((id, room_id, sender_id, sender, kind, content, created_at): MessageRow) -> Self {
        Message {
            id,
            room_id,
            sender_id,
            sender,
            kind: MessageKind::from_column(&kind),
            content,
            created_at,
        }
    }
}
