use time::OffsetDateTime;

use crate::{db::{Message, MessageKind, MessageRow}, MessageId, RoomId, UserId};

use super::Store;

impl Store {
    /// Persists a message and hands back its server-assigned id and timestamp.
    /// The insert is the only statement, so a stored message is never reported
    /// as failed.
    pub async fn append_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        sender: &str,
        kind: MessageKind,
        content: &str,
    ) -> sqlx::Result<Message> {
        let created_at = OffsetDateTime::now_utc();
        let (message_id,): (MessageId,) = sqlx::query_as(
            "INSERT INTO messages (room_id,sender_id,kind,content,created_at) VALUES (?,?,?,?,?)
            RETURNING message_id",
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(kind.as_str())
        .bind(content)
        .bind(created_at)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(Message {
            id: message_id,
            room_id,
            sender_id,
            sender: sender.to_owned(),
            kind,
            content: content.to_owned(),
            created_at,
        })
    }

    /// Full history of a room, oldest first.
    pub async fn list_messages(&self, room_id: RoomId) -> sqlx::Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT m.message_id,m.room_id,m.sender_id,u.username,m.kind,m.content,m.created_at
            FROM messages m JOIN users u ON u.user_id=m.sender_id
            WHERE m.room_id=?
            ORDER BY m.message_id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// Returns whether a message was removed. Deleting outside `room_id` is a no-op.
    pub async fn delete_message(&self, room_id: RoomId, message_id: MessageId) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE message_id=? AND room_id=?")
            .bind(message_id)
            .bind(room_id)
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
