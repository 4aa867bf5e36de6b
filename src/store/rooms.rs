use crate::{db::{Room, RoomRow}, RoomId, UserId};

use super::Store;

impl Store {
    pub async fn find_room_by_user(&self, user_id: UserId) -> sqlx::Result<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT room_id,user_a_id,user_b_id,code,locked FROM rooms WHERE user_a_id=? OR user_b_id=?",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(Room::from))
    }

    /// Oldest room whose second slot is still open and that was not created by `excluding`.
    pub async fn find_open_room(&self, excluding: UserId) -> sqlx::Result<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT room_id,user_a_id,user_b_id,code,locked FROM rooms
            WHERE user_b_id IS NULL AND user_a_id!=?
            ORDER BY room_id ASC LIMIT 1",
        )
        .bind(excluding)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(Room::from))
    }

    pub async fn find_room_by_code(&self, code: &str) -> sqlx::Result<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT room_id,user_a_id,user_b_id,code,locked FROM rooms WHERE code=? AND user_b_id IS NULL",
        )
        .bind(code)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(Room::from))
    }

    pub async fn code_exists(&self, code: &str) -> sqlx::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE code=?")
            .bind(code)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.is_some())
    }

    /// Returns `None` when `code` collided with a code inserted since it was
    /// checked; the caller draws again.
    pub async fn create_room(&self, owner: UserId, code: &str) -> sqlx::Result<Option<Room>> {
        let result = sqlx::query_as::<_, RoomRow>(
            "INSERT INTO rooms (user_a_id,code,locked) VALUES (?,?,0)
            RETURNING room_id,user_a_id,user_b_id,code,locked",
        )
        .bind(owner)
        .bind(code)
        .fetch_one(&self.db_pool)
        .await;

        match result {
            Ok(row) => Ok(Some(Room::from(row))),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Compare-and-set on the empty second slot. Filling the slot locks the
    /// room and retires its join code. `None` means the slot was already
    /// taken (or the room belongs to `user_id` already).
    pub async fn fill_slot_b(&self, room_id: RoomId, user_id: UserId) -> sqlx::Result<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(
            "UPDATE rooms SET user_b_id=?, code=NULL, locked=1
            WHERE room_id=? AND user_b_id IS NULL AND user_a_id!=?
            RETURNING room_id,user_a_id,user_b_id,code,locked",
        )
        .bind(user_id)
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(Room::from))
    }

    /// Sets a code on a room that is still waiting for its second member.
    pub async fn set_room_code(&self, room_id: RoomId, code: &str) -> sqlx::Result<Option<Room>> {
        let result = sqlx::query_as::<_, RoomRow>(
            "UPDATE rooms SET code=? WHERE room_id=? AND user_b_id IS NULL
            RETURNING room_id,user_a_id,user_b_id,code,locked",
        )
        .bind(code)
        .bind(room_id)
        .fetch_optional(&self.db_pool)
        .await;

        match result {
            Ok(row) => Ok(row.map(Room::from)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(err),
        }
    }
}
