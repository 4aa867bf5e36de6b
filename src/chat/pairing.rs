use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{db::Room, store::Store, ChatError, ChatResult, UserId};

/// Puts every new account into exactly one room, never more than two per room.
pub struct PairingEngine {
    store: Store,
    code_digits: u32,
    // serialises auto-pairing and the draw-check-insert of join codes
    codegen: Mutex<()>,
}

impl PairingEngine {
    pub fn new(store: Store, code_digits: u32) -> PairingEngine {
        PairingEngine { store, code_digits, codegen: Mutex::new(()) }
    }

    /// Auto-pairs when `code` is `None`, otherwise redeems the code.
    pub async fn assign(&self, user_id: UserId, code: Option<&str>) -> ChatResult<Room> {
        match code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => self.redeem(user_id, code).await,
            None => self.auto_pair(user_id).await,
        }
    }

    /// Fills the oldest open room created by someone else, or opens a new one.
    ///
    /// Look-up and room creation happen under `codegen`, so two concurrent
    /// auto-pairs never both miss each other and open separate rooms.
    pub async fn auto_pair(&self, user_id: UserId) -> ChatResult<Room> {
        let _codegen = self.codegen.lock().await;
        loop {
            let Some(open) = self.store.find_open_room(user_id).await? else {
                return self.open_room(user_id).await;
            };

            match self.store.fill_slot_b(open.room_id, user_id).await? {
                Some(room) => {
                    info!(user_id, room_id = room.room_id, "paired into open room");
                    return Ok(room);
                }
                // a code redemption won this slot, look again
                None => debug!(user_id, room_id = open.room_id, "open room filled concurrently"),
            }
        }
    }

    pub async fn redeem(&self, user_id: UserId, code: &str) -> ChatResult<Room> {
        let room = self
            .store
            .find_room_by_code(code)
            .await?
            .ok_or(ChatError::InvalidCode)?;

        let room = self
            .store
            .fill_slot_b(room.room_id, user_id)
            .await?
            .ok_or(ChatError::InvalidCode)?;

        info!(user_id, room_id = room.room_id, "redeemed room code");
        Ok(room)
    }

    /// Callers hold `codegen`.
    async fn open_room(&self, owner: UserId) -> ChatResult<Room> {
        loop {
            let code = self.fresh_code().await?;
            if let Some(room) = self.store.create_room(owner, &code).await? {
                info!(user_id = owner, room_id = room.room_id, "opened room");
                return Ok(room);
            }
        }
    }

    /// Draws codes until one is unused. Callers hold `codegen`.
    async fn fresh_code(&self) -> ChatResult<String> {
        loop {
            let code = draw_code(self.code_digits);
            if !self.store.code_exists(&code).await? {
                return Ok(code);
            }
            debug!(code, "room code collision");
        }
    }

    /// The owner's view of their join code.
    ///
    /// Only slot A may ask. A paired room has no code; an open room keeps the
    /// code it has, or is given one.
    pub async fn room_code(&self, user_id: UserId) -> ChatResult<Option<String>> {
        let room = self
            .store
            .find_room_by_user(user_id)
            .await?
            .ok_or(ChatError::NoRoomAssigned(user_id))?;

        if room.user_a != user_id {
            return Err(ChatError::NotRoomOwner);
        }
        if room.is_paired() {
            return Ok(None);
        }
        if room.code.is_some() {
            return Ok(room.code);
        }

        let _codegen = self.codegen.lock().await;
        loop {
            let code = self.fresh_code().await?;
            match self.store.set_room_code(room.room_id, &code).await? {
                Some(room) => return Ok(room.code),
                // either the code collided or the room got paired meanwhile
                None => {
                    let current = self.store.find_room_by_user(user_id).await?;
                    if current.is_none_or(|room| room.is_paired()) {
                        return Ok(None);
                    }
                }
            }
        }
    }
}

fn draw_code(digits: u32) -> String {
    let upper = 10u32.pow(digits);
    let n = rand::rng().random_range(0..upper);
    format!("{n:0width$}", width = digits as usize)
}
