use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{auth::AuthUser, chat::PairingEngine, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomCodeResponse {
    pub code: Option<String>,
}

/// The owner's join code, `null` once the room is paired.
#[debug_handler(state = AppState)]
pub(crate) async fn room_code(
    State(pairing): State<Arc<PairingEngine>>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<RoomCodeResponse>> {
    Ok(Json(RoomCodeResponse { code: pairing.room_code(user_id).await? }))
}
