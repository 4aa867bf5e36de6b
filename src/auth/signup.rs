use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{info, warn};

use super::{password::hash_password, AuthResponse};
use crate::{AppResult, AppState, ChatError};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub room_code: Option<String>,
}

/// Creates the account and places it in a room. A rejected room code
/// rolls the account back.
#[debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(SignupRequest { username, password, room_code }): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ChatError::BadRequest("Missing fields").into());
    }

    let password_hash = hash_password(&password)?;
    let Some(user_id) = state.store.create_user(username, &password_hash).await? else {
        return Err(ChatError::UsernameTaken.into());
    };

    let room = match state.pairing.assign(user_id, room_code.as_deref()).await {
        Ok(room) => room,
        Err(err) => {
            warn!(user_id, error = %err, "pairing failed, removing account");
            state.store.delete_user(user_id).await?;
            return Err(err.into());
        }
    };

    info!(user_id, room_id = room.room_id, "signed up");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: state.tokens.issue(user_id)?,
            user_id,
            username: username.to_owned(),
            room_id: Some(room.room_id),
        }),
    ))
}
