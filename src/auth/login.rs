use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use tracing::info;

use super::{password::verify_password, AuthResponse};
use crate::{AppResult, AppState, ChatError};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(LoginRequest { username, password }): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ChatError::BadRequest("Missing fields").into());
    }

    let Some(account) = state.store.find_account(username).await? else {
        return Err(ChatError::AuthFailure("User not found".to_owned()).into());
    };
    if !verify_password(&password, &account.password_hash) {
        return Err(ChatError::AuthFailure("Wrong password".to_owned()).into());
    }

    info!(user_id = account.user_id, "logged in");
    Ok(Json(AuthResponse {
        token: state.tokens.issue(account.user_id)?,
        user_id: account.user_id,
        username: account.username,
        room_id: None,
    }))
}
