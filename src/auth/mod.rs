mod extract;
mod login;
mod password;
mod signup;
mod tokens;

use axum::{routing::post, Router};

use crate::AppState;

pub use extract::AuthUser;
pub use login::{login, LoginRequest};
pub use signup::{signup, SignupRequest};
pub use tokens::Tokens;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: crate::UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<crate::RoomId>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}
