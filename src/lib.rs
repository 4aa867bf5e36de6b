pub mod appresult;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod rooms;
pub mod store;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use error::{ChatError, ChatResult, ConfigError};

use auth::Tokens;
use chat::{PairingEngine, SessionCoordinator};
use store::Store;

pub type UserId = i64;
pub type RoomId = i64;
pub type MessageId = i64;
pub type ConnId = Uuid;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Store,
    pub tokens: Tokens,
    pub pairing: Arc<PairingEngine>,
    pub coordinator: Arc<SessionCoordinator>,
}

impl AppState {
    pub fn new(store: Store, tokens: Tokens, room_code_digits: u32) -> AppState {
        AppState {
            pairing: Arc::new(PairingEngine::new(store.clone(), room_code_digits)),
            coordinator: Arc::new(SessionCoordinator::new(store.clone(), tokens.clone())),
            store,
            tokens,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(rooms::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header::AUTHORIZATION, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::rooms::RoomCodeResponse;

    async fn state() -> AppState {
        let store = Store::open_in_memory().await.unwrap();
        AppState::new(store, Tokens::new(b"secret", time::Duration::hours(1)), 4)
    }

    #[tokio::test]
    async fn ws_without_token_is_unauthorized() {
        let app = router(state().await);
        let response = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn owner_reads_code_over_http() {
        let state = state().await;
        let alice = state.store.create_user("alice", "h").await.unwrap().unwrap();
        let room = state.pairing.assign(alice, None).await.unwrap();
        let token = state.tokens.issue(alice).unwrap();

        let response = router(state)
            .oneshot(
                Request::get("/room/code")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: RoomCodeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.code, room.code);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let state = state().await;
        let alice = state.store.create_user("alice", "h").await.unwrap().unwrap();
        let bob = state.store.create_user("bob", "h").await.unwrap().unwrap();
        state.pairing.assign(alice, None).await.unwrap();
        state.pairing.assign(bob, None).await.unwrap();
        let token = state.tokens.issue(bob).unwrap();

        let response = router(state)
            .oneshot(
                Request::get(format!("/room/code?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn signup_with_bad_code_leaves_no_account() {
        let state = state().await;
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(post_json(
                "/signup",
                serde_json::json!({"username": "bob", "password": "pw", "room_code": "0000"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.store.find_account("bob").await.unwrap().is_none());

        let response = app
            .oneshot(post_json("/signup", serde_json::json!({"username": "bob", "password": "pw"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: auth::AuthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(state.tokens.verify(&body.token).unwrap(), body.user_id);
        assert!(body.room_id.is_some());
    }

    #[tokio::test]
    async fn login_checks_password() {
        let state = state().await;
        let app = router(state.clone());
        let response = app
            .clone()
            .oneshot(post_json("/signup", serde_json::json!({"username": "Alice", "password": "pw"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json("/signup", serde_json::json!({"username": "alice", "password": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_json("/login", serde_json::json!({"username": "alice", "password": "nope"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_json("/login", serde_json::json!({"username": "alice", "password": "pw"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: auth::AuthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.username, "Alice");
    }

    #[tokio::test]
    async fn signup_requires_fields() {
        let response = router(state().await)
            .oneshot(
                Request::post("/signup")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"username":" ","password":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
