mod code;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use code::RoomCodeResponse;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/room/code", get(code::room_code))
        .route("/ws", get(ws::room_ws))
}
