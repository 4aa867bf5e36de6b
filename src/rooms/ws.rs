use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::{close_code, CloseFrame, Message, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    auth::AuthUser,
    chat::{ClientEvent, ServerEvent, SessionCoordinator},
    AppState, UserId,
};

/// The token is checked before upgrading, so a refused handshake never
/// reaches the hub.
#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    State(coordinator): State<Arc<SessionCoordinator>>,
    AuthUser(user_id): AuthUser,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| serve(coordinator, user_id, stream).await)
}

async fn serve(coordinator: Arc<SessionCoordinator>, user_id: UserId, stream: WebSocket) {
    let (mut sender, mut receiver) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let mut session = match coordinator.open(user_id, tx).await {
        Ok(session) => session,
        Err(err) => {
            warn!(user_id, error = %err, "closing connection before join");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: err.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let mut write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(event = event.name(), error = %err, "failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientEvent::decode(text.as_str()) {
                    Ok(event) => coordinator.dispatch(&session, event).await,
                    Err(reply) => {
                        debug!(conn_id = %session.conn_id(), "malformed event");
                        session.conn.send(reply);
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut write_task => break,
        }
    }

    coordinator.close(&mut session).await;
    write_task.abort();
}
