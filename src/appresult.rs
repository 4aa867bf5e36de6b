use axum::{http::StatusCode, response::{IntoResponse, Response}};
use tracing::error;

use crate::ChatError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<ChatError>() {
            Some(ChatError::AuthFailure(_)) => StatusCode::UNAUTHORIZED,
            Some(ChatError::NotRoomOwner) => StatusCode::FORBIDDEN,
            Some(ChatError::InvalidCode) => StatusCode::NOT_FOUND,
            Some(ChatError::RoomFull | ChatError::UsernameTaken) => StatusCode::CONFLICT,
            Some(ChatError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            Some(ChatError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(ChatError::NoRoomAssigned(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            None if self.0.is::<sqlx::Error>() => StatusCode::SERVICE_UNAVAILABLE,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            (status, format!("{}\n\n{}", self.0, self.0.backtrace())).into_response()
        } else {
            (status, self.0.to_string()).into_response()
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
