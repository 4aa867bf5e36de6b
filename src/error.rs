use thiserror::Error;

use crate::UserId;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("user {0} has no room assigned")]
    NoRoomAssigned(UserId),
    #[error("invalid room code")]
    InvalidCode,
    #[error("room is full")]
    RoomFull,
    #[error("only the room owner can do that")]
    NotRoomOwner,
    #[error("username taken")]
    UsernameTaken,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
