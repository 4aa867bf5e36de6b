use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;

use crate::{chat::SessionCoordinator, AppError, UserId};

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// A verified identity, taken from `Authorization: Bearer` or `?token=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<SessionCoordinator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);
        let token = match bearer {
            Some(token) => Some(token),
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.token),
        };

        let coordinator = Arc::<SessionCoordinator>::from_ref(state);
        Ok(AuthUser(coordinator.authenticate(token.as_deref())?))
    }
}
