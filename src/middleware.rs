use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use tracing::warn;

use crate::auth::token_digest;
use crate::db::get_owner_by_token_digest;
use crate::error::AppError;
use crate::AppState;

/// The owner a request acts for, resolved from its bearer token.
pub struct Owner(pub String);

impl FromRequestParts<AppState> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            warn!("Request without bearer token");
            return Err(AppError::Unauthorized);
        };

        match get_owner_by_token_digest(&state.db, &token_digest(token))? {
            Some(owner_id) => Ok(Owner(owner_id)),
            None => {
                warn!("Unauthorized API access attempt");
                Err(AppError::Unauthorized)
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
