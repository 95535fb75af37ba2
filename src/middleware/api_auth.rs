use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::db::queries::Account;
use crate::error::AppError;
use crate::state::AppState;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn require_account(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return AppError::Unauthorized.into_response();
    };

    match state.gateway.authorize(token).await {
        Ok(account) => {
            // Downstream handlers read the caller from extensions.
            req.extensions_mut().insert(AuthedAccount(account));
            next.run(req).await
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

#[derive(Clone, Debug)]
pub struct AuthedAccount(pub Account);
