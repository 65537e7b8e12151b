//! Registration, login and logout.

use std::sync::Arc;

use auth::{Registration, Session};
use axum::Json;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use store::{ShopStore, User};

use crate::error::ApiError;
use crate::extract::{ApiJson, check_api_key, clear_session_cookie, session_cookie};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Either `email` or `username` identifies the account.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

fn session_response<S: ShopStore>(
    state: &AppState<S>,
    status: StatusCode,
    session: Session,
) -> Response {
    let cookie = session_cookie(
        &session.token.token,
        state.authenticator.signer().ttl_seconds(),
    );
    (
        status,
        [(SET_COOKIE, cookie)],
        Json(SessionResponse {
            user: session.user,
            token: session.token.token,
        }),
    )
        .into_response()
}

/// POST /register
pub async fn register<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    check_api_key(state.api_key.as_deref(), &headers)?;

    let session = state
        .accounts
        .register(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(session_response(&state, StatusCode::CREATED, session))
}

/// POST /login
pub async fn login<S: ShopStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    check_api_key(state.api_key.as_deref(), &headers)?;

    let identifier = req
        .email
        .or(req.username)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("email or username is required".to_string()))?;

    let session = state.accounts.login(&identifier, &req.password).await?;

    Ok(session_response(&state, StatusCode::OK, session))
}

/// POST /logout — clears the session cookie. Tokens are not revoked.
pub async fn logout() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(SET_COOKIE, clear_session_cookie())])
}
