//! 로그인, 토큰 갱신, 로그아웃 endpoint.

use std::sync::Arc;

use admin_core::AdminError;
use admin_data::IdentityStore;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{verify_password, CurrentUser, TokenPair};
use crate::deadline::bounded;
use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// 로그인 요청.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 토큰 갱신 요청.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// 로그인.
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let user = bounded(
        state.store_timeout,
        "find_user_by_username",
        state.store.find_user_by_username(&req.username),
    )
    .await?;

    let Some(user) = user.filter(|u| u.status.is_enabled()) else {
        debug!(username = %req.username, "Unknown or disabled user");
        metrics::record_auth_failure("login");
        return Err(AdminError::Unauthorized.into());
    };

    // Argon2 검증은 CPU 작업이므로 blocking 스레드에서 수행
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&req.password, &hash))
        .await
        .map_err(|e| AdminError::Internal(format!("password task failed: {e}")))?;
    if let Err(err) = verified {
        metrics::record_auth_failure("login");
        return Err(AdminError::from(err).into());
    }

    let pair = state.session.issue_pair(user.id, &user.username)?;
    info!(user_id = user.id, "User logged in");
    Ok(Json(pair))
}

/// 토큰 갱신.
///
/// POST /api/auth/refresh-token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state
        .session
        .refresh(&req.refresh_token)
        .await
        .map_err(AdminError::public)?;
    Ok(Json(pair))
}

/// 로그아웃. 현재 Access Token을 폐기합니다.
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<StatusCode> {
    state.session.revoke(&user.token).await?;
    info!(user_id = user.claims.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// 인증 없이 접근 가능한 라우터.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
}
