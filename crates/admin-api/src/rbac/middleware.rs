//! 요청 인가 미들웨어.
//!
//! [`require_auth`](crate::auth::require_auth) 뒤에 위치해야 합니다.

use std::sync::Arc;

use admin_core::AdminError;
use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// 사용자의 활성 역할로 `(경로, 메서드)`를 인가합니다.
pub async fn require_permission(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .ok_or(AdminError::Unauthorized)?;

    // 중첩 라우터에서는 uri 접두사가 잘리므로 원래 경로를 사용
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().as_str().to_string();

    let roles = state.menus.active_role_codes(user.claims.user_id).await?;
    let allowed = state.enforcer.authorize(&roles, &path, &method).await?;
    if !allowed {
        debug!(user_id = user.claims.user_id, %path, %method, "Authorization denied");
        metrics::record_authorization_denied(&method);
        return Err(AdminError::Forbidden.into());
    }

    Ok(next.run(request).await)
}
