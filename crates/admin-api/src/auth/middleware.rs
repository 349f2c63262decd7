//! Axum용 인증 미들웨어.
//!
//! Bearer 토큰을 검증하고, 갱신된 토큰이 있으면 `New-Access-Token`
//! 응답 헤더로 전달합니다. 인증된 사용자 정보는 요청 extension에
//! [`CurrentUser`]로 저장됩니다.

use std::sync::Arc;

use admin_core::AdminError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::jwt::Claims;
use super::session::strip_bearer;
use crate::error::ApiError;
use crate::state::AppState;

/// 갱신된 Access Token 응답 헤더.
pub const NEW_ACCESS_TOKEN_HEADER: &str = "New-Access-Token";

/// 인증된 사용자.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn handler(CurrentUser { claims, .. }: CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}!", claims.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
    /// 요청에 사용된 Access Token
    pub token: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError(AdminError::Unauthorized))
    }
}

/// 인증 미들웨어.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let auth = state.session.authenticate(&header).await?;
    request.extensions_mut().insert(CurrentUser {
        claims: auth.claims,
        token: strip_bearer(&header).to_string(),
    });

    let mut response = next.run(request).await;
    if let Some(token) = auth.renewed_token {
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                response.headers_mut().insert(NEW_ACCESS_TOKEN_HEADER, value);
            }
            Err(e) => warn!(error = %e, "Renewed token is not a valid header value"),
        }
    }
    Ok(response)
}
