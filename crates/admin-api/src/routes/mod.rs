//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/auth` - 로그인, 토큰 갱신 (인증 불필요), 로그아웃
//! - `/api/profile` - 현재 사용자 정보와 메뉴 트리 (인증 필요)
//! - `/api/permission` - 메뉴/역할 관리 (인증 + 정책 인가 필요)

pub mod auth;
pub mod health;
pub mod permission;
pub mod profile;

pub use auth::{auth_router, LoginRequest, RefreshRequest};
pub use health::{health_router, DependencyStatus, ReadinessReport};
pub use permission::{permission_router, AssignMenusRequest, RoleMenusResponse};
pub use profile::{profile_router, ProfileResponse};

use axum::{middleware, routing::post, Router};
use std::sync::Arc;

use crate::auth::require_auth;
use crate::rbac::require_permission;
use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 미들웨어가 상태를 참조하므로 `state`를 받습니다. 반환된 라우터에는
/// 호출 측에서 `with_state`를 적용합니다.
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // route_layer 순서: 나중에 추가한 layer가 먼저 실행됨
    let protected = Router::new()
        .nest("/api/permission", permission_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_permission));

    let authenticated = Router::new()
        .merge(protected)
        .nest("/api/profile", profile_router())
        .route("/api/auth/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .nest("/health", health_router())
        .nest("/api/auth", auth_router())
        .merge(authenticated)
}
