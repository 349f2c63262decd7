//! RBAC 관리자 백엔드의 세션, 인가, HTTP 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - JWT Access/Refresh 토큰 발급과 슬라이딩 갱신
//! - 공유 캐시 기반 토큰 폐기 목록
//! - casbin 정책 규칙 평가와 메뉴/역할 변경 동기화
//! - Axum 기반 REST API, 헬스 체크, Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰, 세션, 비밀번호, 인증 미들웨어
//! - [`rbac`]: 정책 평가, 규칙 동기화, 메뉴 트리
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어

pub mod auth;
pub mod deadline;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod rbac;
pub mod routes;
pub mod state;

pub use auth::{hash_password, verify_password, Claims, SessionManager, TokenPair};
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use rbac::{MenuService, PermissionSynchronizer, PolicyEnforcer, SyncEvent};
pub use routes::create_api_router;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
