//! 헬스 체크 endpoint.
//!
//! `/health`는 프로세스 생존 여부만, `/health/ready`는 의존 서비스까지 확인합니다.
//! 폐기 목록과 갱신 잠금이 캐시에 있으므로 캐시 장애는 준비 실패로 취급합니다.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 의존 서비스 하나의 점검 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Up,
    Down,
    /// 인메모리 백엔드로 동작 중
    NotConfigured,
}

impl DependencyStatus {
    async fn run<F>(configured: bool, check: F) -> Self
    where
        F: std::future::Future<Output = bool>,
    {
        match (configured, configured && check.await) {
            (false, _) => DependencyStatus::NotConfigured,
            (true, true) => DependencyStatus::Up,
            (true, false) => DependencyStatus::Down,
        }
    }
}

/// `/health/ready` 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub version: String,
    pub uptime_secs: i64,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub database: DependencyStatus,
    pub cache: DependencyStatus,
    /// 현재 적재된 정책 규칙 수
    pub policy_rules: usize,
}

/// GET /health
async fn liveness() -> &'static str {
    "OK"
}

/// GET /health/ready
async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadinessReport>) {
    let database =
        DependencyStatus::run(state.db.is_some(), state.is_db_healthy()).await;
    let cache =
        DependencyStatus::run(state.redis.is_some(), state.is_redis_healthy()).await;

    let ready = database != DependencyStatus::Down && cache != DependencyStatus::Down;
    let report = ReadinessReport {
        ready,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        checked_at: chrono::Utc::now(),
        database,
        cache,
        policy_rules: state.enforcer.len().await,
    };

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_readiness_with_memory_backends() {
        use crate::state::create_test_state;

        let (state, _store) = create_test_state().await;
        let app = Router::new()
            .nest("/health", health_router())
            .with_state(Arc::new(state));

        let response = app
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let report: ReadinessReport = serde_json::from_slice(&body).unwrap();
        assert!(report.ready);
        assert_eq!(report.database, DependencyStatus::NotConfigured);
        assert_eq!(report.cache, DependencyStatus::NotConfigured);
        assert_eq!(report.policy_rules, 0);
    }

    #[tokio::test]
    async fn test_dependency_status_outcomes() {
        assert_eq!(
            DependencyStatus::run(false, async { true }).await,
            DependencyStatus::NotConfigured
        );
        assert_eq!(
            DependencyStatus::run(true, async { true }).await,
            DependencyStatus::Up
        );
        assert_eq!(
            DependencyStatus::run(true, async { false }).await,
            DependencyStatus::Down
        );
        assert_eq!(
            serde_json::to_string(&DependencyStatus::NotConfigured).unwrap(),
            "\"not_configured\""
        );
    }
}
