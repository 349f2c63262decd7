//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 인증/인가 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("permission_sync_duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증/인가 메트릭 헬퍼 함수
// ============================================================================

/// 인증 실패 카운터 증가.
pub fn record_auth_failure(reason: &'static str) {
    counter!("auth_failures_total", "reason" => reason).increment(1);
}

/// 토큰 갱신 카운터 증가.
pub fn record_token_renewal() {
    counter!("auth_token_renewals_total").increment(1);
}

/// 인가 거부 카운터 증가.
pub fn record_authorization_denied(method: &str) {
    counter!("authz_denied_total", "method" => method.to_string()).increment(1);
}

/// 권한 동기화 결과 기록.
pub fn record_sync(event: &'static str, success: bool, elapsed: Duration) {
    let outcome = if success { "ok" } else { "error" };
    counter!("permission_sync_total", "event" => event, "outcome" => outcome).increment(1);
    histogram!("permission_sync_duration_seconds", "event" => event).record(elapsed.as_secs_f64());
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/api/permission/menu/3,4,5` → `/api/permission/menu/:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_id_list = !segment.is_empty()
                && segment
                    .split(',')
                    .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
            if is_id_list {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/permission/role/12"), "/api/permission/role/:id");
        assert_eq!(
            normalize_path("/api/permission/role/12/menus"),
            "/api/permission/role/:id/menus"
        );
    }

    #[test]
    fn test_normalize_path_id_list() {
        assert_eq!(normalize_path("/api/permission/menu/3,4,5"), "/api/permission/menu/:id");
        assert_eq!(normalize_path("/api/permission/menu/3,,5"), "/api/permission/menu/3,,5");
    }

    #[test]
    fn test_normalize_path_no_params() {
        assert_eq!(normalize_path("/api/permission/menu/tree"), "/api/permission/menu/tree");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_helpers_without_recorder() {
        record_auth_failure("expired");
        record_token_renewal();
        record_authorization_denied("GET");
        record_sync("menu_updated", true, Duration::from_millis(3));
    }
}
