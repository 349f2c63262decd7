//! HTTP 요청 metrics middleware.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};

/// 요청 수, 응답 상태, 처리 시간을 기록합니다.
///
/// path 라벨은 매칭된 라우트 템플릿(`/api/permission/role/{id}`)을 쓰고,
/// 매칭되지 않은 요청만 실제 경로를 정규화합니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = route_label(&request);

    record_http_request(&method, &path);
    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, start.elapsed().as_secs_f64());
    response
}

fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| normalize_path(request.uri().path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware,
        routing::{delete, get},
        Router,
    };
    use tower::ServiceExt;

    async fn echo_label(request: Request) -> String {
        route_label(&request)
    }

    #[tokio::test]
    async fn test_label_uses_route_template() {
        let app = Router::new().nest(
            "/api/permission",
            Router::new().route("/menu/{id}", delete(echo_label)),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/permission/menu/3,4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"/api/permission/menu/{id}");
    }

    #[tokio::test]
    async fn test_unmatched_request_passes_through() {
        let app = Router::new()
            .route("/health", get(|| async { "OK" }))
            .layer(middleware::from_fn(metrics_layer));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/unknown/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
