//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
//! 토큰 실패 사유(잘못된 형식, 만료, 폐기)는 외부에 구분되어 노출되지 않습니다.

use admin_core::AdminError;
use admin_data::DataError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "CONFLICT",
///   "message": "충돌: 하위 메뉴가 존재합니다",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "UNAUTHORIZED", "CONFLICT", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러.
///
/// [`AdminError`]를 HTTP 응답으로 변환합니다.
#[derive(Debug)]
pub struct ApiError(pub AdminError);

impl ApiError {
    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AdminError::Malformed
            | AdminError::Expired
            | AdminError::Revoked
            | AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::Forbidden => StatusCode::FORBIDDEN,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Conflict(_) => StatusCode::CONFLICT,
            AdminError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AdminError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 외부 노출용 응답 본문.
    pub fn body(&self) -> ApiErrorResponse {
        let public = self.0.clone().public();
        let message = match &public {
            AdminError::StoreUnavailable(_) => "서비스를 일시적으로 사용할 수 없습니다".to_string(),
            AdminError::Internal(_) => "내부 서버 오류".to_string(),
            other => other.to_string(),
        };
        ApiErrorResponse::new(public.code(), message)
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        ApiError(err)
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

/// 핸들러 Result 타입.
pub type ApiResult<T> = Result<T, ApiError>;
