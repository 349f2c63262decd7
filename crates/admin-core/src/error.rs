//! 권한/세션 서브시스템의 에러 타입.
//!
//! 토큰 실패 사유(Malformed/Expired/Revoked)는 내부 구분용이며,
//! 외부로는 [`AdminError::public`]을 통해 `Unauthorized`로 합쳐져 노출됩니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// 서명 불일치, 구조 오류, 발급자/종류 불일치
    #[error("잘못된 토큰")]
    Malformed,

    /// 만료된 토큰
    #[error("만료된 토큰")]
    Expired,

    /// 블랙리스트에 등록된 토큰
    #[error("폐기된 토큰")]
    Revoked,

    /// 인증 실패 (외부 노출용)
    #[error("인증되지 않음")]
    Unauthorized,

    /// 권한 없음
    #[error("권한 없음")]
    Forbidden,

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 사용 중이거나 중복된 리소스
    #[error("충돌: {0}")]
    Conflict(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 공유 캐시 또는 관계형 저장소에 접근 불가 (타임아웃 포함)
    #[error("저장소 사용 불가: {0}")]
    StoreUnavailable(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 권한/세션 작업을 위한 Result 타입.
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdminError::StoreUnavailable(_))
    }

    /// 토큰 검증 실패인지 확인합니다.
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AdminError::Malformed
                | AdminError::Expired
                | AdminError::Revoked
                | AdminError::Unauthorized
        )
    }

    /// 외부 노출용 에러로 변환합니다.
    ///
    /// 토큰 실패 사유는 모두 `Unauthorized`로 합쳐집니다.
    pub fn public(self) -> Self {
        if self.is_token_failure() {
            AdminError::Unauthorized
        } else {
            self
        }
    }

    /// 에러 코드 문자열.
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::Malformed
            | AdminError::Expired
            | AdminError::Revoked
            | AdminError::Unauthorized => "UNAUTHORIZED",
            AdminError::Forbidden => "FORBIDDEN",
            AdminError::NotFound(_) => "NOT_FOUND",
            AdminError::Conflict(_) => "CONFLICT",
            AdminError::InvalidInput(_) => "INVALID_INPUT",
            AdminError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AdminError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        AdminError::Internal(err.to_string())
    }
}
