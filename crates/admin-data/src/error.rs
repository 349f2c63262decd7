//! 데이터 모듈 오류 타입.

use admin_core::AdminError;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 고유/참조 제약 위반 (코드 중복, 참조 중인 권한 삭제 등)
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 저장된 값이 도메인 규칙을 만족하지 않음
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 테스트용 주입 장애
    #[error("Injected failure: {0}")]
    InjectedFailure(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::Timeout("connection pool".to_string()),
            // 23505: unique_violation, 23503: foreign_key_violation
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") | Some("23503") => {
                    DataError::Constraint(db_err.message().to_string())
                }
                _ => DataError::QueryError(db_err.message().to_string()),
            },
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else {
            DataError::CacheError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<AdminError> for DataError {
    fn from(err: AdminError) -> Self {
        DataError::InvalidData(err.to_string())
    }
}

impl From<DataError> for AdminError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Constraint(msg) => AdminError::Conflict(msg),
            DataError::NotFound(msg) => AdminError::NotFound(msg),
            DataError::InvalidData(msg) => AdminError::Internal(msg),
            other => AdminError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
