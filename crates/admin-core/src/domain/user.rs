use serde::Serialize;

use super::Status;

/// 로그인 대상 사용자.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: Status,
}
