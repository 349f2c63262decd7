//! 관리자 계정 비밀번호.
//!
//! 해시는 Argon2id PHC 문자열로 저장되며 솔트가 포함됩니다.
//! 검증은 CPU를 많이 쓰므로 요청 경로에서는 blocking 스레드에서 호출합니다.

use admin_core::AdminError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패: {0}")]
    HashingFailed(String),
    /// 저장된 해시가 PHC 형식이 아님
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("비밀번호 불일치")]
    VerificationFailed,
}

impl From<PasswordError> for AdminError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::VerificationFailed => AdminError::Unauthorized,
            other => AdminError::Internal(other.to_string()),
        }
    }
}

/// 새 솔트로 비밀번호를 해싱합니다.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// 저장된 해시와 비교합니다.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| PasswordError::InvalidHashFormat)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// 비밀번호 정책.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_letter: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_letter: true,
        }
    }
}

impl PasswordPolicy {
    /// 정책 위반 사유를 모두 모아 `InvalidInput`으로 반환합니다.
    pub fn check(&self, password: &str) -> Result<(), AdminError> {
        let mut violations = Vec::new();
        if password.chars().count() < self.min_length {
            violations.push(format!("최소 {}자 이상", self.min_length));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("숫자 포함".to_string());
        }
        if self.require_letter && !password.chars().any(char::is_alphabetic) {
            violations.push("문자 포함".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AdminError::InvalidInput(format!(
                "비밀번호 정책 위반: {}",
                violations.join(", ")
            )))
        }
    }
}
