//! 인증.
//!
//! JWT 기반 세션 관리를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`TokenCodec`]: 토큰 발급/검증
//! - [`RevocationStore`]: 공유 캐시 위의 블랙리스트와 갱신 잠금
//! - [`SessionManager`]: 검증, 슬라이딩 갱신, 폐기
//! - [`require_auth`]: Axum 인증 미들웨어

mod jwt;
mod middleware;
mod password;
mod revocation;
mod session;

pub use jwt::{Claims, TokenCodec, TokenKind, TokenPair};
pub use middleware::{require_auth, CurrentUser, NEW_ACCESS_TOKEN_HEADER};
pub use password::{hash_password, verify_password, PasswordError, PasswordPolicy};
pub use revocation::{fingerprint, RevocationStore};
pub use session::{strip_bearer, Authenticated, Renewal, SessionManager};
