//! JWT 토큰 처리.
//!
//! Access Token 및 Refresh Token 생성/검증 로직.
//! 두 종류의 토큰은 서로 다른 비밀 키로 서명되며, `typ` 클레임으로도 구분됩니다.

use std::time::Duration;

use admin_core::{AdminError, AdminResult, JwtConfig};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// 짧은 수명의 접근 토큰
    Access,
    /// 긴 수명의 갱신 토큰
    Refresh,
}

/// JWT 페이로드.
///
/// 발급 후에는 변경되지 않습니다. 갱신 시에는 새 Claims가 만들어집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 ID
    pub user_id: i64,
    /// 사용자 이름
    pub username: String,
    /// Issued At - 토큰 발급 시간 (Unix timestamp)
    pub iat: i64,
    /// Expiration - 토큰 만료 시간 (Unix timestamp)
    pub exp: i64,
    /// 발급자
    pub iss: String,
    /// JWT ID - 토큰 고유 식별자
    pub jti: String,
    /// 토큰 종류
    pub typ: TokenKind,
}

impl Claims {
    /// 남은 수명 (초). 만료되었으면 0 이하.
    pub fn remaining_secs(&self) -> i64 {
        self.exp - Utc::now().timestamp()
    }

    /// 토큰이 만료되었는지 확인.
    pub fn is_expired(&self) -> bool {
        self.remaining_secs() <= 0
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access Token
    pub access_token: String,
    /// Refresh Token
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: u64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// 토큰 인코더/디코더.
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access: KeyPair::from_secret(config.access_secret.expose_secret()),
            refresh: KeyPair::from_secret(config.refresh_secret.expose_secret()),
            access_ttl: Duration::from_secs(config.access_expire_secs),
            refresh_ttl: Duration::from_secs(config.refresh_expire_secs),
            issuer: config.issuer.clone(),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// 새 토큰을 발급합니다.
    pub fn issue(
        &self,
        kind: TokenKind,
        user_id: i64,
        username: &str,
    ) -> AdminResult<(String, Claims)> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: now,
            exp: now + self.ttl(kind).as_secs() as i64,
            iss: self.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            typ: kind,
        };
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    /// Claims를 서명합니다. 비밀 키는 `claims.typ`에 따라 선택됩니다.
    pub fn encode(&self, claims: &Claims) -> AdminResult<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(claims.typ).encoding,
        )
        .map_err(|e| AdminError::Internal(format!("토큰 인코딩 실패: {e}")))
    }

    /// 토큰을 검증하고 Claims를 반환합니다.
    ///
    /// 만료 시 `Expired`, 그 외 실패는 모두 `Malformed`.
    pub fn decode(&self, token: &str, kind: TokenKind) -> AdminResult<Claims> {
        self.decode_with(token, kind, true)
    }

    /// 만료 여부를 무시하고 서명·발급자·종류만 검증합니다.
    pub fn decode_ignoring_expiry(&self, token: &str, kind: TokenKind) -> AdminResult<Claims> {
        self.decode_with(token, kind, false)
    }

    fn decode_with(&self, token: &str, kind: TokenKind, validate_exp: bool) -> AdminResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;

        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AdminError::Expired,
                other => {
                    debug!(?other, "Token decode failed");
                    AdminError::Malformed
                }
            },
        )?;

        if data.claims.typ != kind {
            return Err(AdminError::Malformed);
        }
        Ok(data.claims)
    }
}
