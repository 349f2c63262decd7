//! 세션 관리.
//!
//! 토큰 발급, 블랙리스트 검증, 슬라이딩 갱신, 폐기를 담당합니다.
//!
//! # 슬라이딩 갱신
//!
//! Access Token의 남은 수명이 전체 수명의 1/4 미만이면 새 토큰을 발급합니다.
//! 같은 만료 임박 토큰으로 동시에 들어온 요청들 중 하나만 새 토큰을 받도록,
//! 공유 캐시의 원자적 set-if-absent 연산으로 사용자별 갱신 잠금을 획득합니다.
//! 프로세스 내부 뮤텍스는 같은 프로세스의 중복 작업만 줄일 뿐이며,
//! 여러 프로세스 사이의 정확성은 캐시 연산이 보장합니다.

use std::time::Duration;

use admin_core::{AdminError, AdminResult, JwtConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::jwt::{Claims, TokenCodec, TokenKind, TokenPair};
use super::revocation::{fingerprint, RevocationStore};
use crate::metrics;

/// 갱신 결과.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Renewal {
    /// 새로 발급된 Access Token. 갱신이 없었으면 `None`.
    pub token: Option<String>,
}

impl Renewal {
    pub fn renewed(&self) -> bool {
        self.token.is_some()
    }
}

/// 인증 결과.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub claims: Claims,
    pub renewed_token: Option<String>,
}

/// 세션 관리자.
pub struct SessionManager {
    codec: TokenCodec,
    revocation: RevocationStore,
    renew_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(config: &JwtConfig, revocation: RevocationStore) -> Self {
        Self {
            codec: TokenCodec::new(config),
            revocation,
            renew_lock: Mutex::new(()),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Access/Refresh 토큰 쌍을 발급합니다.
    pub fn issue_pair(&self, user_id: i64, username: &str) -> AdminResult<TokenPair> {
        let (access_token, _) = self.codec.issue(TokenKind::Access, user_id, username)?;
        let (refresh_token, _) = self.codec.issue(TokenKind::Refresh, user_id, username)?;
        Ok(TokenPair::bearer(
            access_token,
            refresh_token,
            self.codec.access_ttl().as_secs(),
        ))
    }

    /// 토큰을 검증합니다.
    ///
    /// Access Token은 블랙리스트도 확인합니다.
    pub async fn verify(&self, token: &str, is_refresh: bool) -> AdminResult<Claims> {
        if is_refresh {
            return self.codec.decode(token, TokenKind::Refresh);
        }

        let claims = self.codec.decode(token, TokenKind::Access)?;
        if self.revocation.is_revoked(token).await? {
            return Err(AdminError::Revoked);
        }
        Ok(claims)
    }

    /// Refresh Token으로 새 토큰 쌍을 발급합니다.
    ///
    /// 기존 Refresh Token은 자연 만료 전까지 계속 유효합니다.
    pub async fn refresh(&self, refresh_token: &str) -> AdminResult<TokenPair> {
        let claims = self.verify(refresh_token, true).await?;
        self.issue_pair(claims.user_id, &claims.username)
    }

    /// 만료 임박 토큰을 갱신합니다.
    ///
    /// 잠금 획득에 실패하면 (다른 요청이 이미 갱신함) 아무것도 발급하지 않습니다.
    #[instrument(skip(self, token, claims), fields(user_id = claims.user_id))]
    pub async fn check_and_renew(&self, token: &str, claims: &Claims) -> AdminResult<Renewal> {
        let remaining = claims.remaining_secs();
        let threshold = (self.codec.access_ttl().as_secs() / 4) as i64;
        if remaining >= threshold {
            return Ok(Renewal::default());
        }

        let _guard = self.renew_lock.lock().await;

        let window = Duration::from_secs(remaining.max(1) as u64);
        let claimed = self
            .revocation
            .try_claim_renewal(claims.user_id, &fingerprint(token), window)
            .await?;
        if !claimed {
            debug!("Renewal already granted in this window");
            return Ok(Renewal::default());
        }

        match self
            .codec
            .issue(TokenKind::Access, claims.user_id, &claims.username)
        {
            Ok((new_token, _)) => {
                metrics::record_token_renewal();
                info!(remaining_secs = remaining, "Access token renewed");
                Ok(Renewal {
                    token: Some(new_token),
                })
            }
            Err(err) => {
                if let Err(release_err) = self.revocation.release_renewal(claims.user_id).await {
                    warn!(error = %release_err, "Failed to release renewal claim");
                }
                Err(err)
            }
        }
    }

    /// Access Token을 폐기합니다.
    ///
    /// 이미 만료된 토큰은 아무 작업도 하지 않습니다. 여러 번 호출해도 결과는 같습니다.
    pub async fn revoke(&self, token: &str) -> AdminResult<()> {
        let claims = self.codec.decode_ignoring_expiry(token, TokenKind::Access)?;
        let remaining = claims.remaining_secs();
        if remaining <= 0 {
            debug!(user_id = claims.user_id, "Token already expired, nothing to revoke");
            return Ok(());
        }
        self.revocation
            .revoke(token, Duration::from_secs(remaining as u64))
            .await?;
        info!(user_id = claims.user_id, "Access token revoked");
        Ok(())
    }

    /// Bearer 헤더 값을 인증합니다.
    ///
    /// 토큰 실패 사유는 debug 로그로만 남기고 `Unauthorized`로 합칩니다.
    /// 저장소 장애는 `StoreUnavailable`로 전달됩니다.
    pub async fn authenticate(&self, bearer: &str) -> AdminResult<Authenticated> {
        let token = strip_bearer(bearer);
        if token.is_empty() {
            metrics::record_auth_failure("missing");
            return Err(AdminError::Unauthorized);
        }

        let claims = match self.verify(token, false).await {
            Ok(claims) => claims,
            Err(err) if err.is_token_failure() => {
                debug!(reason = %err, "Authentication failed");
                metrics::record_auth_failure(failure_reason(&err));
                return Err(AdminError::Unauthorized);
            }
            Err(err) => return Err(err),
        };

        let renewal = self.check_and_renew(token, &claims).await?;
        Ok(Authenticated {
            claims,
            renewed_token: renewal.token,
        })
    }
}

/// `Bearer ` 접두사를 제거합니다.
pub fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim()
}

fn failure_reason(err: &AdminError) -> &'static str {
    match err {
        AdminError::Expired => "expired",
        AdminError::Revoked => "revoked",
        _ => "malformed",
    }
}
