//! 토큰 블랙리스트와 갱신 잠금.
//!
//! 공유 캐시에 두 종류의 항목을 보관합니다.
//!
//! - `token:blacklist:{sha256(token)}` : 폐기된 Access Token. TTL은 토큰의 남은 수명.
//! - `token:renewal:{user_id}` : 갱신 중복 방지 잠금. TTL은 기존 토큰의 남은 수명.

use std::sync::Arc;
use std::time::Duration;

use admin_core::AdminResult;
use admin_data::SharedCache;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::deadline::bounded;

const BLACKLIST_PREFIX: &str = "token:blacklist:";
const RENEWAL_PREFIX: &str = "token:renewal:";

/// 토큰 지문 (SHA-256 hex).
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn blacklist_key(token: &str) -> String {
    format!("{BLACKLIST_PREFIX}{}", fingerprint(token))
}

fn renewal_key(user_id: i64) -> String {
    format!("{RENEWAL_PREFIX}{user_id}")
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// 공유 캐시 위의 폐기/갱신 저장소.
#[derive(Clone)]
pub struct RevocationStore {
    cache: Arc<dyn SharedCache>,
    timeout: Duration,
}

impl RevocationStore {
    pub fn new(cache: Arc<dyn SharedCache>, timeout: Duration) -> Self {
        Self { cache, timeout }
    }

    /// 토큰을 블랙리스트에 등록합니다. 이미 등록되어 있으면 TTL만 갱신됩니다.
    pub async fn revoke(&self, token: &str, ttl: Duration) -> AdminResult<()> {
        let key = blacklist_key(token);
        bounded(
            self.timeout,
            "revoke",
            self.cache.set_ex(&key, "1", ttl_secs(ttl)),
        )
        .await?;
        debug!(ttl_secs = ttl_secs(ttl), "Token blacklisted");
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> AdminResult<bool> {
        let key = blacklist_key(token);
        bounded(self.timeout, "is_revoked", self.cache.exists(&key)).await
    }

    /// 사용자의 갱신 잠금을 원자적으로 획득합니다.
    ///
    /// 이미 잠금이 있으면 `false`.
    pub async fn try_claim_renewal(
        &self,
        user_id: i64,
        marker: &str,
        ttl: Duration,
    ) -> AdminResult<bool> {
        let key = renewal_key(user_id);
        bounded(
            self.timeout,
            "try_claim_renewal",
            self.cache.set_nx_ex(&key, marker, ttl_secs(ttl)),
        )
        .await
    }

    /// 갱신 잠금을 해제합니다.
    pub async fn release_renewal(&self, user_id: i64) -> AdminResult<()> {
        let key = renewal_key(user_id);
        bounded(self.timeout, "release_renewal", self.cache.delete(&key)).await?;
        Ok(())
    }
}
