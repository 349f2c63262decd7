//! 세션 관리 통합 테스트.
//!
//! 동시 갱신, 프로세스 간 캐시 공유, 저장소 장애 시 동작을 검증합니다.

use std::sync::Arc;
use std::time::Duration;

use admin_api::auth::{Claims, RevocationStore, SessionManager, TokenKind};
use admin_core::{AdminError, JwtConfig, DEFAULT_ISSUER};
use admin_data::MemoryCache;
use chrono::Utc;

fn jwt_config() -> JwtConfig {
    JwtConfig::new("integration-access-secret", "integration-refresh-secret")
        .with_expiry(3600, 86400)
}

fn manager_on(cache: Arc<MemoryCache>, timeout: Duration) -> SessionManager {
    SessionManager::new(&jwt_config(), RevocationStore::new(cache, timeout))
}

/// 남은 수명이 `remaining`초인 Access Token.
fn near_expiry_token(manager: &SessionManager, user_id: i64, remaining: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id,
        username: format!("user{user_id}"),
        iat: now - 3600 + remaining,
        exp: now + remaining,
        iss: DEFAULT_ISSUER.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        typ: TokenKind::Access,
    };
    manager.codec().encode(&claims).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_renew_exactly_once() {
    let cache = Arc::new(MemoryCache::new());
    let manager = Arc::new(manager_on(cache, Duration::from_secs(1)));
    let bearer = format!("Bearer {}", near_expiry_token(&manager, 7, 120));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let manager = manager.clone();
            let bearer = bearer.clone();
            tokio::spawn(async move { manager.authenticate(&bearer).await })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    let mut renewed = 0;
    for result in results {
        let auth = result.unwrap().unwrap();
        assert_eq!(auth.claims.user_id, 7);
        if auth.renewed_token.is_some() {
            renewed += 1;
        }
    }
    assert_eq!(renewed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn renewal_is_exclusive_across_processes() {
    // 같은 캐시를 공유하는 두 인스턴스는 각자의 뮤텍스를 가짐
    let cache = Arc::new(MemoryCache::new());
    let first = Arc::new(manager_on(cache.clone(), Duration::from_secs(1)));
    let second = Arc::new(manager_on(cache, Duration::from_secs(1)));
    let bearer = format!("Bearer {}", near_expiry_token(&first, 11, 120));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let manager = if i % 2 == 0 { first.clone() } else { second.clone() };
            let bearer = bearer.clone();
            tokio::spawn(async move { manager.authenticate(&bearer).await })
        })
        .collect();

    let renewed = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|auth| auth.renewed_token.is_some())
        .count();
    assert_eq!(renewed, 1);
}

#[tokio::test]
async fn renewed_token_is_a_fresh_access_token() {
    let cache = Arc::new(MemoryCache::new());
    let manager = manager_on(cache, Duration::from_secs(1));
    let bearer = format!("Bearer {}", near_expiry_token(&manager, 3, 60));

    let auth = manager.authenticate(&bearer).await.unwrap();
    let renewed = auth.renewed_token.unwrap();

    let claims = manager.verify(&renewed, false).await.unwrap();
    assert_eq!(claims.user_id, 3);
    assert_eq!(claims.typ, TokenKind::Access);
    assert!(claims.remaining_secs() > 3500);

    // 새 토큰으로는 갱신이 일어나지 않음
    let again = manager
        .authenticate(&format!("Bearer {renewed}"))
        .await
        .unwrap();
    assert!(again.renewed_token.is_none());
}

#[tokio::test]
async fn revocation_is_visible_to_other_processes() {
    let cache = Arc::new(MemoryCache::new());
    let first = manager_on(cache.clone(), Duration::from_secs(1));
    let second = manager_on(cache.clone(), Duration::from_secs(1));

    let pair = first.issue_pair(21, "carol").unwrap();
    first.revoke(&pair.access_token).await.unwrap();

    assert_eq!(
        second.verify(&pair.access_token, false).await,
        Err(AdminError::Revoked)
    );
    assert_eq!(
        second
            .authenticate(&format!("Bearer {}", pair.access_token))
            .await
            .unwrap_err(),
        AdminError::Unauthorized
    );

    let key = format!(
        "token:blacklist:{}",
        admin_api::auth::fingerprint(&pair.access_token)
    );
    let ttl = cache.ttl_of(&key).unwrap();
    assert!(ttl <= Duration::from_secs(3600));
    assert!(ttl > Duration::from_secs(3590));
}

#[tokio::test]
async fn refresh_token_is_not_accepted_as_access_token() {
    let cache = Arc::new(MemoryCache::new());
    let manager = manager_on(cache, Duration::from_secs(1));
    let pair = manager.issue_pair(4, "dave").unwrap();

    assert!(manager.verify(&pair.refresh_token, false).await.is_err());
    assert!(manager.verify(&pair.access_token, true).await.is_err());

    let refreshed = manager.refresh(&pair.refresh_token).await.unwrap();
    assert_eq!(
        manager
            .verify(&refreshed.access_token, false)
            .await
            .unwrap()
            .user_id,
        4
    );
}

#[tokio::test]
async fn cache_outage_is_not_reported_as_unauthorized() {
    let cache = Arc::new(MemoryCache::new());
    let manager = manager_on(cache.clone(), Duration::from_secs(1));
    let pair = manager.issue_pair(5, "erin").unwrap();

    cache.set_unavailable(true);
    let err = manager
        .authenticate(&format!("Bearer {}", pair.access_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::StoreUnavailable(_)));

    cache.set_unavailable(false);
    assert!(manager
        .authenticate(&format!("Bearer {}", pair.access_token))
        .await
        .is_ok());
}

#[tokio::test]
async fn slow_cache_is_bounded_by_timeout() {
    let cache = Arc::new(MemoryCache::new());
    let manager = manager_on(cache.clone(), Duration::from_millis(50));
    let pair = manager.issue_pair(6, "frank").unwrap();

    cache.set_latency(Duration::from_millis(500));
    let err = manager
        .verify(&pair.access_token, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::StoreUnavailable(_)));
}
