//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use std::sync::Arc;
use std::time::Duration;

use admin_core::{AdminResult, JwtConfig, SessionConfig};
use admin_data::{AdminStore, Database, RedisCache, SharedCache};
use chrono::{DateTime, Utc};

use crate::auth::{RevocationStore, SessionManager};
use crate::rbac::{MenuService, PermissionSynchronizer, PolicyEnforcer};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 토큰 발급/검증/갱신/폐기
    pub session: Arc<SessionManager>,

    /// 정책 규칙 평가
    pub enforcer: Arc<PolicyEnforcer>,

    /// 메뉴/역할 변경과 규칙 동기화
    pub synchronizer: PermissionSynchronizer,

    /// 메뉴 트리 조회
    pub menus: MenuService,

    /// 역할·권한 저장소
    pub store: Arc<dyn AdminStore>,

    /// 저장소 호출 제한 시간
    pub store_timeout: Duration,

    /// 데이터베이스 (PostgreSQL 사용 시)
    pub db: Option<Database>,

    /// Redis 캐시 (Redis 사용 시)
    pub redis: Option<RedisCache>,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 저장소와 공유 캐시로 상태를 구성합니다.
    ///
    /// 정책 규칙은 비어 있으며, [`PermissionSynchronizer::rebuild`]로 채웁니다.
    pub async fn new(
        jwt: &JwtConfig,
        session: &SessionConfig,
        store: Arc<dyn AdminStore>,
        cache: Arc<dyn SharedCache>,
    ) -> AdminResult<Self> {
        let store_timeout = session.store_timeout();
        let revocation = RevocationStore::new(cache, store_timeout);
        let enforcer = Arc::new(PolicyEnforcer::new().await?);

        Ok(Self {
            session: Arc::new(SessionManager::new(jwt, revocation)),
            synchronizer: PermissionSynchronizer::new(
                store.clone(),
                enforcer.clone(),
                store_timeout,
            ),
            menus: MenuService::new(store.clone(), store_timeout),
            enforcer,
            store,
            store_timeout,
            db: None,
            redis: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// 데이터베이스 설정 (헬스 체크용).
    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Redis 설정 (헬스 체크용).
    pub fn with_redis(mut self, redis: RedisCache) -> Self {
        self.redis = Some(redis);
        self
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db {
            Some(db) => db.health_check().await.unwrap_or(false),
            None => false,
        }
    }

    /// Redis 캐시 연결 상태 확인.
    pub async fn is_redis_healthy(&self) -> bool {
        match &self.redis {
            Some(cache) => cache.health_check().await.unwrap_or(false),
            None => false,
        }
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 인메모리 저장소와 캐시를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub async fn create_test_state() -> (AppState, admin_data::MemoryStore) {
    let store = admin_data::MemoryStore::new();
    let cache = Arc::new(admin_data::MemoryCache::new());
    let jwt = JwtConfig::new("test-access-secret", "test-refresh-secret");
    let state = AppState::new(&jwt, &SessionConfig::default(), Arc::new(store.clone()), cache)
        .await
        .expect("test state");
    (state, store)
}
