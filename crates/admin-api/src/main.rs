//! RBAC 관리자 API 서버.
//!
//! 설정을 로드하고 저장소/캐시를 연결한 뒤, 정책 규칙을 재구성하고
//! Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use admin_api::auth::{hash_password, PasswordPolicy};
use admin_api::metrics::setup_metrics_recorder;
use admin_api::middleware::metrics_layer;
use admin_api::rbac::PolicyReloader;
use admin_api::routes::create_api_router;
use admin_api::state::AppState;
use admin_core::{init_logging, AdminError, AppConfig, LogConfig, NewRole, RoleCode};
use admin_data::{
    AdminStore, Database, DatabaseConfig, IdentityStore, MemoryCache, MemoryStore, PgStore,
    RedisCache, SharedCache,
};

/// 사용자 저장소 구현.
///
/// 관리자 계정 부트스트랩은 trait 밖의 메서드를 사용하므로 구체 타입을 보관합니다.
enum Backend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl Backend {
    fn store(&self) -> Arc<dyn AdminStore> {
        match self {
            Backend::Postgres(store) => Arc::new(store.clone()),
            Backend::Memory(store) => Arc::new(store.clone()),
        }
    }
}

/// CORS 레이어 생성.
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        // 갱신된 토큰 헤더를 브라우저에서 읽을 수 있어야 함
        .expose_headers([axum::http::HeaderName::from_static("new-access-token")])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    timeout: Duration,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let api_router = create_api_router(state.clone()).with_state(state);

    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(cors_layer())
}

/// 저장소 연결. URL이 없으면 인메모리 저장소를 사용합니다.
async fn connect_store(
    config: &AppConfig,
) -> Result<(Backend, Option<Database>), Box<dyn std::error::Error>> {
    let Some(url) = config.database.url.as_deref() else {
        warn!("database.url not set, using in-memory store (data is lost on restart)");
        return Ok((Backend::Memory(MemoryStore::new()), None));
    };

    let db_config = DatabaseConfig {
        url: url.to_string(),
        max_connections: config.database.max_connections,
        connect_timeout_secs: config.database.connection_timeout_secs,
    };
    let db = Database::connect(&db_config).await?;
    db.migrate().await?;
    Ok((Backend::Postgres(PgStore::new(db.clone())), Some(db)))
}

/// 공유 캐시 연결. URL이 없으면 프로세스 로컬 캐시를 사용합니다.
async fn connect_cache(
    config: &AppConfig,
) -> Result<(Arc<dyn SharedCache>, Option<RedisCache>), Box<dyn std::error::Error>> {
    let Some(url) = config.redis.url.as_deref() else {
        warn!("redis.url not set, using process-local cache (revocations are not shared)");
        return Ok((Arc::new(MemoryCache::new()), None));
    };

    let redis = RedisCache::connect(url).await?;
    Ok((Arc::new(redis.clone()), Some(redis)))
}

/// `ADMIN_BOOTSTRAP_PASSWORD`가 설정되어 있으면 슈퍼 관리자 계정을 준비합니다.
///
/// 사용자명은 `ADMIN_BOOTSTRAP_USER` (기본값 `admin`).
async fn bootstrap_admin(
    state: &AppState,
    backend: &Backend,
) -> Result<(), Box<dyn std::error::Error>> {
    let Ok(password) = std::env::var("ADMIN_BOOTSTRAP_PASSWORD") else {
        return Ok(());
    };
    let username = std::env::var("ADMIN_BOOTSTRAP_USER").unwrap_or_else(|_| "admin".to_string());

    if let Err(e) = PasswordPolicy::default().check(&password) {
        warn!(error = %e, "Bootstrap password is weak");
    }

    let code = RoleCode::super_admin();
    let role = match state
        .synchronizer
        .create_role(NewRole::new(code.clone(), "Super Admin"))
        .await
    {
        Ok(role) => role,
        Err(AdminError::Conflict(_)) => state
            .store
            .find_role_by_code(&code)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("role {code}")))?,
        Err(e) => return Err(e.into()),
    };

    let hash = hash_password(&password)?;
    let user = match backend {
        Backend::Postgres(store) => store.upsert_user(&username, &hash, &[role.id]).await?,
        Backend::Memory(store) => store.insert_user(username.as_str(), hash, &[role.id]),
    };
    info!(user_id = user.id, username = %user.username, "Bootstrap administrator ready");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());
    let config = AppConfig::load(&config_path)?;

    init_logging(LogConfig::from_env(&config.logging))?;
    info!(config = %config_path, "Starting RBAC admin API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. server.host, server.port를 확인하세요."
            );
            e
        })?;

    let (backend, db) = connect_store(&config).await?;
    let (cache, redis) = connect_cache(&config).await?;

    let mut state = AppState::new(&config.jwt, &config.session, backend.store(), cache).await?;
    if let Some(db) = db {
        state = state.with_database(db);
    }
    if let Some(redis) = redis {
        state = state.with_redis(redis);
    }

    bootstrap_admin(&state, &backend).await?;

    let rules = state.synchronizer.rebuild().await?;
    info!(rules, "Policy rules loaded");

    info!(
        version = %state.version,
        has_db = state.db.is_some(),
        has_redis = state.redis.is_some(),
        "Service connections status"
    );

    let shutdown_token = CancellationToken::new();
    let reloader = (config.server.policy_reload_secs > 0).then(|| {
        let reloader = PolicyReloader::new(
            state.synchronizer.clone(),
            Duration::from_secs(config.server.policy_reload_secs),
        );
        tokio::spawn(reloader.run(shutdown_token.clone()))
    });

    let app = create_router(
        Arc::new(state),
        metrics_handle,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    if let Some(reloader) = reloader {
        if let Err(e) = reloader.await {
            warn!(error = %e, "Policy reloader task failed");
        }
    }
    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
