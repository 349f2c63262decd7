//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 로드 순서: 기본값 → TOML 파일(선택) → `ADMIN__SECTION__KEY` 환경 변수.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 기본 access 토큰 유효 기간 (초).
pub const DEFAULT_ACCESS_EXPIRE_SECS: u64 = 7200;
/// 기본 refresh 토큰 유효 기간 (초).
pub const DEFAULT_REFRESH_EXPIRE_SECS: u64 = 604_800;
/// 기본 토큰 발급자.
pub const DEFAULT_ISSUER: &str = "rbac-admin";

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Redis 설정
    #[serde(default)]
    pub redis: RedisConfig,
    /// JWT 설정
    pub jwt: JwtConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 세션/저장소 호출 설정
    #[serde(default)]
    pub session: SessionConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 정책 규칙 전체 재적재 주기 (초, 0이면 비활성)
    #[serde(default = "default_policy_reload")]
    pub policy_reload_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_policy_reload() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: default_request_timeout(),
            policy_reload_secs: default_policy_reload(),
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 인메모리 저장소 사용)
    #[serde(default)]
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 30,
        }
    }
}

/// Redis 설정.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    /// 연결 URL (없으면 인메모리 캐시 사용)
    #[serde(default)]
    pub url: Option<String>,
}

/// JWT 설정.
///
/// access/refresh 토큰은 서로 다른 비밀키로 서명됩니다.
/// 비밀키는 `Debug` 출력에 노출되지 않습니다.
#[derive(Debug, Deserialize)]
pub struct JwtConfig {
    /// access 토큰 서명 키
    pub access_secret: SecretString,
    /// refresh 토큰 서명 키
    pub refresh_secret: SecretString,
    /// access 토큰 유효 기간 (초)
    #[serde(default = "default_access_expire")]
    pub access_expire_secs: u64,
    /// refresh 토큰 유효 기간 (초)
    #[serde(default = "default_refresh_expire")]
    pub refresh_expire_secs: u64,
    /// 발급자
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_access_expire() -> u64 {
    DEFAULT_ACCESS_EXPIRE_SECS
}
fn default_refresh_expire() -> u64 {
    DEFAULT_REFRESH_EXPIRE_SECS
}
fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

impl JwtConfig {
    /// 기본 유효 기간과 발급자로 새 설정을 생성합니다.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: SecretString::from(access_secret.into()),
            refresh_secret: SecretString::from(refresh_secret.into()),
            access_expire_secs: DEFAULT_ACCESS_EXPIRE_SECS,
            refresh_expire_secs: DEFAULT_REFRESH_EXPIRE_SECS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// 유효 기간을 설정합니다.
    pub fn with_expiry(mut self, access_secs: u64, refresh_secs: u64) -> Self {
        self.access_expire_secs = access_secs;
        self.refresh_expire_secs = refresh_secs;
        self
    }

    /// 발급자를 설정합니다.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 세션/저장소 호출 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 공유 캐시 및 관계형 저장소 호출 제한 시간 (밀리초)
    pub store_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 3000,
        }
    }
}

impl SessionConfig {
    /// 저장소 호출 제한 시간.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("ADMIN")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 환경 변수에서만 설정을 로드합니다.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = Self::defaults()?
            .add_source(
                config::Environment::with_prefix("ADMIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    fn defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.policy_reload_secs", default_policy_reload())?
            .set_default("database.max_connections", 10)?
            .set_default("database.connection_timeout_secs", 30)?
            .set_default("jwt.access_expire_secs", DEFAULT_ACCESS_EXPIRE_SECS)?
            .set_default("jwt.refresh_expire_secs", DEFAULT_REFRESH_EXPIRE_SECS)?
            .set_default("jwt.issuer", DEFAULT_ISSUER)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("session.store_timeout_ms", 3000)
    }
}
