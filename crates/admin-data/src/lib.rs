//! 공유 캐시 및 관계형 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - 공유 캐시 추상화 ([`SharedCache`]) 와 Redis/인메모리 구현
//! - 역할·권한 저장소 trait ([`IdentityStore`], [`PermissionStore`], [`PermissionTx`])
//! - PostgreSQL 구현 ([`PgStore`]) 과 장애 주입이 가능한 인메모리 구현 ([`MemoryStore`])

pub mod cache;
pub mod error;
pub mod repository;

pub use error::{DataError, Result};

pub use cache::{MemoryCache, RedisCache, SharedCache};
pub use repository::{
    AdminStore, Database, DatabaseConfig, IdentityStore, MemoryStore, PermissionStore,
    PermissionTx, PgStore,
};
