//! 공유 캐시 추상화.
//!
//! 토큰 블랙리스트와 갱신 잠금 항목을 보관합니다. 여러 프로세스가 같은
//! 캐시를 공유하므로, 갱신 잠금은 단일 원자 명령([`SharedCache::set_nx_ex`])
//! 으로만 획득해야 합니다.

mod memory;
mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use async_trait::async_trait;

use crate::error::Result;

/// 공유 키-값 캐시.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// 키가 없을 때만 TTL과 함께 값을 설정합니다 (원자적).
    ///
    /// 설정에 성공하면 `true`, 이미 키가 있으면 `false`.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool>;

    /// TTL과 함께 값을 설정합니다 (덮어쓰기).
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 키를 삭제하고, 삭제된 키가 있었는지 반환합니다.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;
}
