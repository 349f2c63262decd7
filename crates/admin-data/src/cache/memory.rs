//! 프로세스 내 공유 캐시.
//!
//! 개발 환경과 테스트에서 Redis 대신 사용합니다. 하나의 mutex로 모든 연산을
//! 직렬화하므로 `set_nx_ex`는 원자적입니다. 만료된 항목은 읽을 때 지우고,
//! 쓰기마다 전체를 한 번 훑어 정리합니다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::SharedCache;
use crate::error::{DataError, Result};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// 인메모리 공유 캐시.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 남은 TTL을 조회합니다 (만료되었거나 없으면 `None`).
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }

    /// 유효한 항목 수.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 장애 상태를 설정합니다. 장애 상태에서는 모든 연산이 실패합니다.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 모든 연산 앞에 지연을 추가합니다.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DataError::CacheError("cache unavailable".to_string()));
        }
        Ok(())
    }

    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a Entry> {
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        entries.get(key)
    }
}

fn expiry(now: Instant, ttl_secs: u64) -> Instant {
    now + Duration::from_secs(ttl_secs.max(1))
}

/// 만료된 항목을 모두 지운 뒤 새 항목을 넣습니다.
fn sweep_and_insert(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    value: &str,
    ttl_secs: u64,
    now: Instant,
) {
    entries.retain(|_, e| e.expires_at > now);
    entries.insert(
        key.to_string(),
        Entry {
            value: value.to_string(),
            expires_at: expiry(now, ttl_secs),
        },
    );
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        self.enter().await?;
        let now = Instant::now();
        let mut entries = self.lock();
        if Self::live(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        sweep_and_insert(&mut entries, key, value, ttl_secs, now);
        Ok(true)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.enter().await?;
        sweep_and_insert(&mut self.lock(), key, value, ttl_secs, Instant::now());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.enter().await?;
        let mut entries = self.lock();
        Ok(Self::live(&mut entries, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.enter().await?;
        let now = Instant::now();
        let removed = self.lock().remove(key);
        Ok(removed.is_some_and(|e| e.expires_at > now))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.enter().await?;
        let mut entries = self.lock();
        Ok(Self::live(&mut entries, key, Instant::now()).is_some())
    }
}
