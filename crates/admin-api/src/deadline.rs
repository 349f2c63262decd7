//! 저장소 호출 시간 제한.

use std::future::Future;
use std::time::Duration;

use admin_core::{AdminError, AdminResult};
use tracing::warn;

/// 저장소 호출을 `limit` 안에 끝내도록 제한합니다.
///
/// 시간 초과 시 `StoreUnavailable`을 반환합니다.
pub async fn bounded<T, E, F>(limit: Duration, op: &'static str, fut: F) -> AdminResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AdminError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            warn!(op, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(AdminError::StoreUnavailable(format!("{op} timed out")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_data::DataError;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_store_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, DataError>(1)
        };
        let err = bounded(Duration::from_millis(100), "slow_op", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::StoreUnavailable(msg) if msg.contains("slow_op")));
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let ok = bounded(Duration::from_secs(1), "op", async { Ok::<_, DataError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = bounded(Duration::from_secs(1), "op", async {
            Err::<i32, _>(DataError::Constraint("code".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
    }
}
