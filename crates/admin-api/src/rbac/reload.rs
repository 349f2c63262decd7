//! 정책 규칙 주기적 재적재.
//!
//! 규칙은 인스턴스마다 메모리에 있으므로 다른 인스턴스가 커밋한 변경은
//! 다음 재적재 때 반영됩니다.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::sync::PermissionSynchronizer;

/// 관계형 상태에서 규칙을 주기적으로 다시 만드는 작업.
pub struct PolicyReloader {
    synchronizer: PermissionSynchronizer,
    interval: Duration,
}

impl PolicyReloader {
    pub fn new(synchronizer: PermissionSynchronizer, interval: Duration) -> Self {
        Self {
            synchronizer,
            interval,
        }
    }

    /// `shutdown`이 취소될 때까지 실행합니다.
    ///
    /// 첫 재적재는 한 주기 뒤에 일어납니다. 실패는 기록만 하고 다음 주기에 재시도합니다.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.synchronizer.rebuild().await {
                        Ok(rules) => debug!(rules, "Policy rules reloaded"),
                        Err(e) => error!(error = %e, "Policy reload failed"),
                    }
                }

                _ = shutdown.cancelled() => {
                    info!("Policy reloader stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::PolicyEnforcer;
    use admin_core::{MenuKind, NewPermission, NewRole, RoleCode, Status};
    use admin_data::{MemoryStore, PermissionStore, PermissionTx};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_picks_up_changes_committed_elsewhere() {
        let store = MemoryStore::new();
        let enforcer = Arc::new(PolicyEnforcer::new().await.unwrap());
        let sync = PermissionSynchronizer::new(
            Arc::new(store.clone()),
            enforcer.clone(),
            Duration::from_secs(1),
        );

        // 다른 인스턴스가 저장소에 직접 커밋한 할당
        let mut tx = store.begin().await.unwrap();
        let role = tx
            .insert_role(&NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
            .await
            .unwrap();
        let button = tx
            .insert_permission(&NewPermission {
                parent_id: 0,
                identifier: "system:user:list".to_string(),
                kind: MenuKind::Button,
                title: "list".to_string(),
                status: Status::Enabled,
                sort: 0,
            })
            .await
            .unwrap();
        tx.replace_role_permissions(role.id, &[button.id])
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(enforcer.is_empty().await);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            PolicyReloader::new(sync, Duration::from_secs(30)).run(shutdown.clone()),
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(enforcer.len().await, 1);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
