//! 사용자별 메뉴 트리.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use admin_core::{build_tree, AdminError, AdminResult, MenuNode, RoleCode, ROOT_PARENT_ID};
use admin_data::{AdminStore, IdentityStore, PermissionStore};
use tracing::debug;

use crate::deadline::bounded;

/// 메뉴 조회 서비스.
#[derive(Clone)]
pub struct MenuService {
    store: Arc<dyn AdminStore>,
    timeout: Duration,
}

impl MenuService {
    pub fn new(store: Arc<dyn AdminStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// 전체 메뉴 트리 (관리 화면용, 비활성 레코드 포함).
    pub async fn full_tree(&self) -> AdminResult<Vec<MenuNode>> {
        let records = bounded(
            self.timeout,
            "find_all_permissions",
            self.store.find_all_permissions(),
        )
        .await?;
        Ok(build_tree(&records, ROOT_PARENT_ID))
    }

    /// 사용자의 활성 역할 코드.
    pub async fn active_role_codes(&self, user_id: i64) -> AdminResult<Vec<RoleCode>> {
        let roles = bounded(
            self.timeout,
            "find_roles_by_user_id",
            self.store.find_roles_by_user_id(user_id),
        )
        .await?;
        Ok(roles
            .into_iter()
            .filter(|r| r.is_active())
            .map(|r| r.code)
            .collect())
    }

    /// 역할에 할당된 권한 레코드 id (id 오름차순).
    pub async fn role_menu_ids(&self, role_id: i64) -> AdminResult<Vec<i64>> {
        let role = bounded(self.timeout, "find_role", self.store.find_role(role_id)).await?;
        if role.is_none() {
            return Err(AdminError::NotFound(format!("role {role_id}")));
        }
        let records = bounded(
            self.timeout,
            "find_permissions_by_role_ids",
            self.store.find_permissions_by_role_ids(&[role_id]),
        )
        .await?;
        let mut ids: Vec<i64> = records.into_iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// 사용자에게 보이는 메뉴 트리.
    ///
    /// 슈퍼 관리자는 모든 활성 레코드를, 그 외에는 활성 역할들에 할당된
    /// 레코드의 합집합을 봅니다. 부모가 할당되지 않은 레코드는 트리에서 빠집니다.
    pub async fn user_tree(&self, user_id: i64) -> AdminResult<Vec<MenuNode>> {
        let roles = bounded(
            self.timeout,
            "find_roles_by_user_id",
            self.store.find_roles_by_user_id(user_id),
        )
        .await?;
        let active: Vec<_> = roles.into_iter().filter(|r| r.is_active()).collect();

        let records = if active.iter().any(|r| r.is_super_admin()) {
            bounded(
                self.timeout,
                "find_all_permissions",
                self.store.find_all_permissions(),
            )
            .await?
        } else {
            let role_ids: Vec<i64> = active.iter().map(|r| r.id).collect();
            if role_ids.is_empty() {
                return Ok(Vec::new());
            }
            bounded(
                self.timeout,
                "find_permissions_by_role_ids",
                self.store.find_permissions_by_role_ids(&role_ids),
            )
            .await?
        };

        let mut unique = BTreeMap::new();
        for record in records.into_iter().filter(|r| r.status.is_enabled()) {
            unique.entry((record.sort, record.id)).or_insert(record);
        }
        let records: Vec<_> = unique.into_values().collect();
        debug!(user_id, records = records.len(), "Building user menu tree");

        Ok(build_tree(&records, ROOT_PARENT_ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::{MenuKind, NewPermission, NewRole, Status};
    use admin_data::MemoryStore;

    fn record(parent_id: i64, identifier: &str, sort: i32) -> NewPermission {
        NewPermission {
            parent_id,
            identifier: identifier.to_string(),
            kind: MenuKind::Page,
            title: identifier.to_string(),
            status: Status::Enabled,
            sort,
        }
    }

    #[tokio::test]
    async fn test_user_tree_union_of_roles() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let a = tx
            .insert_role(&NewRole::new(RoleCode::new("a").unwrap(), "A"))
            .await
            .unwrap();
        let b = tx
            .insert_role(&NewRole::new(RoleCode::new("b").unwrap(), "B"))
            .await
            .unwrap();
        let root = tx.insert_permission(&record(0, "system", 2)).await.unwrap();
        let user = tx.insert_permission(&record(root.id, "system:user", 1)).await.unwrap();
        let log = tx.insert_permission(&record(0, "log", 1)).await.unwrap();
        tx.replace_role_permissions(a.id, &[root.id, user.id]).await.unwrap();
        tx.replace_role_permissions(b.id, &[root.id, log.id]).await.unwrap();
        tx.commit().await.unwrap();

        let alice = store.insert_user("alice", "hash", &[a.id, b.id]);
        let service = MenuService::new(Arc::new(store.clone()), Duration::from_secs(1));

        let tree = service.user_tree(alice.id).await.unwrap();
        let top: Vec<_> = tree.iter().map(|n| n.record.identifier.as_str()).collect();
        assert_eq!(top, vec!["log", "system"]);
        assert_eq!(tree[1].children.len(), 1);
    }

    #[tokio::test]
    async fn test_user_without_roles_sees_nothing() {
        let store = MemoryStore::new();
        let bob = store.insert_user("bob", "hash", &[]);
        let service = MenuService::new(Arc::new(store), Duration::from_secs(1));
        assert!(service.user_tree(bob.id).await.unwrap().is_empty());
        assert!(service.active_role_codes(bob.id).await.unwrap().is_empty());
    }
}
