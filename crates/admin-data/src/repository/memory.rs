//! 인메모리 역할·권한 저장소.
//!
//! 개발 환경과 테스트에서 PostgreSQL 대신 사용합니다.
//! 트랜잭션은 상태 사본에 변경을 쌓고 `commit` 시점에 교체합니다.
//! 쓰기 트랜잭션은 한 번에 하나만 열립니다.

use admin_core::{
    NewPermission, NewRole, PermissionRecord, Role, RoleCode, Status, User,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::{IdentityStore, PermissionStore, PermissionTx};
use crate::error::{DataError, Result};

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    roles: BTreeMap<i64, Role>,
    menus: BTreeMap<i64, PermissionRecord>,
    users: BTreeMap<i64, User>,
    /// (user_id, role_id)
    user_roles: BTreeSet<(i64, i64)>,
    /// (role_id, menu_id)
    role_menus: BTreeSet<(i64, i64)>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn sorted_menus<'a>(
        &self,
        menus: impl Iterator<Item = &'a PermissionRecord>,
    ) -> Vec<PermissionRecord> {
        let mut records: Vec<PermissionRecord> = menus.cloned().collect();
        records.sort_by_key(|r| (r.sort, r.id));
        records
    }

    fn sorted_roles<'a>(&self, roles: impl Iterator<Item = &'a Role>) -> Vec<Role> {
        let mut roles: Vec<Role> = roles.cloned().collect();
        roles.sort_by_key(|r| (r.sort, r.id));
        roles
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    writer: Arc<tokio::sync::Mutex<()>>,
    fail_next_commit: AtomicBool,
    commit_latency: Mutex<Option<Duration>>,
}

/// 인메모리 저장소.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `commit` 한 번을 실패시킵니다.
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// 이후 모든 `commit`을 `latency`만큼 늦춥니다. 지연 후에는 정상 반영됩니다.
    pub fn set_commit_latency(&self, latency: Duration) {
        *self
            .inner
            .commit_latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(latency);
    }

    /// 사용자를 추가하고 역할을 할당합니다.
    pub fn insert_user(
        &self,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        role_ids: &[i64],
    ) -> User {
        let mut state = self.state();
        let user = User {
            id: state.allocate_id(),
            username: username.into(),
            password_hash: password_hash.into(),
            status: Status::Enabled,
        };
        state.users.insert(user.id, user.clone());
        for role_id in role_ids {
            state.user_roles.insert((user.id, *role_id));
        }
        user
    }

    /// 역할에 할당된 권한 id (테스트 확인용).
    pub fn role_permission_ids(&self, role_id: i64) -> Vec<i64> {
        self.state()
            .role_menus
            .iter()
            .filter(|(r, _)| *r == role_id)
            .map(|(_, m)| *m)
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_roles_by_user_id(&self, user_id: i64) -> Result<Vec<Role>> {
        let state = self.state();
        let roles = state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| state.roles.get(r));
        Ok(state.sorted_roles(roles))
    }

    async fn find_role_by_code(&self, code: &RoleCode) -> Result<Option<Role>> {
        Ok(self.state().roles.values().find(|r| &r.code == code).cloned())
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        Ok(self.state().roles.get(&role_id).cloned())
    }

    async fn find_all_roles(&self) -> Result<Vec<Role>> {
        let state = self.state();
        Ok(state.sorted_roles(state.roles.values()))
    }

    async fn count_users_with_role(&self, role_id: i64) -> Result<i64> {
        let count = self
            .state()
            .user_roles
            .iter()
            .filter(|(_, r)| *r == role_id)
            .count();
        Ok(count as i64)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_all_permissions(&self) -> Result<Vec<PermissionRecord>> {
        let state = self.state();
        Ok(state.sorted_menus(state.menus.values()))
    }

    async fn find_permission(&self, id: i64) -> Result<Option<PermissionRecord>> {
        Ok(self.state().menus.get(&id).cloned())
    }

    async fn find_permissions_by_role_ids(
        &self,
        role_ids: &[i64],
    ) -> Result<Vec<PermissionRecord>> {
        let state = self.state();
        let menu_ids: BTreeSet<i64> = state
            .role_menus
            .iter()
            .filter(|(r, _)| role_ids.contains(r))
            .map(|(_, m)| *m)
            .collect();
        let records = menu_ids.iter().filter_map(|id| state.menus.get(id));
        Ok(state.sorted_menus(records))
    }

    async fn find_children(&self, id: i64) -> Result<Vec<PermissionRecord>> {
        let state = self.state();
        Ok(state.sorted_menus(state.menus.values().filter(|m| m.parent_id == id)))
    }

    async fn find_roles_by_permission(&self, id: i64) -> Result<Vec<Role>> {
        let state = self.state();
        let roles = state
            .role_menus
            .iter()
            .filter(|(_, m)| *m == id)
            .filter_map(|(r, _)| state.roles.get(r));
        Ok(state.sorted_roles(roles))
    }

    async fn find_permission_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PermissionRecord>> {
        Ok(self
            .state()
            .menus
            .values()
            .find(|m| m.identifier == identifier)
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn PermissionTx>> {
        let writer = self.inner.writer.clone().lock_owned().await;
        let staged = self.state().clone();
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            staged,
            _writer: writer,
        }))
    }
}

/// 인메모리 트랜잭션.
struct MemoryTx {
    store: MemoryStore,
    staged: State,
    _writer: OwnedMutexGuard<()>,
}

impl MemoryTx {
    fn ensure_unique_code(&self, code: &RoleCode, except: Option<i64>) -> Result<()> {
        let taken = self
            .staged
            .roles
            .values()
            .any(|r| &r.code == code && Some(r.id) != except);
        if taken {
            return Err(DataError::Constraint(format!("role code {}", code)));
        }
        Ok(())
    }

    fn ensure_unique_identifier(&self, identifier: &str, except: Option<i64>) -> Result<()> {
        let taken = self
            .staged
            .menus
            .values()
            .any(|m| m.identifier == identifier && Some(m.id) != except);
        if taken {
            return Err(DataError::Constraint(format!(
                "permission identifier {}",
                identifier
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionTx for MemoryTx {
    async fn insert_role(&mut self, role: &NewRole) -> Result<Role> {
        self.ensure_unique_code(&role.code, None)?;
        let id = self.staged.allocate_id();
        let role = role.clone().into_role(id);
        self.staged.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update_role(&mut self, role: &Role) -> Result<()> {
        if !self.staged.roles.contains_key(&role.id) {
            return Err(DataError::NotFound(format!("role {}", role.id)));
        }
        self.ensure_unique_code(&role.code, Some(role.id))?;
        self.staged.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&mut self, role_id: i64) -> Result<()> {
        if !self.staged.roles.contains_key(&role_id) {
            return Err(DataError::NotFound(format!("role {}", role_id)));
        }
        // sys_user_role.role_id 참조 제약과 동일
        if self.staged.user_roles.iter().any(|(_, r)| *r == role_id) {
            return Err(DataError::Constraint(format!("role {} is held by users", role_id)));
        }
        self.staged.roles.remove(&role_id);
        self.staged.role_menus.retain(|(r, _)| *r != role_id);
        Ok(())
    }

    async fn replace_role_permissions(
        &mut self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<()> {
        self.staged.role_menus.retain(|(r, _)| *r != role_id);
        for id in permission_ids {
            self.staged.role_menus.insert((role_id, *id));
        }
        Ok(())
    }

    async fn insert_permission(&mut self, permission: &NewPermission) -> Result<PermissionRecord> {
        self.ensure_unique_identifier(&permission.identifier, None)?;
        let id = self.staged.allocate_id();
        let record = permission.clone().into_record(id);
        self.staged.menus.insert(id, record.clone());
        Ok(record)
    }

    async fn update_permission(&mut self, record: &PermissionRecord) -> Result<()> {
        if !self.staged.menus.contains_key(&record.id) {
            return Err(DataError::NotFound(format!("permission {}", record.id)));
        }
        self.ensure_unique_identifier(&record.identifier, Some(record.id))?;
        self.staged.menus.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_permissions(&mut self, ids: &[i64]) -> Result<()> {
        // sys_role_menu.menu_id 참조 제약과 동일
        if let Some((role_id, menu_id)) = self
            .staged
            .role_menus
            .iter()
            .find(|(_, m)| ids.contains(m))
        {
            return Err(DataError::Constraint(format!(
                "permission {} is assigned to role {}",
                menu_id, role_id
            )));
        }
        for id in ids {
            self.staged.menus.remove(id);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            store,
            staged,
            _writer,
        } = *self;
        let latency = *store
            .inner
            .commit_latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if store.inner.fail_next_commit.swap(false, Ordering::SeqCst) {
            debug!("Injected commit failure");
            return Err(DataError::InjectedFailure("commit".to_string()));
        }
        *store.state() = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::MenuKind;

    fn button(identifier: &str) -> NewPermission {
        NewPermission {
            parent_id: 0,
            identifier: identifier.to_string(),
            kind: MenuKind::Button,
            title: identifier.to_string(),
            status: Status::Enabled,
            sort: 0,
        }
    }

    #[tokio::test]
    async fn test_commit_applies_changes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let role = tx
            .insert_role(&NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
            .await
            .unwrap();
        let menu = tx.insert_permission(&button("system:dict:list")).await.unwrap();
        tx.replace_role_permissions(role.id, &[menu.id]).await.unwrap();
        tx.commit().await.unwrap();

        let records = store.find_permissions_by_role_ids(&[role.id]).await.unwrap();
        assert_eq!(records, vec![menu]);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_role(&NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
                .await
                .unwrap();
        }
        assert!(store.find_all_roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let store = MemoryStore::new();
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        tx.insert_permission(&button("system:dict:list")).await.unwrap();
        assert!(matches!(tx.commit().await, Err(DataError::InjectedFailure(_))));
        assert!(store.find_all_permissions().await.unwrap().is_empty());

        // 주입은 한 번만
        let mut tx = store.begin().await.unwrap();
        tx.insert_permission(&button("system:dict:list")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.find_all_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let code = RoleCode::new("editor").unwrap();
        tx.insert_role(&NewRole::new(code.clone(), "Editor")).await.unwrap();
        let err = tx.insert_role(&NewRole::new(code, "Again")).await.unwrap_err();
        assert!(matches!(err, DataError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_delete_role_keeps_user_assignments() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let role = tx
            .insert_role(&NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
            .await
            .unwrap();
        let menu = tx.insert_permission(&button("system:dict:list")).await.unwrap();
        tx.replace_role_permissions(role.id, &[menu.id]).await.unwrap();
        tx.commit().await.unwrap();
        let user = store.insert_user("alice", "hash", &[role.id]);

        let mut tx = store.begin().await.unwrap();
        let err = tx.delete_role(role.id).await.unwrap_err();
        assert!(matches!(err, DataError::Constraint(_)));
        drop(tx);
        assert_eq!(store.count_users_with_role(role.id).await.unwrap(), 1);

        // 사용자가 없는 역할은 자신의 메뉴 할당과 함께 삭제
        store.state().user_roles.remove(&(user.id, role.id));
        let mut tx = store.begin().await.unwrap();
        tx.delete_role(role.id).await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.find_roles_by_permission(menu.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_assigned_permission_is_constraint_violation() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let role = tx
            .insert_role(&NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
            .await
            .unwrap();
        let menu = tx.insert_permission(&button("system:dict:list")).await.unwrap();
        tx.replace_role_permissions(role.id, &[menu.id]).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.delete_permissions(&[menu.id]).await.unwrap_err();
        assert!(matches!(err, DataError::Constraint(_)));
        drop(tx);

        assert_eq!(store.role_permission_ids(role.id), vec![menu.id]);
        assert!(store.find_permission(menu.id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_latency_delays_but_applies() {
        let store = MemoryStore::new();
        store.set_commit_latency(Duration::from_secs(5));

        let mut tx = store.begin().await.unwrap();
        tx.insert_permission(&button("system:dict:list")).await.unwrap();
        let started = tokio::time::Instant::now();
        tx.commit().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(store.find_all_permissions().await.unwrap().len(), 1);
    }
}
