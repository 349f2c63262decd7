//! 관계형 저장소와 정책 규칙 동기화.
//!
//! 메뉴/역할 변경은 하나의 단위로 수행됩니다.
//!
//! 1. 트랜잭션 시작 후 검증
//! 2. 관계형 변경
//! 3. 정책 배치로 규칙 변경 (제거 후 추가)
//! 4. 커밋
//!
//! 어느 단계에서든 실패하면 정책 스냅샷을 복원하고 트랜잭션을 롤백합니다.
//! 커밋 이전에 `?`로 빠져나가는 경우 트랜잭션은 drop 시 롤백됩니다.
//! 임계 구역은 별도 task에서 실행되므로 호출자가 취소되어도 절반만
//! 적용된 상태가 남지 않습니다.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use admin_core::{
    rule_for, translate, would_create_cycle, AdminError, AdminResult, NewPermission, NewRole,
    PermissionRecord, PolicyRule, Role, RoleCode, ROOT_PARENT_ID,
};
use admin_data::{AdminStore, IdentityStore, PermissionStore, PermissionTx};
use tracing::{error, info, warn};

use super::enforcer::{PolicyBatch, PolicyEnforcer};
use crate::deadline::bounded;
use crate::metrics;

/// 동기화 이벤트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    MenuUpdated(PermissionRecord),
    MenuDeleted(Vec<i64>),
    RolePermissionsAssigned {
        role_id: i64,
        permission_ids: Vec<i64>,
    },
    RoleDeleted(i64),
}

impl SyncEvent {
    fn name(&self) -> &'static str {
        match self {
            SyncEvent::MenuUpdated(_) => "menu_updated",
            SyncEvent::MenuDeleted(_) => "menu_deleted",
            SyncEvent::RolePermissionsAssigned { .. } => "role_permissions_assigned",
            SyncEvent::RoleDeleted(_) => "role_deleted",
        }
    }
}

/// 역할 하나의 규칙을 할당된 레코드 기준으로 다시 설치합니다.
///
/// 비활성 역할은 규칙을 갖지 않습니다.
async fn reset_subject(
    batch: &mut PolicyBatch<'_>,
    role: &Role,
    records: &[PermissionRecord],
) -> AdminResult<()> {
    batch.remove_subject(&role.code).await?;
    if !role.is_active() {
        return Ok(());
    }
    for rule in records.iter().filter_map(|r| rule_for(&role.code, r)) {
        batch.add(&rule).await?;
    }
    Ok(())
}

/// 커밋은 제한 시간 없이 기다립니다.
///
/// 시간 초과로 끊긴 커밋도 서버에서는 반영될 수 있으므로 스냅샷 복원 대상이 아닙니다.
async fn commit_unbounded(tx: Box<dyn PermissionTx>) -> AdminResult<()> {
    tx.commit().await.map_err(AdminError::from)
}

fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

fn validate_identifier(identifier: &str, title: &str) -> AdminResult<()> {
    if identifier.trim().is_empty() {
        return Err(AdminError::InvalidInput("identifier is empty".to_string()));
    }
    if title.trim().is_empty() {
        return Err(AdminError::InvalidInput("title is empty".to_string()));
    }
    Ok(())
}

/// 권한 동기화기.
#[derive(Clone)]
pub struct PermissionSynchronizer {
    store: Arc<dyn AdminStore>,
    enforcer: Arc<PolicyEnforcer>,
    timeout: Duration,
}

impl PermissionSynchronizer {
    pub fn new(
        store: Arc<dyn AdminStore>,
        enforcer: Arc<PolicyEnforcer>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            enforcer,
            timeout,
        }
    }

    pub fn enforcer(&self) -> &Arc<PolicyEnforcer> {
        &self.enforcer
    }

    /// 이벤트를 해당 작업으로 전달합니다.
    pub async fn sync(&self, event: SyncEvent) -> AdminResult<()> {
        let name = event.name();
        let started = Instant::now();
        let result = match event {
            SyncEvent::MenuUpdated(record) => self.update_permission(record).await,
            SyncEvent::MenuDeleted(ids) => self.delete_permissions(ids).await,
            SyncEvent::RolePermissionsAssigned {
                role_id,
                permission_ids,
            } => self.assign_role_permissions(role_id, permission_ids).await,
            SyncEvent::RoleDeleted(role_id) => self.delete_role(role_id).await,
        };
        metrics::record_sync(name, result.is_ok(), started.elapsed());
        result
    }

    /// 역할의 권한 할당을 교체합니다.
    pub async fn assign_role_permissions(
        &self,
        role_id: i64,
        permission_ids: Vec<i64>,
    ) -> AdminResult<()> {
        self.run("assign_role_permissions", move |this| async move {
            this.assign_inner(role_id, permission_ids).await
        })
        .await
    }

    /// 권한 레코드를 수정합니다.
    pub async fn update_permission(&self, record: PermissionRecord) -> AdminResult<()> {
        self.run("update_permission", move |this| async move {
            this.update_permission_inner(record).await
        })
        .await
    }

    /// 권한 레코드를 삭제합니다.
    ///
    /// 하위 메뉴가 있거나 역할에 할당된 레코드는 삭제할 수 없습니다.
    pub async fn delete_permissions(&self, ids: Vec<i64>) -> AdminResult<()> {
        self.run("delete_permissions", move |this| async move {
            this.delete_permissions_inner(ids).await
        })
        .await
    }

    /// 역할을 삭제합니다.
    pub async fn delete_role(&self, role_id: i64) -> AdminResult<()> {
        self.run("delete_role", move |this| async move {
            this.delete_role_inner(role_id).await
        })
        .await
    }

    pub async fn create_role(&self, role: NewRole) -> AdminResult<Role> {
        self.run("create_role", move |this| async move {
            this.create_role_inner(role).await
        })
        .await
    }

    /// 역할을 수정합니다. 코드가 바뀌면 규칙도 새 코드로 옮겨집니다.
    pub async fn update_role(&self, role: Role) -> AdminResult<Role> {
        self.run("update_role", move |this| async move {
            this.update_role_inner(role).await
        })
        .await
    }

    pub async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> AdminResult<PermissionRecord> {
        self.run("create_permission", move |this| async move {
            this.create_permission_inner(permission).await
        })
        .await
    }

    /// 관계형 저장소 상태로부터 규칙 전체를 다시 만듭니다.
    ///
    /// 설치된 규칙 수를 반환합니다.
    pub async fn rebuild(&self) -> AdminResult<usize> {
        self.run("rebuild", move |this| async move { this.rebuild_inner().await })
            .await
    }

    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> AdminResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = AdminResult<T>> + Send + 'static,
    {
        let result = tokio::spawn(f(self.clone()))
            .await
            .map_err(|e| AdminError::Internal(format!("{op} task failed: {e}")))?;
        match &result {
            Ok(_) => info!(op, "Permission change applied"),
            Err(e) => warn!(op, error = %e, "Permission change rejected"),
        }
        result
    }

    async fn call<T, E, F>(&self, op: &'static str, fut: F) -> AdminResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<AdminError>,
    {
        bounded(self.timeout, op, fut).await
    }

    async fn begin(&self) -> AdminResult<Box<dyn PermissionTx>> {
        self.call("begin", self.store.begin()).await
    }

    async fn require_role(&self, role_id: i64) -> AdminResult<Role> {
        self.call("find_role", self.store.find_role(role_id))
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("role {role_id}")))
    }

    async fn require_permission(&self, id: i64) -> AdminResult<PermissionRecord> {
        self.call("find_permission", self.store.find_permission(id))
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("permission {id}")))
    }

    async fn role_records(&self, role_id: i64) -> AdminResult<Vec<PermissionRecord>> {
        self.call(
            "find_permissions_by_role_ids",
            self.store.find_permissions_by_role_ids(&[role_id]),
        )
        .await
    }

    /// 커밋하고 정책 배치를 확정합니다. 실패 시 스냅샷을 복원합니다.
    async fn finish(
        &self,
        tx: Box<dyn PermissionTx>,
        batch: PolicyBatch<'_>,
        applied: AdminResult<()>,
    ) -> AdminResult<()> {
        if let Err(err) = applied {
            if let Err(restore_err) = batch.rollback().await {
                error!(error = %restore_err, "Failed to restore policy snapshot");
            }
            if let Err(rollback_err) = self.call("rollback", tx.rollback()).await {
                warn!(error = %rollback_err, "Transaction rollback failed");
            }
            return Err(err);
        }

        match commit_unbounded(tx).await {
            Ok(()) => {
                batch.commit();
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Commit failed, restoring policy snapshot");
                if let Err(restore_err) = batch.rollback().await {
                    error!(error = %restore_err, "Failed to restore policy snapshot");
                }
                Err(match err {
                    AdminError::StoreUnavailable(_) => err,
                    other => AdminError::StoreUnavailable(other.to_string()),
                })
            }
        }
    }

    async fn commit_only(&self, tx: Box<dyn PermissionTx>) -> AdminResult<()> {
        commit_unbounded(tx).await.map_err(|err| match err {
            AdminError::StoreUnavailable(_) => err,
            other => AdminError::StoreUnavailable(other.to_string()),
        })
    }

    async fn assign_inner(&self, role_id: i64, permission_ids: Vec<i64>) -> AdminResult<()> {
        let ids = dedup_ids(&permission_ids);
        let mut tx = self.begin().await?;

        let role = self.require_role(role_id).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            records.push(self.require_permission(*id).await?);
        }

        self.call(
            "replace_role_permissions",
            tx.replace_role_permissions(role_id, &ids),
        )
        .await?;

        let mut batch = self.enforcer.batch().await;
        let applied = reset_subject(&mut batch, &role, &records).await;
        self.finish(tx, batch, applied).await
    }

    async fn update_permission_inner(&self, record: PermissionRecord) -> AdminResult<()> {
        validate_identifier(&record.identifier, &record.title)?;
        let mut tx = self.begin().await?;

        self.require_permission(record.id).await?;

        if record.parent_id != ROOT_PARENT_ID {
            let parent = self
                .call("find_permission", self.store.find_permission(record.parent_id))
                .await?;
            if parent.is_none() {
                return Err(AdminError::InvalidInput(format!(
                    "parent {} not found",
                    record.parent_id
                )));
            }
            let all = self
                .call("find_all_permissions", self.store.find_all_permissions())
                .await?;
            if would_create_cycle(&all, record.id, record.parent_id) {
                return Err(AdminError::InvalidInput(format!(
                    "moving {} under {} creates a cycle",
                    record.id, record.parent_id
                )));
            }
        }

        let same_identifier = self
            .call(
                "find_permission_by_identifier",
                self.store.find_permission_by_identifier(&record.identifier),
            )
            .await?;
        if same_identifier.is_some_and(|other| other.id != record.id) {
            return Err(AdminError::Conflict(format!(
                "identifier {} already exists",
                record.identifier
            )));
        }

        let roles = self
            .call(
                "find_roles_by_permission",
                self.store.find_roles_by_permission(record.id),
            )
            .await?;
        let mut assignments = Vec::with_capacity(roles.len());
        for role in roles {
            let mut records = self.role_records(role.id).await?;
            for r in records.iter_mut().filter(|r| r.id == record.id) {
                *r = record.clone();
            }
            assignments.push((role, records));
        }

        self.call("update_permission", tx.update_permission(&record))
            .await?;

        let mut batch = self.enforcer.batch().await;
        let applied = async {
            for (role, records) in &assignments {
                reset_subject(&mut batch, role, records).await?;
            }
            Ok::<_, AdminError>(())
        }
        .await;
        self.finish(tx, batch, applied).await
    }

    async fn delete_permissions_inner(&self, ids: Vec<i64>) -> AdminResult<()> {
        let ids = dedup_ids(&ids);
        if ids.is_empty() {
            return Err(AdminError::InvalidInput("no permission ids".to_string()));
        }
        let mut tx = self.begin().await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = self.require_permission(*id).await?;
            let children = self
                .call("find_children", self.store.find_children(*id))
                .await?;
            if !children.is_empty() {
                return Err(AdminError::Conflict(format!(
                    "permission {id} has {} children",
                    children.len()
                )));
            }
            let holders = self
                .call(
                    "find_roles_by_permission",
                    self.store.find_roles_by_permission(*id),
                )
                .await?;
            if !holders.is_empty() {
                return Err(AdminError::Conflict(format!(
                    "permission {id} is assigned to {} roles",
                    holders.len()
                )));
            }
            records.push(record);
        }

        // 남아 있는 규칙이 있다면 그 역할의 규칙을 할당 기준으로 다시 설치
        let targets: Vec<(String, &'static str)> = records
            .iter()
            .filter_map(|r| translate(&r.identifier))
            .map(|(path, verb)| (path.as_str().to_string(), verb.as_str()))
            .collect();
        let stale_subjects: BTreeSet<RoleCode> = self
            .enforcer
            .rules()
            .await
            .into_iter()
            .filter(|rule| {
                targets.iter().any(|(path, verb)| {
                    rule.object.as_str() == path.as_str() && rule.action.as_str() == *verb
                })
            })
            .map(|rule| rule.subject)
            .collect();

        let mut stale = Vec::with_capacity(stale_subjects.len());
        for code in stale_subjects {
            let role = self
                .call("find_role_by_code", self.store.find_role_by_code(&code))
                .await?;
            let records = match &role {
                Some(role) => self.role_records(role.id).await?,
                None => Vec::new(),
            };
            stale.push((code, role, records));
        }

        self.call("delete_permissions", tx.delete_permissions(&ids))
            .await?;

        let mut batch = self.enforcer.batch().await;
        let applied = async {
            for (code, role, records) in &stale {
                warn!(role = %code, "Removing stale rules for deleted permissions");
                match role {
                    Some(role) => reset_subject(&mut batch, role, records).await?,
                    None => batch.remove_subject(code).await?,
                }
            }
            Ok::<_, AdminError>(())
        }
        .await;
        self.finish(tx, batch, applied).await
    }

    async fn delete_role_inner(&self, role_id: i64) -> AdminResult<()> {
        let mut tx = self.begin().await?;

        let role = self.require_role(role_id).await?;
        if role.is_super_admin() {
            return Err(AdminError::Conflict(
                "super admin role cannot be deleted".to_string(),
            ));
        }
        let users = self
            .call(
                "count_users_with_role",
                self.store.count_users_with_role(role_id),
            )
            .await?;
        if users > 0 {
            return Err(AdminError::Conflict(format!(
                "role {} is assigned to {users} users",
                role.code
            )));
        }

        self.call("delete_role", tx.delete_role(role_id)).await?;

        let mut batch = self.enforcer.batch().await;
        let applied = batch.remove_subject(&role.code).await;
        self.finish(tx, batch, applied).await
    }

    async fn create_role_inner(&self, role: NewRole) -> AdminResult<Role> {
        if role.name.trim().is_empty() {
            return Err(AdminError::InvalidInput("role name is empty".to_string()));
        }
        let mut tx = self.begin().await?;

        let existing = self
            .call("find_role_by_code", self.store.find_role_by_code(&role.code))
            .await?;
        if existing.is_some() {
            return Err(AdminError::Conflict(format!(
                "role code {} already exists",
                role.code
            )));
        }

        let created = self.call("insert_role", tx.insert_role(&role)).await?;
        self.commit_only(tx).await?;
        Ok(created)
    }

    async fn update_role_inner(&self, role: Role) -> AdminResult<Role> {
        if role.name.trim().is_empty() {
            return Err(AdminError::InvalidInput("role name is empty".to_string()));
        }
        let mut tx = self.begin().await?;

        let existing = self.require_role(role.id).await?;
        let code_changed = existing.code != role.code;
        if code_changed && existing.is_super_admin() {
            return Err(AdminError::Conflict(
                "super admin role cannot be renamed".to_string(),
            ));
        }
        if existing.is_super_admin() && !role.is_active() {
            return Err(AdminError::Conflict(
                "super admin role cannot be disabled".to_string(),
            ));
        }
        if code_changed {
            if role.is_super_admin() {
                return Err(AdminError::Conflict(format!(
                    "role code {} is reserved",
                    role.code
                )));
            }
            let taken = self
                .call("find_role_by_code", self.store.find_role_by_code(&role.code))
                .await?;
            if taken.is_some() {
                return Err(AdminError::Conflict(format!(
                    "role code {} already exists",
                    role.code
                )));
            }
        }

        let records = self.role_records(role.id).await?;
        self.call("update_role", tx.update_role(&role)).await?;

        let mut batch = self.enforcer.batch().await;
        let applied = if code_changed && existing.status == role.status {
            batch.rename_subject(&existing.code, &role.code).await
        } else {
            async {
                batch.remove_subject(&existing.code).await?;
                reset_subject(&mut batch, &role, &records).await
            }
            .await
        };
        self.finish(tx, batch, applied).await?;
        Ok(role)
    }

    async fn create_permission_inner(
        &self,
        permission: NewPermission,
    ) -> AdminResult<PermissionRecord> {
        validate_identifier(&permission.identifier, &permission.title)?;
        let mut tx = self.begin().await?;

        if permission.parent_id != ROOT_PARENT_ID {
            let parent = self
                .call(
                    "find_permission",
                    self.store.find_permission(permission.parent_id),
                )
                .await?;
            if parent.is_none() {
                return Err(AdminError::InvalidInput(format!(
                    "parent {} not found",
                    permission.parent_id
                )));
            }
        }
        let existing = self
            .call(
                "find_permission_by_identifier",
                self.store.find_permission_by_identifier(&permission.identifier),
            )
            .await?;
        if existing.is_some() {
            return Err(AdminError::Conflict(format!(
                "identifier {} already exists",
                permission.identifier
            )));
        }

        let record = self
            .call("insert_permission", tx.insert_permission(&permission))
            .await?;
        self.commit_only(tx).await?;
        Ok(record)
    }

    async fn rebuild_inner(&self) -> AdminResult<usize> {
        // 쓰기 잠금만 잡고 아무것도 쓰지 않음
        let tx = self.begin().await?;
        let roles = self
            .call("find_all_roles", self.store.find_all_roles())
            .await?;

        let mut rules: Vec<PolicyRule> = Vec::new();
        for role in roles.iter().filter(|r| r.is_active()) {
            let records = self.role_records(role.id).await?;
            rules.extend(records.iter().filter_map(|r| rule_for(&role.code, r)));
        }
        rules.sort();
        rules.dedup();

        let mut batch = self.enforcer.batch().await;
        if let Err(err) = batch.replace_all(&rules).await {
            if let Err(restore_err) = batch.rollback().await {
                error!(error = %restore_err, "Failed to restore policy snapshot");
            }
            return Err(err);
        }
        batch.commit();
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "Releasing writer lock failed");
        }
        info!(roles = roles.len(), rules = rules.len(), "Policy rules rebuilt");
        Ok(rules.len())
    }
}
