//! 역할·권한 저장소.
//!
//! 읽기 연산은 저장소에서 바로 수행하고, 변경 연산은 반드시
//! [`PermissionStore::begin`]으로 얻은 트랜잭션([`PermissionTx`]) 안에서 수행합니다.
//! 트랜잭션은 `commit` 없이 drop되면 롤백됩니다.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{Database, DatabaseConfig, PgStore};

use admin_core::{NewPermission, NewRole, PermissionRecord, Role, RoleCode, User};
use async_trait::async_trait;

use crate::error::Result;

/// 사용자·역할 조회.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// 사용자에게 할당된 역할 (비활성 역할 포함).
    async fn find_roles_by_user_id(&self, user_id: i64) -> Result<Vec<Role>>;

    async fn find_role_by_code(&self, code: &RoleCode) -> Result<Option<Role>>;

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>>;

    async fn find_all_roles(&self) -> Result<Vec<Role>>;

    /// 역할이 할당된 사용자 수.
    async fn count_users_with_role(&self, role_id: i64) -> Result<i64>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
}

/// 권한 레코드 조회 및 트랜잭션 시작.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// 모든 권한 레코드 (`sort`, `id` 순).
    async fn find_all_permissions(&self) -> Result<Vec<PermissionRecord>>;

    async fn find_permission(&self, id: i64) -> Result<Option<PermissionRecord>>;

    /// 주어진 역할들에 할당된 권한 레코드 (중복 제거, `sort`, `id` 순).
    async fn find_permissions_by_role_ids(&self, role_ids: &[i64]) -> Result<Vec<PermissionRecord>>;

    async fn find_children(&self, id: i64) -> Result<Vec<PermissionRecord>>;

    /// 권한 레코드를 할당받은 역할.
    async fn find_roles_by_permission(&self, id: i64) -> Result<Vec<Role>>;

    async fn find_permission_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PermissionRecord>>;

    /// 새 트랜잭션을 시작합니다.
    async fn begin(&self) -> Result<Box<dyn PermissionTx>>;
}

/// 역할·권한 변경 트랜잭션.
#[async_trait]
pub trait PermissionTx: Send {
    async fn insert_role(&mut self, role: &NewRole) -> Result<Role>;

    async fn update_role(&mut self, role: &Role) -> Result<()>;

    /// 역할과 역할-권한, 사용자-역할 연결을 함께 삭제합니다.
    async fn delete_role(&mut self, role_id: i64) -> Result<()>;

    /// 역할의 권한 할당을 주어진 목록으로 교체합니다.
    async fn replace_role_permissions(&mut self, role_id: i64, permission_ids: &[i64])
        -> Result<()>;

    async fn insert_permission(&mut self, permission: &NewPermission) -> Result<PermissionRecord>;

    async fn update_permission(&mut self, record: &PermissionRecord) -> Result<()>;

    async fn delete_permissions(&mut self, ids: &[i64]) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 관리 백엔드가 사용하는 저장소 전체.
pub trait AdminStore: IdentityStore + PermissionStore {}

impl<T: IdentityStore + PermissionStore> AdminStore for T {}
