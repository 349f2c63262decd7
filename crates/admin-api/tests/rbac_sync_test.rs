//! 관계형 저장소와 정책 규칙 동기화 통합 테스트.

use std::sync::Arc;
use std::time::Duration;

use admin_api::rbac::{PermissionSynchronizer, PolicyEnforcer, SyncEvent};
use admin_core::{
    AdminError, MenuKind, NewPermission, NewRole, PermissionRecord, Role, RoleCode, Status,
};
use admin_data::{MemoryStore, PermissionStore};

struct Fixture {
    store: MemoryStore,
    enforcer: Arc<PolicyEnforcer>,
    sync: PermissionSynchronizer,
}

async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let enforcer = Arc::new(PolicyEnforcer::new().await.unwrap());
    let sync = PermissionSynchronizer::new(
        Arc::new(store.clone()),
        enforcer.clone(),
        Duration::from_secs(1),
    );
    Fixture {
        store,
        enforcer,
        sync,
    }
}

fn record(parent_id: i64, identifier: &str, kind: MenuKind) -> NewPermission {
    NewPermission {
        parent_id,
        identifier: identifier.to_string(),
        kind,
        title: identifier.to_string(),
        status: Status::Enabled,
        sort: 0,
    }
}

fn code(value: &str) -> Vec<RoleCode> {
    vec![RoleCode::new(value).unwrap()]
}

/// `editor` 역할과 사용자 관리 메뉴(페이지 + 버튼 3개).
async fn seed(f: &Fixture) -> (Role, Vec<PermissionRecord>) {
    let role = f
        .sync
        .create_role(NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
        .await
        .unwrap();
    let page = f
        .sync
        .create_permission(record(0, "system:user", MenuKind::Page))
        .await
        .unwrap();
    let mut records = vec![page.clone()];
    for identifier in ["system:user:list", "system:user:update", "system:user:delete"] {
        records.push(
            f.sync
                .create_permission(record(page.id, identifier, MenuKind::Button))
                .await
                .unwrap(),
        );
    }
    (role, records)
}

#[tokio::test]
async fn assignment_installs_button_rules_only() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

    f.sync
        .sync(SyncEvent::RolePermissionsAssigned {
            role_id: role.id,
            permission_ids: ids,
        })
        .await
        .unwrap();

    // 페이지는 규칙을 만들지 않음
    assert_eq!(f.enforcer.len().await, 3);
    let editor = code("editor");
    assert!(f.enforcer.authorize(&editor, "/api/system/user", "GET").await.unwrap());
    assert!(f.enforcer.authorize(&editor, "/api/system/user/7", "PUT").await.unwrap());
    assert!(f.enforcer.authorize(&editor, "/api/system/user/7,8", "DELETE").await.unwrap());
    assert!(!f.enforcer.authorize(&editor, "/api/system/user", "POST").await.unwrap());
    assert!(!f.enforcer.authorize(&code("viewer"), "/api/system/user", "GET").await.unwrap());
}

#[tokio::test]
async fn failed_commit_leaves_rules_and_relations_unchanged() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let all: Vec<i64> = records.iter().map(|r| r.id).collect();

    f.sync.assign_role_permissions(role.id, all.clone()).await.unwrap();
    let rules_before = f.enforcer.rules().await;
    let mut relations_before = f.store.role_permission_ids(role.id);
    relations_before.sort_unstable();

    f.store.fail_next_commit();
    let err = f
        .sync
        .assign_role_permissions(role.id, vec![records[0].id])
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::StoreUnavailable(_)));

    assert_eq!(f.enforcer.rules().await, rules_before);
    let mut relations_after = f.store.role_permission_ids(role.id);
    relations_after.sort_unstable();
    assert_eq!(relations_after, relations_before);

    // 다음 시도는 정상 적용
    f.sync
        .assign_role_permissions(role.id, vec![records[0].id])
        .await
        .unwrap();
    assert!(f.enforcer.is_empty().await);
}

#[tokio::test]
async fn disabling_a_button_removes_its_rule() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let all: Vec<i64> = records.iter().map(|r| r.id).collect();
    f.sync.assign_role_permissions(role.id, all).await.unwrap();

    let mut update = records[2].clone();
    update.status = Status::Disabled;
    f.sync.sync(SyncEvent::MenuUpdated(update)).await.unwrap();

    let editor = code("editor");
    assert!(!f.enforcer.authorize(&editor, "/api/system/user/7", "PUT").await.unwrap());
    assert!(f.enforcer.authorize(&editor, "/api/system/user", "GET").await.unwrap());
    assert_eq!(f.enforcer.len().await, 2);
}

#[tokio::test]
async fn changing_an_identifier_moves_the_rule() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    f.sync
        .assign_role_permissions(role.id, vec![records[1].id])
        .await
        .unwrap();

    let mut update = records[1].clone();
    update.identifier = "system:user:export".to_string();
    f.sync.update_permission(update).await.unwrap();

    let editor = code("editor");
    assert!(!f.enforcer.authorize(&editor, "/api/system/user", "GET").await.unwrap());
    assert!(f
        .enforcer
        .authorize(&editor, "/api/system/user/export", "GET")
        .await
        .unwrap());
}

#[tokio::test]
async fn renaming_a_role_moves_its_rules() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let all: Vec<i64> = records.iter().map(|r| r.id).collect();
    f.sync.assign_role_permissions(role.id, all).await.unwrap();

    let mut renamed = role.clone();
    renamed.code = RoleCode::new("author").unwrap();
    f.sync.update_role(renamed).await.unwrap();

    assert!(f.enforcer.rules_for_subject(&RoleCode::new("editor").unwrap()).await.is_empty());
    assert_eq!(
        f.enforcer
            .rules_for_subject(&RoleCode::new("author").unwrap())
            .await
            .len(),
        3
    );
}

#[tokio::test]
async fn disabled_role_has_no_rules() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let all: Vec<i64> = records.iter().map(|r| r.id).collect();
    f.sync.assign_role_permissions(role.id, all).await.unwrap();

    let mut disabled = role.clone();
    disabled.status = Status::Disabled;
    f.sync.update_role(disabled.clone()).await.unwrap();
    assert!(f.enforcer.is_empty().await);

    disabled.status = Status::Enabled;
    f.sync.update_role(disabled).await.unwrap();
    assert_eq!(f.enforcer.len().await, 3);
}

#[tokio::test]
async fn deleting_a_parent_with_children_is_rejected() {
    let f = fixture().await;
    let (_, records) = seed(&f).await;

    let err = f
        .sync
        .sync(SyncEvent::MenuDeleted(vec![records[0].id]))
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));

    // 자식부터 삭제하면 허용
    let children: Vec<i64> = records[1..].iter().map(|r| r.id).collect();
    f.sync.sync(SyncEvent::MenuDeleted(children)).await.unwrap();
    f.sync
        .sync(SyncEvent::MenuDeleted(vec![records[0].id]))
        .await
        .unwrap();
}

#[tokio::test]
async fn assigned_permission_cannot_be_deleted() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    f.sync
        .assign_role_permissions(role.id, vec![records[1].id])
        .await
        .unwrap();

    let err = f
        .sync
        .delete_permissions(vec![records[1].id])
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));
    assert_eq!(f.enforcer.len().await, 1);
}

#[tokio::test]
async fn deleting_a_role_drops_its_rules() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let all: Vec<i64> = records.iter().map(|r| r.id).collect();
    f.sync.assign_role_permissions(role.id, all).await.unwrap();

    f.sync.sync(SyncEvent::RoleDeleted(role.id)).await.unwrap();
    assert!(f.enforcer.is_empty().await);

    let err = f.sync.delete_role(role.id).await.unwrap_err();
    assert!(matches!(err, AdminError::NotFound(_)));
}

#[tokio::test]
async fn super_admin_bypasses_rules() {
    let f = fixture().await;
    assert!(f.enforcer.is_empty().await);
    let roles = vec![RoleCode::super_admin()];
    assert!(f
        .enforcer
        .authorize(&roles, "/api/anything/at/all", "DELETE")
        .await
        .unwrap());
}

#[tokio::test]
async fn rebuild_matches_incremental_state() {
    let f = fixture().await;
    let (role, records) = seed(&f).await;
    let all: Vec<i64> = records.iter().map(|r| r.id).collect();
    f.sync.assign_role_permissions(role.id, all).await.unwrap();
    let incremental = f.enforcer.rules().await;

    let count = f.sync.rebuild().await.unwrap();
    assert_eq!(count, incremental.len());
    assert_eq!(f.enforcer.rules().await, incremental);
}

#[tokio::test]
async fn deleting_the_root_of_a_nested_menu_is_rejected() {
    let f = fixture().await;
    // 1 ─┬─ 2 ── 4
    //    └─ 3
    let root = f
        .sync
        .create_permission(record(0, "system", MenuKind::Page))
        .await
        .unwrap();
    let users = f
        .sync
        .create_permission(record(root.id, "system:user", MenuKind::Page))
        .await
        .unwrap();
    let roles = f
        .sync
        .create_permission(record(root.id, "system:role", MenuKind::Page))
        .await
        .unwrap();
    let list = f
        .sync
        .create_permission(record(users.id, "system:user:list", MenuKind::Button))
        .await
        .unwrap();

    for ids in [vec![root.id], vec![users.id], vec![root.id, users.id, roles.id, list.id]] {
        let err = f.sync.sync(SyncEvent::MenuDeleted(ids)).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
    }
    assert_eq!(f.store.find_all_permissions().await.unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assign_and_delete_never_leave_orphan_rules() {
    let f = fixture().await;
    let role = f
        .sync
        .create_role(NewRole::new(RoleCode::new("editor").unwrap(), "Editor"))
        .await
        .unwrap();
    let role_id = role.id;

    for round in 0..20 {
        let btn = f
            .sync
            .create_permission(record(0, &format!("system:dict{round}:list"), MenuKind::Button))
            .await
            .unwrap();
        let btn_id = btn.id;

        let assign = {
            let sync = f.sync.clone();
            tokio::spawn(async move { sync.assign_role_permissions(role_id, vec![btn_id]).await })
        };
        let delete = {
            let sync = f.sync.clone();
            tokio::spawn(async move { sync.delete_permissions(vec![btn_id]).await })
        };
        let assigned = assign.await.unwrap();
        let deleted = delete.await.unwrap();

        // 둘 중 정확히 하나만 성공
        match (&assigned, &deleted) {
            (Ok(()), Err(AdminError::Conflict(_))) => {
                assert_eq!(f.store.role_permission_ids(role_id), vec![btn_id]);
                assert_eq!(f.enforcer.len().await, 1);
            }
            (Err(AdminError::NotFound(_)), Ok(())) => {
                assert!(f.store.find_permission(btn_id).await.unwrap().is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // 다음 라운드를 위해 할당 해제
        f.sync.assign_role_permissions(role_id, vec![]).await.unwrap();
        assert!(f.enforcer.is_empty().await);
    }
}
