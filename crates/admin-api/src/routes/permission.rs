//! 메뉴/역할 관리 endpoint.
//!
//! 모든 변경은 [`PermissionSynchronizer`](crate::rbac::PermissionSynchronizer)를
//! 거쳐 정책 규칙과 함께 반영됩니다.

use std::sync::Arc;

use admin_core::{AdminError, MenuNode, NewPermission, NewRole, PermissionRecord, Role};
use admin_data::IdentityStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::deadline::bounded;
use crate::error::ApiResult;
use crate::rbac::SyncEvent;
use crate::state::AppState;

/// 역할 권한 할당 요청.
#[derive(Debug, Deserialize)]
pub struct AssignMenusRequest {
    pub menu_ids: Vec<i64>,
}

/// 역할 권한 할당 응답.
#[derive(Debug, Serialize)]
pub struct RoleMenusResponse {
    pub role_id: i64,
    pub menu_ids: Vec<i64>,
}

/// `"3,4,5"` 형식의 id 목록을 파싱합니다.
pub fn parse_ids(raw: &str) -> Result<Vec<i64>, AdminError> {
    let ids = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| AdminError::InvalidInput(format!("invalid id: {part}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(AdminError::InvalidInput("no ids".to_string()));
    }
    Ok(ids)
}

/// 전체 메뉴 트리.
///
/// GET /api/permission/menu/tree
pub async fn menu_tree(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MenuNode>>> {
    Ok(Json(state.menus.full_tree().await?))
}

/// 메뉴 생성.
///
/// POST /api/permission/menu
pub async fn create_menu(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPermission>,
) -> ApiResult<(StatusCode, Json<PermissionRecord>)> {
    let record = state.synchronizer.create_permission(req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// 메뉴 수정.
///
/// PUT /api/permission/menu/{id}
pub async fn update_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<NewPermission>,
) -> ApiResult<Json<PermissionRecord>> {
    let record = req.into_record(id);
    state
        .synchronizer
        .sync(SyncEvent::MenuUpdated(record.clone()))
        .await?;
    Ok(Json(record))
}

/// 메뉴 삭제.
///
/// DELETE /api/permission/menu/{ids}
pub async fn delete_menus(
    State(state): State<Arc<AppState>>,
    Path(ids): Path<String>,
) -> ApiResult<StatusCode> {
    let ids = parse_ids(&ids)?;
    state.synchronizer.sync(SyncEvent::MenuDeleted(ids)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 역할 목록.
///
/// GET /api/permission/role
pub async fn list_roles(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Role>>> {
    let roles = bounded(
        state.store_timeout,
        "find_all_roles",
        state.store.find_all_roles(),
    )
    .await?;
    Ok(Json(roles))
}

/// 역할 생성.
///
/// POST /api/permission/role
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewRole>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state.synchronizer.create_role(req).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// 역할 수정.
///
/// PUT /api/permission/role/{id}
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<NewRole>,
) -> ApiResult<Json<Role>> {
    let role = state.synchronizer.update_role(req.into_role(id)).await?;
    Ok(Json(role))
}

/// 역할 삭제.
///
/// DELETE /api/permission/role/{id}
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.synchronizer.sync(SyncEvent::RoleDeleted(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 역할에 할당된 메뉴 id.
///
/// GET /api/permission/role/{id}/menus
pub async fn role_menus(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RoleMenusResponse>> {
    let menu_ids = state.menus.role_menu_ids(id).await?;
    Ok(Json(RoleMenusResponse {
        role_id: id,
        menu_ids,
    }))
}

/// 역할 권한 할당.
///
/// PUT /api/permission/role/{id}/menus
pub async fn assign_role_menus(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AssignMenusRequest>,
) -> ApiResult<StatusCode> {
    state
        .synchronizer
        .sync(SyncEvent::RolePermissionsAssigned {
            role_id: id,
            permission_ids: req.menu_ids,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn permission_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/menu/tree", get(menu_tree))
        .route("/menu", post(create_menu))
        // 삭제는 쉼표로 구분된 id 목록을 받음
        .route("/menu/{id}", put(update_menu).delete(delete_menus))
        .route("/role", get(list_roles).post(create_role))
        .route("/role/{id}", put(update_role).delete(delete_role))
        .route("/role/{id}/menus", get(role_menus).put(assign_role_menus))
}
