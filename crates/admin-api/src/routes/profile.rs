//! 로그인 사용자 정보 endpoint.

use std::sync::Arc;

use admin_core::MenuNode;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// 현재 사용자 정보.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
}

/// 현재 사용자 정보.
///
/// GET /api/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<ProfileResponse>> {
    let roles = state.menus.active_role_codes(user.claims.user_id).await?;
    Ok(Json(ProfileResponse {
        user_id: user.claims.user_id,
        username: user.claims.username,
        roles: roles.into_iter().map(String::from).collect(),
    }))
}

/// 사용자 메뉴 트리.
///
/// GET /api/profile/menus
pub async fn get_menus(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<MenuNode>>> {
    let tree = state.menus.user_tree(user.claims.user_id).await?;
    Ok(Json(tree))
}

pub fn profile_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_profile))
        .route("/menus", get(get_menus))
}
