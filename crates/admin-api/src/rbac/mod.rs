//! 역할 기반 접근 제어.
//!
//! - [`PolicyEnforcer`]: casbin 기반 규칙 평가와 배치 변경
//! - [`PermissionSynchronizer`]: 메뉴/역할 변경과 규칙 동기화
//! - [`PolicyReloader`]: 규칙 주기적 재적재
//! - [`MenuService`]: 사용자별 메뉴 트리
//! - [`require_permission`]: Axum 인가 미들웨어

mod enforcer;
mod menu;
mod middleware;
mod reload;
mod sync;

pub use enforcer::{PolicyBatch, PolicyEnforcer};
pub use menu::MenuService;
pub use middleware::require_permission;
pub use reload::PolicyReloader;
pub use sync::{PermissionSynchronizer, SyncEvent};
