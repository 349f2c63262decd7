//! RBAC 도메인 모델.

mod permission;
mod role;
mod user;

pub use permission::*;
pub use role::*;
pub use user::*;

use serde::{Deserialize, Serialize};

use crate::error::AdminError;

/// 활성화 상태.
///
/// 저장소에는 정수(`1` = 활성, `2` = 비활성)로 기록됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
}

/// 역할 상태.
pub type RoleStatus = Status;

impl Status {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Status::Enabled)
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Status::Enabled => 1,
            Status::Disabled => 2,
        }
    }

    pub fn from_i16(value: i16) -> Result<Self, AdminError> {
        match value {
            1 => Ok(Status::Enabled),
            2 => Ok(Status::Disabled),
            other => Err(AdminError::InvalidInput(format!("unknown status: {}", other))),
        }
    }
}
