use serde::{Deserialize, Serialize};

use super::Status;
use crate::rule::{is_super_admin, RoleCode};

/// 역할.
///
/// `code`는 정책 규칙의 subject로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub code: RoleCode,
    pub name: String,
    pub status: Status,
    pub sort: i32,
    #[serde(default)]
    pub remark: String,
}

impl Role {
    /// 슈퍼 관리자 역할인지 확인합니다.
    pub fn is_super_admin(&self) -> bool {
        is_super_admin(&self.code)
    }

    /// 정책 평가 대상인지 확인합니다 (비활성 역할은 제외).
    pub fn is_active(&self) -> bool {
        self.status.is_enabled()
    }
}

/// 생성할 역할.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub code: RoleCode,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub remark: String,
}

impl NewRole {
    pub fn new(code: RoleCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            status: Status::Enabled,
            sort: 0,
            remark: String::new(),
        }
    }

    /// 저장소가 부여한 id로 역할을 완성합니다.
    pub fn into_role(self, id: i64) -> Role {
        Role {
            id,
            code: self.code,
            name: self.name,
            status: self.status,
            sort: self.sort,
            remark: self.remark,
        }
    }
}
