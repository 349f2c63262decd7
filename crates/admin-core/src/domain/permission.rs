use serde::{Deserialize, Serialize};

use super::Status;
use crate::error::AdminError;

/// 루트 레코드의 `parent_id`.
pub const ROOT_PARENT_ID: i64 = 0;

/// 메뉴 레코드 종류.
///
/// 버튼만 정책 규칙을 생성합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuKind {
    Page,
    Link,
    Iframe,
    Button,
}

impl MenuKind {
    pub fn as_i16(&self) -> i16 {
        match self {
            MenuKind::Page => 1,
            MenuKind::Link => 2,
            MenuKind::Iframe => 3,
            MenuKind::Button => 4,
        }
    }

    pub fn from_i16(value: i16) -> Result<Self, AdminError> {
        match value {
            1 => Ok(MenuKind::Page),
            2 => Ok(MenuKind::Link),
            3 => Ok(MenuKind::Iframe),
            4 => Ok(MenuKind::Button),
            other => Err(AdminError::InvalidInput(format!("unknown menu kind: {}", other))),
        }
    }
}

/// 권한 레코드 (메뉴 트리 노드).
///
/// `identifier`는 `module:resource:action[:sub]` 형식의 권한 식별자입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: i64,
    pub parent_id: i64,
    pub identifier: String,
    pub kind: MenuKind,
    pub title: String,
    pub status: Status,
    pub sort: i32,
}

/// 생성할 권한 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    #[serde(default)]
    pub parent_id: i64,
    pub identifier: String,
    pub kind: MenuKind,
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub sort: i32,
}

impl NewPermission {
    /// 저장소가 부여한 id로 레코드를 완성합니다.
    pub fn into_record(self, id: i64) -> PermissionRecord {
        PermissionRecord {
            id,
            parent_id: self.parent_id,
            identifier: self.identifier,
            kind: self.kind,
            title: self.title,
            status: self.status,
            sort: self.sort,
        }
    }
}
