//! 정책 규칙 값 타입과 권한 식별자 변환.
//!
//! 정책 규칙은 `(subject, object, action)` 세 값으로 구성됩니다:
//! - subject: 역할 코드 ([`RoleCode`])
//! - object: 경로 템플릿 ([`ResourcePath`], `:id` 같은 자리표시자 포함)
//! - action: HTTP 메서드 ([`HttpVerb`])
//!
//! 모든 값 타입은 생성 시점에 구조를 검증하므로, 잘못된 값이
//! 정책 저장소까지 흘러가지 않습니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{MenuKind, PermissionRecord};
use crate::error::AdminError;

/// 슈퍼 관리자 역할 코드.
///
/// 이 코드를 가진 역할은 규칙 조회 없이 모든 요청이 허용됩니다.
pub const SUPER_ADMIN_CODE: &str = "SuperAdmin";

/// 역할 코드 최대 길이.
pub const ROLE_CODE_MAX_LEN: usize = 64;

// ==================== RoleCode ====================

/// 검증된 역할 코드.
///
/// 비어 있지 않고, 64자 이하이며, 공백과 `:`를 포함하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleCode(String);

impl RoleCode {
    /// 역할 코드를 검증하여 생성합니다.
    pub fn new(code: impl Into<String>) -> Result<Self, AdminError> {
        let code = code.into();
        if code.is_empty() {
            return Err(AdminError::InvalidInput("role code is empty".to_string()));
        }
        if code.chars().count() > ROLE_CODE_MAX_LEN {
            return Err(AdminError::InvalidInput(format!(
                "role code exceeds {} characters",
                ROLE_CODE_MAX_LEN
            )));
        }
        if code.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(AdminError::InvalidInput(format!(
                "role code contains whitespace or ':': {}",
                code
            )));
        }
        Ok(Self(code))
    }

    /// 슈퍼 관리자 역할 코드.
    pub fn super_admin() -> Self {
        Self(SUPER_ADMIN_CODE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 슈퍼 관리자 여부를 확인합니다.
///
/// 우회(bypass) 판단은 반드시 이 함수를 통해 이루어집니다.
pub fn is_super_admin(code: &RoleCode) -> bool {
    code.0 == SUPER_ADMIN_CODE
}

impl TryFrom<String> for RoleCode {
    type Error = AdminError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleCode> for String {
    fn from(code: RoleCode) -> Self {
        code.0
    }
}

impl FromStr for RoleCode {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==================== ResourcePath ====================

/// 검증된 경로 템플릿.
///
/// `/`로 시작하고, 빈 세그먼트가 없으며, 각 세그먼트는
/// `[A-Za-z0-9_.-]+`, 자리표시자 `:name`, 또는 `*` 중 하나입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// 경로 템플릿을 검증하여 생성합니다.
    pub fn new(path: impl Into<String>) -> Result<Self, AdminError> {
        let path = path.into();
        let rest = path.strip_prefix('/').ok_or_else(|| {
            AdminError::InvalidInput(format!("path must start with '/': {}", path))
        })?;

        for segment in rest.split('/') {
            if !is_valid_segment(segment) {
                return Err(AdminError::InvalidInput(format!(
                    "invalid path segment '{}' in {}",
                    segment, path
                )));
            }
        }

        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_valid_segment(segment: &str) -> bool {
    if segment == "*" {
        return true;
    }
    if let Some(name) = segment.strip_prefix(':') {
        return !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    }
    !segment.is_empty() && segment.chars().all(is_literal_char)
}

impl TryFrom<String> for ResourcePath {
    type Error = AdminError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==================== HttpVerb ====================

/// 정책 규칙의 action (HTTP 메서드).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }
}

impl FromStr for HttpVerb {
    type Err = AdminError;

    /// 대소문자를 구분하지 않습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            _ => Err(AdminError::InvalidInput(format!("unsupported method: {}", s))),
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== PolicyRule ====================

/// 정책 규칙 `(subject, object, action)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: RoleCode,
    pub object: ResourcePath,
    pub action: HttpVerb,
}

impl PolicyRule {
    pub fn new(subject: RoleCode, object: ResourcePath, action: HttpVerb) -> Self {
        Self {
            subject,
            object,
            action,
        }
    }

    /// 정책 저장소 형식 `[sub, obj, act]`으로 변환합니다.
    pub fn to_policy(&self) -> Vec<String> {
        vec![
            self.subject.as_str().to_string(),
            self.object.as_str().to_string(),
            self.action.as_str().to_string(),
        ]
    }

    /// 정책 저장소 형식 `[sub, obj, act]`에서 복원합니다.
    pub fn from_policy(values: &[String]) -> Result<Self, AdminError> {
        match values {
            [sub, obj, act] => Ok(Self {
                subject: RoleCode::new(sub.as_str())?,
                object: ResourcePath::new(obj.as_str())?,
                action: act.parse()?,
            }),
            _ => Err(AdminError::Internal(format!(
                "policy must have 3 fields, got {}",
                values.len()
            ))),
        }
    }

    /// 같은 object/action으로 subject만 바꾼 규칙.
    pub fn with_subject(&self, subject: RoleCode) -> Self {
        Self {
            subject,
            object: self.object.clone(),
            action: self.action,
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.object, self.action)
    }
}

// =========================================================================
// 권한 식별자 변환
// =========================================================================

/// 경로 접미사.
#[derive(Debug, Clone, Copy)]
enum Suffix {
    None,
    Segment(&'static str),
}

/// action → (메서드, 접미사) 고정 테이블.
fn action_route(action: &str) -> Option<(HttpVerb, Suffix)> {
    let route = match action {
        "create" | "save" => (HttpVerb::Post, Suffix::None),
        "update" => (HttpVerb::Put, Suffix::Segment(":id")),
        "delete" => (HttpVerb::Delete, Suffix::Segment(":ids")),
        "get" | "detail" => (HttpVerb::Get, Suffix::Segment(":id")),
        "list" | "index" => (HttpVerb::Get, Suffix::None),
        "enable" | "disable" | "status" => (HttpVerb::Patch, Suffix::Segment(":id")),
        "assign" | "revoke" => (HttpVerb::Post, Suffix::Segment(":id")),
        "export" => (HttpVerb::Get, Suffix::Segment("export")),
        "import" => (HttpVerb::Post, Suffix::Segment("import")),
        "batch" => (HttpVerb::Post, Suffix::Segment("batch")),
        "upload" => (HttpVerb::Post, Suffix::Segment("upload")),
        "tree" => (HttpVerb::Get, Suffix::Segment("tree")),
        "set" => (HttpVerb::Put, Suffix::Segment(":id")),
        _ => return None,
    };
    Some(route)
}

/// 권한 식별자를 `(경로 템플릿, 메서드)`로 변환합니다.
///
/// 식별자 형식: `module:resource:action[:sub]`
///
/// 결과 경로: `/api/{module}/{resource}[/{suffix}][/{sub}]`
///
/// 세그먼트 수가 3 또는 4가 아니거나, 빈 세그먼트가 있거나,
/// 알 수 없는 action이거나, 결과 경로가 유효하지 않으면 `None`을 반환합니다.
///
/// # Examples
///
/// ```
/// use admin_core::rule::{translate, HttpVerb};
///
/// let (path, verb) = translate("system:role:get:menus").unwrap();
/// assert_eq!(path.as_str(), "/api/system/role/:id/menus");
/// assert_eq!(verb, HttpVerb::Get);
/// ```
pub fn translate(identifier: &str) -> Option<(ResourcePath, HttpVerb)> {
    let parts: Vec<&str> = identifier.split(':').collect();
    if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let (module, resource, action) = (parts[0], parts[1], parts[2]);
    let sub = parts.get(3).copied();
    let (verb, suffix) = action_route(action)?;

    let mut path = format!("/api/{}/{}", module, resource);
    if let Suffix::Segment(segment) = suffix {
        path.push('/');
        path.push_str(segment);
    }
    if let Some(sub) = sub {
        path.push('/');
        path.push_str(sub);
    }

    ResourcePath::new(path).ok().map(|path| (path, verb))
}

/// 역할과 권한 레코드로부터 정책 규칙을 만듭니다.
///
/// 활성화된 버튼 레코드만 규칙을 생성합니다.
pub fn rule_for(role: &RoleCode, record: &PermissionRecord) -> Option<PolicyRule> {
    if record.kind != MenuKind::Button || !record.status.is_enabled() {
        return None;
    }
    translate(&record.identifier).map(|(path, verb)| PolicyRule::new(role.clone(), path, verb))
}
