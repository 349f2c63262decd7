//! # Admin Core
//!
//! RBAC 관리 백엔드의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 권한/세션 서브시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 역할(Role), 권한 레코드(PermissionRecord) 도메인 모델
//! - 정책 규칙 값 타입 (RoleCode, ResourcePath, HttpVerb)
//! - 권한 식별자 → (경로, 메서드) 변환
//! - 메뉴 트리 구성 및 순환 검사
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod rule;
pub mod tree;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use rule::*;
pub use tree::*;
