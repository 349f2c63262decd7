//! 정책 기반 접근 제어.
//!
//! casbin 인메모리 enforcer를 `RwLock`으로 감싸 사용합니다. 규칙은
//! `(역할 코드, 경로 패턴, 메서드)` 세 값이며, 경로의 `:id` 같은
//! 플레이스홀더는 `keyMatch2`로 한 세그먼트와 매칭됩니다.
//!
//! 규칙 변경은 [`PolicyBatch`]로 묶어 수행합니다. 배치는 쓰기 잠금을
//! 잡고 있으므로, 읽는 쪽은 절반만 적용된 규칙 집합을 보지 않습니다.

use std::collections::HashSet;

use admin_core::{is_super_admin, AdminError, AdminResult, HttpVerb, PolicyRule, RoleCode};
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

const MODEL_CONF: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && keyMatch2(r.obj, p.obj) && r.act == p.act
"#;

fn casbin_error(err: casbin::Error) -> AdminError {
    AdminError::Internal(format!("policy engine: {err}"))
}

/// 정렬된 규칙 목록.
fn parse_rules(raw: Vec<Vec<String>>) -> Vec<PolicyRule> {
    let mut rules: Vec<PolicyRule> = raw
        .into_iter()
        .filter_map(|values| match PolicyRule::from_policy(&values) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(?values, error = %e, "Skipping invalid policy rule");
                None
            }
        })
        .collect();
    rules.sort();
    rules
}

/// 정책 enforcer.
pub struct PolicyEnforcer {
    inner: RwLock<Enforcer>,
}

impl PolicyEnforcer {
    /// 빈 규칙 집합으로 생성합니다.
    pub async fn new() -> AdminResult<Self> {
        let model = DefaultModel::from_str(MODEL_CONF)
            .await
            .map_err(casbin_error)?;
        let enforcer = Enforcer::new(model, MemoryAdapter::default())
            .await
            .map_err(casbin_error)?;
        Ok(Self {
            inner: RwLock::new(enforcer),
        })
    }

    /// 주어진 규칙으로 생성합니다.
    pub async fn with_rules(rules: &[PolicyRule]) -> AdminResult<Self> {
        let this = Self::new().await?;
        for rule in rules {
            this.add_rule(rule).await?;
        }
        Ok(this)
    }

    /// 단일 역할에 대한 규칙 평가.
    pub async fn enforce(&self, role: &RoleCode, path: &str, verb: HttpVerb) -> AdminResult<bool> {
        let enforcer = self.inner.read().await;
        enforcer
            .enforce((role.as_str(), path, verb.as_str()))
            .map_err(casbin_error)
    }

    /// 역할 목록으로 요청을 인가합니다.
    ///
    /// 슈퍼 관리자 역할이 있으면 규칙을 보지 않고 허용합니다.
    /// 그 외에는 역할별로 평가하며 첫 번째 허용에서 멈춥니다.
    pub async fn authorize(
        &self,
        roles: &[RoleCode],
        path: &str,
        method: &str,
    ) -> AdminResult<bool> {
        if roles.iter().any(is_super_admin) {
            debug!(path, method, "Super admin bypass");
            return Ok(true);
        }

        let Ok(verb) = method.parse::<HttpVerb>() else {
            debug!(method, "Unsupported method");
            return Ok(false);
        };

        let enforcer = self.inner.read().await;
        for role in roles {
            let allowed = enforcer
                .enforce((role.as_str(), path, verb.as_str()))
                .map_err(casbin_error)?;
            if allowed {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn add_rule(&self, rule: &PolicyRule) -> AdminResult<bool> {
        let mut enforcer = self.inner.write().await;
        enforcer
            .add_policy(rule.to_policy())
            .await
            .map_err(casbin_error)
    }

    pub async fn remove_rule(&self, rule: &PolicyRule) -> AdminResult<bool> {
        let mut enforcer = self.inner.write().await;
        enforcer
            .remove_policy(rule.to_policy())
            .await
            .map_err(casbin_error)
    }

    pub async fn remove_all_rules_for_subject(&self, role: &RoleCode) -> AdminResult<bool> {
        let mut enforcer = self.inner.write().await;
        remove_subject(&mut enforcer, role).await
    }

    /// 현재 규칙 전체.
    pub async fn rules(&self) -> Vec<PolicyRule> {
        parse_rules(self.inner.read().await.get_policy())
    }

    pub async fn rules_for_subject(&self, role: &RoleCode) -> Vec<PolicyRule> {
        let enforcer = self.inner.read().await;
        parse_rules(enforcer.get_filtered_policy(0, vec![role.as_str().to_string()]))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.get_policy().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 쓰기 잠금과 현재 규칙 스냅샷을 잡은 배치를 시작합니다.
    pub async fn batch(&self) -> PolicyBatch<'_> {
        let guard = self.inner.write().await;
        let snapshot = guard.get_policy();
        PolicyBatch {
            guard,
            snapshot,
            dirty: false,
        }
    }
}

async fn remove_subject(enforcer: &mut Enforcer, role: &RoleCode) -> AdminResult<bool> {
    if enforcer
        .get_filtered_policy(0, vec![role.as_str().to_string()])
        .is_empty()
    {
        return Ok(false);
    }
    enforcer
        .remove_filtered_policy(0, vec![role.as_str().to_string()])
        .await
        .map_err(casbin_error)
}

/// 규칙 변경 배치.
///
/// `commit` 또는 `rollback`으로 끝내야 합니다. 변경 후 어느 쪽도 호출하지
/// 않고 drop하면 변경 내용은 그대로 남습니다.
pub struct PolicyBatch<'a> {
    guard: RwLockWriteGuard<'a, Enforcer>,
    snapshot: Vec<Vec<String>>,
    dirty: bool,
}

impl PolicyBatch<'_> {
    /// 역할의 모든 규칙을 제거합니다.
    pub async fn remove_subject(&mut self, role: &RoleCode) -> AdminResult<()> {
        self.dirty = true;
        remove_subject(&mut self.guard, role).await?;
        Ok(())
    }

    pub async fn remove(&mut self, rule: &PolicyRule) -> AdminResult<()> {
        self.dirty = true;
        self.guard
            .remove_policy(rule.to_policy())
            .await
            .map_err(casbin_error)?;
        Ok(())
    }

    pub async fn add(&mut self, rule: &PolicyRule) -> AdminResult<()> {
        self.dirty = true;
        self.guard
            .add_policy(rule.to_policy())
            .await
            .map_err(casbin_error)?;
        Ok(())
    }

    /// `from` 역할의 규칙을 모두 `to` 역할로 옮깁니다.
    pub async fn rename_subject(&mut self, from: &RoleCode, to: &RoleCode) -> AdminResult<()> {
        let rules = parse_rules(
            self.guard
                .get_filtered_policy(0, vec![from.as_str().to_string()]),
        );
        self.remove_subject(from).await?;
        for rule in rules {
            self.add(&rule.with_subject(to.clone())).await?;
        }
        Ok(())
    }

    /// 규칙 집합 전체를 교체합니다.
    pub async fn replace_all(&mut self, rules: &[PolicyRule]) -> AdminResult<()> {
        self.dirty = true;
        let current = self.guard.get_policy();
        if !current.is_empty() {
            self.guard
                .remove_policies(current)
                .await
                .map_err(casbin_error)?;
        }
        for rule in rules {
            self.add(rule).await?;
        }
        Ok(())
    }

    /// 배치 시작 시점의 규칙 집합으로 되돌립니다.
    pub async fn rollback(mut self) -> AdminResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let current = self.guard.get_policy();
        let snapshot: HashSet<&Vec<String>> = self.snapshot.iter().collect();
        let present: HashSet<&Vec<String>> = current.iter().collect();

        let extra: Vec<Vec<String>> = current
            .iter()
            .filter(|p| !snapshot.contains(p))
            .cloned()
            .collect();
        let missing: Vec<Vec<String>> = self
            .snapshot
            .iter()
            .filter(|p| !present.contains(p))
            .cloned()
            .collect();

        for policy in extra {
            self.guard
                .remove_policy(policy)
                .await
                .map_err(casbin_error)?;
        }
        for policy in missing {
            self.guard.add_policy(policy).await.map_err(casbin_error)?;
        }
        debug!(rules = self.snapshot.len(), "Policy batch rolled back");
        Ok(())
    }

    /// 변경 내용을 확정하고 쓰기 잠금을 해제합니다.
    pub fn commit(self) {
        debug!(rules = self.guard.get_policy().len(), "Policy batch committed");
    }
}
