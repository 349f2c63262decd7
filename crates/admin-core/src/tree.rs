//! 메뉴 트리 구성과 순환 검사.
//!
//! 평면 권한 레코드 목록을 `parent_id` 기준으로 트리로 구성합니다.
//! 형제 노드는 입력 순서를 유지합니다.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::{PermissionRecord, ROOT_PARENT_ID};

/// 메뉴 트리 노드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    #[serde(flatten)]
    pub record: PermissionRecord,
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    /// 이 노드를 포함한 하위 노드 수.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(MenuNode::count).sum::<usize>()
    }
}

/// 평면 레코드 목록으로 트리를 구성합니다.
///
/// `root_parent_id`를 부모로 가진 레코드가 최상위 노드가 됩니다.
/// 루트에서 도달할 수 없는 레코드는 결과에 포함되지 않습니다.
pub fn build_tree(records: &[PermissionRecord], root_parent_id: i64) -> Vec<MenuNode> {
    let mut children_of: HashMap<i64, Vec<usize>> = HashMap::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        children_of.entry(record.parent_id).or_default().push(idx);
    }

    let mut visited = vec![false; records.len()];
    attach(records, &children_of, root_parent_id, &mut visited)
}

fn attach(
    records: &[PermissionRecord],
    children_of: &HashMap<i64, Vec<usize>>,
    parent_id: i64,
    visited: &mut [bool],
) -> Vec<MenuNode> {
    let Some(indices) = children_of.get(&parent_id) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(indices.len());
    for &idx in indices {
        // 자기 자신을 부모로 가진 레코드 등 비정상 입력에서 무한 재귀 방지
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        let record = &records[idx];
        let children = attach(records, children_of, record.id, visited);
        nodes.push(MenuNode {
            record: record.clone(),
            children,
        });
    }
    nodes
}

/// `id`의 부모를 `new_parent`로 바꾸면 순환이 생기는지 확인합니다.
///
/// `new_parent`에서 루트 방향으로 부모 체인을 따라가며 `id`를 만나면
/// 순환입니다. 기존 데이터에 이미 순환이 있어도 종료합니다.
pub fn would_create_cycle(records: &[PermissionRecord], id: i64, new_parent: i64) -> bool {
    if new_parent == id {
        return true;
    }

    let arena: HashMap<i64, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (record.id, idx))
        .collect();

    let mut visited = HashSet::new();
    let mut current = new_parent;
    loop {
        if current == ROOT_PARENT_ID {
            return false;
        }
        if current == id || !visited.insert(current) {
            return true;
        }
        match arena.get(&current) {
            Some(&idx) => current = records[idx].parent_id,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MenuKind, Status};
    use proptest::prelude::*;

    fn record(id: i64, parent_id: i64) -> PermissionRecord {
        PermissionRecord {
            id,
            parent_id,
            identifier: format!("menu:{}:list", id),
            kind: MenuKind::Page,
            title: format!("menu {}", id),
            status: Status::Enabled,
            sort: 0,
        }
    }

    fn ids(nodes: &[MenuNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.record.id).collect()
    }

    #[test]
    fn test_build_tree_example() {
        let records = vec![record(1, 0), record(2, 1), record(3, 1), record(4, 2)];
        let tree = build_tree(&records, 0);

        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(ids(&tree[0].children), vec![2, 3]);
        assert_eq!(ids(&tree[0].children[0].children), vec![4]);
        assert!(tree[0].children[0].children[0].children.is_empty());
        assert!(tree[0].children[1].children.is_empty());
        assert_eq!(tree[0].count(), 4);

        assert!(build_tree(&records, 99).is_empty());
    }

    #[test]
    fn test_build_tree_siblings_at_root() {
        let records = vec![record(1, 0), record(2, 1), record(3, 1), record(4, 0)];
        let tree = build_tree(&records, 0);
        assert_eq!(ids(&tree), vec![1, 4]);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_build_tree_preserves_input_order() {
        let records = vec![record(5, 0), record(3, 5), record(1, 0), record(9, 5)];
        let tree = build_tree(&records, 0);
        assert_eq!(ids(&tree), vec![5, 1]);
        assert_eq!(ids(&tree[0].children), vec![3, 9]);
    }

    #[test]
    fn test_build_tree_drops_unreachable_and_self_parent() {
        let records = vec![record(1, 0), record(2, 42), record(0, 0)];
        let tree = build_tree(&records, 0);
        // id 0 레코드는 루트 부모와 같은 id를 가지므로 한 번만 붙는다
        let total: usize = tree.iter().map(MenuNode::count).sum();
        assert_eq!(total, 2);
        assert!(!ids(&tree).contains(&2));
    }

    #[test]
    fn test_build_tree_subtree_root() {
        let records = vec![record(1, 0), record(2, 1), record(3, 2)];
        let tree = build_tree(&records, 1);
        assert_eq!(ids(&tree), vec![2]);
        assert_eq!(ids(&tree[0].children), vec![3]);
    }

    #[test]
    fn test_would_create_cycle() {
        let records = vec![record(1, 0), record(2, 1), record(3, 2), record(4, 0)];

        assert!(would_create_cycle(&records, 1, 1));
        assert!(would_create_cycle(&records, 1, 3));
        assert!(would_create_cycle(&records, 2, 3));
        assert!(!would_create_cycle(&records, 3, 4));
        assert!(!would_create_cycle(&records, 4, 3));
        assert!(!would_create_cycle(&records, 2, 0));
    }

    #[test]
    fn test_would_create_cycle_terminates_on_existing_cycle() {
        let records = vec![record(1, 2), record(2, 1), record(3, 0)];
        assert!(would_create_cycle(&records, 3, 1));
    }

    /// `parent_id < id` 조건으로 생성한 비순환 레코드 집합.
    fn forest() -> impl Strategy<Value = Vec<PermissionRecord>> {
        prop::collection::vec(any::<prop::sample::Index>(), 0..40).prop_map(|picks| {
            picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let id = i as i64 + 1;
                    let parent = pick.index(id as usize) as i64;
                    record(id, parent)
                })
                .collect()
        })
    }

    fn check_links(nodes: &[MenuNode], parent_id: i64) -> bool {
        nodes
            .iter()
            .all(|n| n.record.parent_id == parent_id && check_links(&n.children, n.record.id))
    }

    proptest! {
        #[test]
        fn prop_tree_contains_every_acyclic_record(records in forest()) {
            let tree = build_tree(&records, 0);
            let total: usize = tree.iter().map(MenuNode::count).sum();
            prop_assert_eq!(total, records.len());
            prop_assert!(check_links(&tree, 0));
        }

        #[test]
        fn prop_reparenting_under_descendant_is_cycle(records in forest()) {
            for r in &records {
                if r.parent_id != 0 {
                    prop_assert!(would_create_cycle(&records, r.parent_id, r.id));
                }
                prop_assert!(!would_create_cycle(&records, r.id, 0));
            }
        }
    }
}
