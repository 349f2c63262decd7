//! 메뉴 레코드 → 트리/정책 규칙 통합 테스트.

use admin_core::{
    build_tree, rule_for, HttpVerb, MenuKind, PermissionRecord, RoleCode, Status,
};

fn menu(id: i64, parent_id: i64, identifier: &str, kind: MenuKind) -> PermissionRecord {
    PermissionRecord {
        id,
        parent_id,
        identifier: identifier.to_string(),
        kind,
        title: identifier.to_string(),
        status: Status::Enabled,
        sort: id as i32,
    }
}

fn seed() -> Vec<PermissionRecord> {
    vec![
        menu(1, 0, "permission", MenuKind::Page),
        menu(2, 1, "permission:menu", MenuKind::Page),
        menu(3, 2, "permission:menu:tree", MenuKind::Button),
        menu(4, 2, "permission:menu:update", MenuKind::Button),
        menu(5, 2, "permission:menu:delete", MenuKind::Button),
        menu(6, 1, "permission:role", MenuKind::Page),
        menu(7, 6, "permission:role:set:menus", MenuKind::Button),
        menu(8, 0, "https://docs.example.com", MenuKind::Link),
    ]
}

#[test]
fn test_seed_tree_shape() {
    let records = seed();
    let tree = build_tree(&records, 0);

    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].record.identifier, "permission");
    assert_eq!(tree[0].children.len(), 2);
    assert_eq!(tree[0].children[0].children.len(), 3);
    assert_eq!(tree[0].children[1].children[0].record.id, 7);
    assert_eq!(tree[1].record.kind, MenuKind::Link);
}

#[test]
fn test_only_buttons_produce_rules() {
    let role = RoleCode::new("auditor").unwrap();
    let rules: Vec<_> = seed().iter().filter_map(|r| rule_for(&role, r)).collect();

    assert_eq!(rules.len(), 4);
    assert!(rules.iter().all(|r| r.subject == role));

    let set_menus = rules
        .iter()
        .find(|r| r.object.as_str() == "/api/permission/role/:id/menus")
        .expect("set:menus rule");
    assert_eq!(set_menus.action, HttpVerb::Put);

    let delete = rules
        .iter()
        .find(|r| r.action == HttpVerb::Delete)
        .expect("delete rule");
    assert_eq!(delete.object.as_str(), "/api/permission/menu/:ids");
}

#[test]
fn test_tree_serializes_flattened() {
    let records = seed();
    let tree = build_tree(&records[..3], 0);
    let json = serde_json::to_value(&tree).unwrap();

    assert_eq!(json[0]["id"], 1);
    assert_eq!(json[0]["kind"], "page");
    assert_eq!(json[0]["children"][0]["children"][0]["identifier"], "permission:menu:tree");
}
