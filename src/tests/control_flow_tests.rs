//! 控制流测试
//! if/else 条件槽位与 for 循环展开

use crate::dsl::node_from_value;
use crate::error::RenderError;
use crate::renderer::{DslRenderer, Rendered, WidgetRegistry};
use serde_json::{json, Value as JsonValue};

fn create_renderer() -> DslRenderer {
    DslRenderer::new(WidgetRegistry::with_builtin_catalog())
}

fn node(value: JsonValue) -> crate::Node {
    node_from_value(value).unwrap()
}

/// 条件为真正常渲染，为假且无 else 时该槽位不产出任何东西
#[test]
fn test_if_condition() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "alert", "type": "div",
        "if": { "$exp": "d.amount > 10" },
        "children": "alert!"
    }));

    let shown = renderer.render(&tree, &json!({ "d": { "amount": 12 } })).unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].as_node().unwrap().key, "alert");

    let hidden = renderer.render(&tree, &json!({ "d": { "amount": 3 } })).unwrap();
    assert!(hidden.is_empty());
}

/// 条件为假时渲染 else 分支
#[test]
fn test_if_else_branch() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "ok-banner", "type": "div",
        "if": { "$exp": "healthy" },
        "children": "all good",
        "else": { "id": "warn-banner", "type": "div", "children": "degraded" }
    }));

    let out = renderer.render(&tree, &json!({ "healthy": false })).unwrap();
    assert_eq!(out[0].as_node().unwrap().key, "warn-banner");
    assert_eq!(out[0].as_node().unwrap().children, vec![Rendered::text("degraded")]);
}

/// 循环展开：item/index 注入迭代上下文，key 按 `id-index` 生成
#[test]
fn test_for_loop_with_index() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "row", "type": "li",
        "for": { "in": { "$exp": "tasks" }, "as": "task", "index": "i" },
        "children": "{{i}}: {{task.name}}"
    }));
    let ctx = json!({ "tasks": [{ "name": "design" }, { "name": "build" }] });

    let out = renderer.render(&tree, &ctx).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].as_node().unwrap().key, "row-0");
    assert_eq!(out[1].as_node().unwrap().key, "row-1");
    assert_eq!(out[0].as_node().unwrap().children, vec![Rendered::text("0: design")]);
    assert_eq!(out[1].as_node().unwrap().children, vec![Rendered::text("1: build")]);
}

/// 自定义循环 key：在迭代上下文里解析
#[test]
fn test_for_loop_custom_key() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "card", "type": "div",
        "for": {
            "in": { "$exp": "projects" },
            "as": "project",
            "key": { "$exp": "project.id" }
        },
        "props": { "title": { "$exp": "project.title" } }
    }));
    let ctx = json!({ "projects": [
        { "id": "p-9", "title": "Skyline" },
        { "id": "p-3", "title": "Harbor" }
    ]});

    let out = renderer.render(&tree, &ctx).unwrap();
    assert_eq!(out[0].as_node().unwrap().key, "p-9");
    assert_eq!(out[1].as_node().unwrap().key, "p-3");
    assert_eq!(out[1].as_node().unwrap().props["title"], json!("Harbor"));
}

/// for.in 解析结果不是数组是结构错误
#[test]
fn test_for_requires_array() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "row", "type": "li",
        "for": { "in": { "$exp": "tasks" }, "as": "task" }
    }));
    let err = renderer.render(&tree, &json!({ "tasks": "not-an-array" })).unwrap_err();
    assert!(matches!(err, RenderError::MalformedNode { ref id, .. } if id == "row"));
}

/// 空数组产出零个输出，顺序语义保持
#[test]
fn test_for_empty_array() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "row", "type": "li",
        "for": { "in": { "$exp": "tasks" }, "as": "task" }
    }));
    let out = renderer.render(&tree, &json!({ "tasks": [] })).unwrap();
    assert!(out.is_empty());
}

/// $bind 绑定：props 和 children 两个位置
#[test]
fn test_bind_reference() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "n", "type": "span",
        "props": { "title": { "$bind": "user.name" } },
        "children": { "$bind": "user.role" }
    }));
    let ctx = json!({ "user": { "name": "Ada", "role": "admin" } });

    let out = renderer.render(&tree, &ctx).unwrap();
    assert_eq!(out[0].as_node().unwrap().props["title"], json!("Ada"));
    assert_eq!(out[0].as_node().unwrap().children, vec![Rendered::text("admin")]);
}

/// 子序列里文本、表达式引用、节点混排，按序输出
#[test]
fn test_mixed_children_sequence() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "line", "type": "p",
        "children": [
            "Users: ",
            { "$exp": "stats.users.toLocaleString()" },
            { "id": "badge", "type": "span", "children": "live" }
        ]
    }));
    let ctx = json!({ "stats": { "users": 98765 } });

    let out = renderer.render(&tree, &ctx).unwrap();
    let children = &out[0].as_node().unwrap().children;
    assert_eq!(children[0], Rendered::text("Users: "));
    assert_eq!(children[1], Rendered::text("98,765"));
    assert_eq!(children[2].as_node().unwrap().key, "badge");
}
