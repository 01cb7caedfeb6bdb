//! 渲染器单元测试
//! 覆盖规格化行为：props 解析、children 归一化、key 稳定性、错误传播

use crate::dsl::node_from_value;
use crate::error::RenderError;
use crate::renderer::{DslRenderer, Rendered, WidgetRegistry};
use serde_json::{json, Value as JsonValue};

/// 创建测试用的渲染器
fn create_renderer() -> DslRenderer {
    DslRenderer::new(WidgetRegistry::with_builtin_catalog())
}

/// 辅助函数：从 JSON 值构造节点
fn node(value: JsonValue) -> crate::Node {
    node_from_value(value).unwrap()
}

/// 同样的 (node, context) 渲染两次，输出结构一致（纯函数性质）
#[test]
fn test_idempotent_render() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "root", "type": "div",
        "props": { "title": { "$exp": "a.b" } },
        "children": [
            { "id": "c1", "type": "span", "children": "{{a.b}} items" }
        ]
    }));
    let ctx = json!({ "a": { "b": 7 } });

    let first = renderer.render(&tree, &ctx).unwrap();
    let second = renderer.render(&tree, &ctx).unwrap();
    assert_eq!(first, second);
}

/// 表达式属性解析：{ $exp: "a.b" } 对 { a: { b: 7 } } 解析为 7
#[test]
fn test_expression_prop_resolution() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "n", "type": "div",
        "props": { "label": { "$exp": "a.b" } }
    }));
    let out = renderer.render(&tree, &json!({ "a": { "b": 7 } })).unwrap();
    let rendered = out[0].as_node().unwrap();
    assert_eq!(rendered.props["label"], json!(7));
}

/// children 归一化：缺省 / 文本 / 有序序列
#[test]
fn test_children_normalization() {
    let renderer = create_renderer();
    let ctx = json!({});

    let no_children = node(json!({ "id": "a", "type": "div" }));
    let out = renderer.render(&no_children, &ctx).unwrap();
    assert!(out[0].as_node().unwrap().children.is_empty());

    let text_child = node(json!({ "id": "b", "type": "p", "children": "hello" }));
    let out = renderer.render(&text_child, &ctx).unwrap();
    assert_eq!(out[0].as_node().unwrap().children, vec![Rendered::text("hello")]);

    let two_children = node(json!({
        "id": "c", "type": "ul",
        "children": [
            { "id": "c-1", "type": "li", "children": "first" },
            { "id": "c-2", "type": "li", "children": "second" }
        ]
    }));
    let out = renderer.render(&two_children, &ctx).unwrap();
    let children = &out[0].as_node().unwrap().children;
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].as_node().unwrap().key, "c-1");
    assert_eq!(children[1].as_node().unwrap().key, "c-2");
}

/// 只换上下文重渲染，key 保持不变（不触发宿主侧的销毁重建）
#[test]
fn test_stable_identity_across_context_changes() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "stats-card", "type": "div",
        "props": { "value": { "$exp": "stats.total" } }
    }));

    let first = renderer.render(&tree, &json!({ "stats": { "total": 1 } })).unwrap();
    let second = renderer.render(&tree, &json!({ "stats": { "total": 2 } })).unwrap();
    assert_eq!(first[0].as_node().unwrap().key, second[0].as_node().unwrap().key);
    assert_ne!(first[0].as_node().unwrap().props["value"],
               second[0].as_node().unwrap().props["value"]);
}

/// 未知类型：既不是已知标签也不是注册组件，必须报错而不是静默跳过
#[test]
fn test_unknown_type_failure() {
    let renderer = create_renderer();
    let tree = node(json!({ "id": "x", "type": "NOT_A_REAL_TYPE", "props": {} }));
    let err = renderer.render(&tree, &json!({})).unwrap_err();
    match err {
        RenderError::UnknownNodeType { id, node_type } => {
            assert_eq!(id, "x");
            assert_eq!(node_type, "NOT_A_REAL_TYPE");
        }
        other => panic!("expected UnknownNodeType, got {other}"),
    }
}

/// 后代求值失败会中止整个 pass，不返回部分输出
#[test]
fn test_evaluation_failure_propagates() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "root", "type": "div",
        "children": [
            { "id": "ok", "type": "span", "children": "fine" },
            { "id": "y", "type": "div", "props": { "label": { "$exp": "missingVar.foo" } } }
        ]
    }));
    let err = renderer.render(&tree, &json!({})).unwrap_err();
    match err {
        RenderError::Evaluation { id, expr, .. } => {
            assert_eq!(id, "y");
            assert_eq!(expr, "missingVar.foo");
        }
        other => panic!("expected Evaluation, got {other}"),
    }
}

/// 端到端：表达式 children 产出本地化格式的文本
#[test]
fn test_locale_formatted_text_child() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "s", "type": "p", "props": {},
        "children": { "$exp": "dashboardStats.users.toLocaleString()" }
    }));
    let ctx = json!({ "dashboardStats": { "users": 1250 } });
    let out = renderer.render(&tree, &ctx).unwrap();
    assert_eq!(out[0].as_node().unwrap().children, vec![Rendered::text("1,250")]);
}

/// 解析后的 props 保持定义顺序
#[test]
fn test_resolved_props_keep_key_order() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "n", "type": "div",
        "props": { "zeta": 1, "alpha": 2, "mid": { "$exp": "x" } }
    }));
    let out = renderer.render(&tree, &json!({ "x": 3 })).unwrap();
    let keys: Vec<&str> = out[0].as_node().unwrap().props.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

/// 字符串属性里的 {{}} 插值
#[test]
fn test_string_prop_interpolation() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "badge", "type": "span",
        "props": {
            "className": "{{d.amount > 10 ? 'bg-red-600' : 'bg-yellow-500'}} px-3 py-1"
        }
    }));
    let out = renderer.render(&tree, &json!({ "d": { "amount": 12 } })).unwrap();
    assert_eq!(
        out[0].as_node().unwrap().props["className"],
        json!("bg-red-600 px-3 py-1")
    );
}

/// 文本 children 里的插值与字面量混排
#[test]
fn test_text_child_interpolation() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "units", "type": "span",
        "children": "{{d.discrepancyAmount}} units"
    }));
    let out = renderer.render(&tree, &json!({ "d": { "discrepancyAmount": 15 } })).unwrap();
    assert_eq!(out[0].as_node().unwrap().children, vec![Rendered::text("15 units")]);
}

/// 上下文必须是对象
#[test]
fn test_context_must_be_object() {
    let renderer = create_renderer();
    let tree = node(json!({ "id": "n", "type": "div" }));
    let err = renderer.render(&tree, &json!([1, 2])).unwrap_err();
    assert!(matches!(err, RenderError::MalformedNode { .. }));
}

/// 渲染契约的字符串输入直接作为文本输出
#[test]
fn test_render_string_input() {
    let renderer = create_renderer();
    let out = renderer.render_string("Total: {{n}}", &json!({ "n": 5 })).unwrap();
    assert_eq!(out, Rendered::text("Total: 5"));
}

/// 超深的树报 DepthExceeded 而不是栈溢出
#[test]
fn test_depth_limit() {
    let renderer = create_renderer();
    let mut tree = json!({ "id": "leaf", "type": "span", "children": "deep" });
    for i in 0..80 {
        tree = json!({ "id": format!("n{i}"), "type": "div", "children": tree });
    }
    let err = renderer.render(&node(tree), &json!({})).unwrap_err();
    assert!(matches!(err, RenderError::DepthExceeded { .. }));
}

/// 输出树可序列化给宿主框架
#[test]
fn test_output_serialization() {
    let renderer = create_renderer();
    let tree = node(json!({
        "id": "root", "type": "div",
        "props": { "className": "box" },
        "children": "hi"
    }));
    let out = renderer.render(&tree, &json!({})).unwrap();
    let serialized = serde_json::to_value(&out[0]).unwrap();
    assert_eq!(serialized["key"], json!("root"));
    assert_eq!(serialized["props"]["className"], json!("box"));
    assert_eq!(serialized["children"][0], json!("hi"));
}
