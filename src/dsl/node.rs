//! DSL 节点模型 - 声明式 UI 树的数据结构

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::error::{RenderError, RenderResult};

/// 原生组件类型的前缀约定
pub const WIDGET_PREFIX: &str = "COMP_";

/// 已知的通用元素标签（小写匹配）
pub static ELEMENT_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "view", "div", "text", "span", "button", "input", "select", "option",
        "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "img", "a",
        "header", "footer", "section", "main", "label", "table", "thead",
        "tbody", "tr", "th", "td",
    ]
    .into_iter()
    .collect()
});

/// 表达式引用：`{ "$exp": "dashboardStats.users" }`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExprRef {
    #[serde(rename = "$exp")]
    pub exp: String,
}

/// 绑定引用：`{ "$bind": "a.b.c" }`
///
/// `$transform` 字段接受但忽略（原始实现同样未实现变换管线）。
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BindRef {
    #[serde(rename = "$bind")]
    pub bind: String,
    #[serde(rename = "$transform", default)]
    pub transform: Option<JsonValue>,
}

/// 属性值：字面量或表达式/绑定引用
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropValue {
    Expr(ExprRef),
    Bind(BindRef),
    Literal(JsonValue),
}

/// 子节点槽位的单个成员
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Child {
    Text(String),
    Expr(ExprRef),
    Bind(BindRef),
    Node(Box<Node>),
}

/// children 槽位：缺省 / 文本 / 引用 / 单节点 / 节点序列
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Children {
    Text(String),
    Expr(ExprRef),
    Bind(BindRef),
    One(Box<Node>),
    Many(Vec<Child>),
}

/// 循环定义：`"for": { "in": ..., "as": "item", "index": "i", "key": ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct ForDef {
    #[serde(rename = "in")]
    pub source: PropValue,
    #[serde(rename = "as")]
    pub item_name: String,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub key: Option<PropValue>,
}

/// DSL 节点
///
/// `id` 作为稳定的渲染 key，在多次渲染之间不变，
/// 避免宿主框架反复销毁重建昂贵的原生组件。
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub props: IndexMap<String, PropValue>,
    #[serde(default)]
    pub children: Option<Children>,
    #[serde(rename = "if", default)]
    pub condition: Option<PropValue>,
    #[serde(rename = "else", default)]
    pub else_branch: Option<Box<Node>>,
    #[serde(rename = "for", default)]
    pub repeat: Option<ForDef>,
    #[serde(default)]
    pub key: Option<PropValue>,
}

/// 节点分发类别：通用元素 vs 原生组件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Widget(String),
}

impl Node {
    /// 按类型字符串结构化分类，不在渲染循环里做散落的前缀判断
    pub fn kind(&self) -> NodeKind {
        if self.node_type.starts_with(WIDGET_PREFIX) {
            NodeKind::Widget(self.node_type.clone())
        } else {
            NodeKind::Element(self.node_type.to_lowercase())
        }
    }
}

/// 从 JSON 文本解析节点树
pub fn parse_node(json: &str) -> RenderResult<Node> {
    serde_json::from_str(json).map_err(|e| RenderError::MalformedNode {
        id: String::new(),
        reason: e.to_string(),
    })
}

/// 从已解析的 JSON 值构造节点树
pub fn node_from_value(value: JsonValue) -> RenderResult<Node> {
    serde_json::from_value(value).map_err(|e| RenderError::MalformedNode {
        id: String::new(),
        reason: e.to_string(),
    })
}

/// 加载期校验：在首次渲染前拒绝未知类型
///
/// 渲染期同样会检查，这里只是把错误提前到配置加载时。
pub fn validate(node: &Node, registered: &dyn Fn(&str) -> bool) -> RenderResult<()> {
    match node.kind() {
        NodeKind::Widget(name) => {
            if !registered(&name) {
                return Err(RenderError::UnknownNodeType {
                    id: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
            }
        }
        NodeKind::Element(tag) => {
            if !ELEMENT_TAGS.contains(tag.as_str()) {
                return Err(RenderError::UnknownNodeType {
                    id: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
            }
        }
    }
    if let Some(else_branch) = &node.else_branch {
        validate(else_branch, registered)?;
    }
    match &node.children {
        Some(Children::One(child)) => validate(child, registered)?,
        Some(Children::Many(children)) => {
            for child in children {
                if let Child::Node(n) = child {
                    validate(n, registered)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}
