//! 渲染输出树 - 宿主框架可消费的 (type, props, children, key) 元组树

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// 已解析的属性表（key 顺序与节点定义一致）
pub type ResolvedProps = Map<String, JsonValue>;

/// 输出节点的分发类别
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderedKind {
    /// 通用元素，按标签名挂载
    Element(String),
    /// 原生组件，按注册名挂载
    Widget(String),
}

/// 渲染输出：文本叶子或带 key 的节点
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rendered {
    Text(String),
    Node(RenderedNode),
}

/// 输出节点
///
/// `key` 来自源节点的 `id`（循环展开时带上迭代 key），
/// 宿主框架据此保持原生组件实例的稳定性。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedNode {
    pub key: String,
    pub kind: RenderedKind,
    pub props: ResolvedProps,
    pub children: Vec<Rendered>,
}

impl Rendered {
    pub fn text(s: impl Into<String>) -> Self {
        Rendered::Text(s.into())
    }

    /// 按 key 取节点，测试里用
    pub fn as_node(&self) -> Option<&RenderedNode> {
        match self {
            Rendered::Node(n) => Some(n),
            Rendered::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendered::Text(s) => Some(s),
            Rendered::Node(_) => None,
        }
    }
}
