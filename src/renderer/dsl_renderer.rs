//! DSL 渲染器 - 把声明式节点树解析为可挂载的输出树
//!
//! 一次渲染 pass 是对 (节点树, 上下文) 的同步、无状态的完整遍历：
//! 深度优先，父节点 props 先于子节点解析，每个表达式恰好求值一次。
//! 任何一处失败都中止整个 pass，不产出部分树。

use serde_json::Value as JsonValue;
use tracing::debug;

use super::output::{Rendered, RenderedKind, RenderedNode, ResolvedProps};
use super::registry::WidgetRegistry;
use crate::dsl::expr::{self, EvalError};
use crate::dsl::node::{Child, Children, ForDef, Node, NodeKind, PropValue, ELEMENT_TAGS};
use crate::error::{RenderError, RenderResult};

/// 默认递归深度上限，超出按循环引用处理
pub const MAX_DEPTH: usize = 64;

/// DSL 渲染器
///
/// 除注册表外不持有任何状态，`render` 是 (node, context) 的纯函数。
pub struct DslRenderer {
    registry: WidgetRegistry,
    max_depth: usize,
}

impl DslRenderer {
    pub fn new(registry: WidgetRegistry) -> Self {
        Self { registry, max_depth: MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    /// 渲染一棵节点树
    ///
    /// 根节点的 `if`/`for` 可能产出零个或多个输出，所以返回 Vec。
    pub fn render(&self, node: &Node, context: &JsonValue) -> RenderResult<Vec<Rendered>> {
        if !context.is_object() {
            return Err(RenderError::MalformedNode {
                id: node.id.clone(),
                reason: "context must be a name-to-value object".into(),
            });
        }
        debug!(id = %node.id, node_type = %node.node_type, "render pass");
        self.render_node(node, context, 0)
    }

    /// 渲染契约里的字符串输入：插值后作为文本输出
    pub fn render_string(&self, text: &str, context: &JsonValue) -> RenderResult<Rendered> {
        expr::interpolate(text, context)
            .map(Rendered::Text)
            .map_err(|e| evaluation_error("", text, e))
    }

    fn render_node(
        &self,
        node: &Node,
        context: &JsonValue,
        depth: usize,
    ) -> RenderResult<Vec<Rendered>> {
        if depth > self.max_depth {
            return Err(RenderError::DepthExceeded {
                id: node.id.clone(),
                limit: self.max_depth,
            });
        }

        // 条件槽位：假值走 else 分支，否则该槽位不产出任何东西
        if let Some(cond) = &node.condition {
            let value = self.resolve_prop(node, cond, context)?;
            if !expr::is_truthy(&value) {
                return match &node.else_branch {
                    Some(else_node) => self.render_node(else_node, context, depth + 1),
                    None => Ok(Vec::new()),
                };
            }
        }

        if let Some(repeat) = &node.repeat {
            return self.render_repeat(node, repeat, context, depth);
        }

        Ok(vec![self.render_single(node, context, depth, None)?])
    }

    /// 循环展开：每个元素在注入 item/index 的上下文里渲染一次
    fn render_repeat(
        &self,
        node: &Node,
        def: &ForDef,
        context: &JsonValue,
        depth: usize,
    ) -> RenderResult<Vec<Rendered>> {
        let source = self.resolve_prop(node, &def.source, context)?;
        let items = match source {
            JsonValue::Array(items) => items,
            _ => {
                return Err(RenderError::MalformedNode {
                    id: node.id.clone(),
                    reason: "`for.in` did not resolve to an array".into(),
                })
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let mut loop_context = context.clone();
            if let Some(obj) = loop_context.as_object_mut() {
                obj.insert(def.item_name.clone(), item);
                if let Some(index_name) = &def.index {
                    obj.insert(index_name.clone(), JsonValue::Number(index.into()));
                }
            }

            let key = match def.key.as_ref().or(node.key.as_ref()) {
                Some(k) => {
                    expr::to_display_string(&self.resolve_prop(node, k, &loop_context)?)
                }
                None => format!("{}-{}", node.id, index),
            };
            out.push(self.render_single(node, &loop_context, depth, Some(key))?);
        }
        Ok(out)
    }

    fn render_single(
        &self,
        node: &Node,
        context: &JsonValue,
        depth: usize,
        key_override: Option<String>,
    ) -> RenderResult<Rendered> {
        let mut props = ResolvedProps::new();
        for (name, value) in &node.props {
            props.insert(name.clone(), self.resolve_prop(node, value, context)?);
        }
        let children = self.render_children(node, context, depth)?;
        let key = key_override.unwrap_or_else(|| node.id.clone());

        match node.kind() {
            NodeKind::Widget(name) => match self.registry.get(&name) {
                Some(widget) => Ok(widget.render(&key, props, children)),
                None => Err(RenderError::UnknownNodeType {
                    id: node.id.clone(),
                    node_type: node.node_type.clone(),
                }),
            },
            NodeKind::Element(tag) => {
                if !ELEMENT_TAGS.contains(tag.as_str()) {
                    return Err(RenderError::UnknownNodeType {
                        id: node.id.clone(),
                        node_type: node.node_type.clone(),
                    });
                }
                Ok(Rendered::Node(RenderedNode {
                    key,
                    kind: RenderedKind::Element(tag),
                    props,
                    children,
                }))
            }
        }
    }

    fn render_children(
        &self,
        node: &Node,
        context: &JsonValue,
        depth: usize,
    ) -> RenderResult<Vec<Rendered>> {
        match &node.children {
            None => Ok(Vec::new()),
            Some(Children::Text(text)) => {
                Ok(vec![Rendered::Text(self.interpolate(node, text, context)?)])
            }
            Some(Children::Expr(expr_ref)) => {
                let value = expr::evaluate(&expr_ref.exp, context)
                    .map_err(|e| evaluation_error(&node.id, &expr_ref.exp, e))?;
                Ok(vec![Rendered::Text(expr::to_display_string(&value))])
            }
            Some(Children::Bind(bind)) => {
                let value = expr::resolve_path(&bind.bind, context)
                    .map_err(|e| evaluation_error(&node.id, &bind.bind, e))?;
                Ok(vec![Rendered::Text(expr::to_display_string(&value))])
            }
            Some(Children::One(child)) => self.render_node(child, context, depth + 1),
            Some(Children::Many(list)) => {
                let mut out = Vec::with_capacity(list.len());
                for child in list {
                    match child {
                        Child::Text(text) => {
                            out.push(Rendered::Text(self.interpolate(node, text, context)?))
                        }
                        Child::Expr(expr_ref) => {
                            let value = expr::evaluate(&expr_ref.exp, context)
                                .map_err(|e| evaluation_error(&node.id, &expr_ref.exp, e))?;
                            out.push(Rendered::Text(expr::to_display_string(&value)));
                        }
                        Child::Bind(bind) => {
                            let value = expr::resolve_path(&bind.bind, context)
                                .map_err(|e| evaluation_error(&node.id, &bind.bind, e))?;
                            out.push(Rendered::Text(expr::to_display_string(&value)));
                        }
                        Child::Node(n) => {
                            out.extend(self.render_node(n, context, depth + 1)?)
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    /// 解析单个属性值：引用求值，字符串插值，其余字面量原样保留
    fn resolve_prop(
        &self,
        node: &Node,
        value: &PropValue,
        context: &JsonValue,
    ) -> RenderResult<JsonValue> {
        match value {
            PropValue::Expr(expr_ref) => expr::evaluate(&expr_ref.exp, context)
                .map_err(|e| evaluation_error(&node.id, &expr_ref.exp, e)),
            PropValue::Bind(bind) => {
                if bind.transform.is_some() {
                    debug!(id = %node.id, "$transform pipeline not implemented, using bare binding");
                }
                expr::resolve_path(&bind.bind, context)
                    .map_err(|e| evaluation_error(&node.id, &bind.bind, e))
            }
            PropValue::Literal(JsonValue::String(text)) => self
                .interpolate(node, text, context)
                .map(JsonValue::String),
            PropValue::Literal(other) => Ok(other.clone()),
        }
    }

    fn interpolate(&self, node: &Node, text: &str, context: &JsonValue) -> RenderResult<String> {
        expr::interpolate(text, context).map_err(|e| evaluation_error(&node.id, text, e))
    }
}

fn evaluation_error(id: &str, expr: &str, cause: EvalError) -> RenderError {
    RenderError::Evaluation {
        id: id.to_string(),
        expr: expr.to_string(),
        reason: cause.to_string(),
    }
}
