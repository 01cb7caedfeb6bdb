//! DSL 渲染引擎
//! 把声明式 JSON 节点树（类型 + props + children，内嵌 $exp 表达式）
//! 对数据上下文求值，产出宿主框架可挂载的输出树。

// DSL 数据模型与表达式引擎
pub mod dsl;

// 渲染器与组件注册表
pub mod renderer;

// 错误类型
pub mod error;

pub use dsl::{parse_node, node_from_value, validate, Node, NodeKind, PropValue};
pub use error::{RenderError, RenderResult};
pub use renderer::{
    DslRenderer, NativeWidget, OpaqueWidget, Rendered, RenderedKind, RenderedNode,
    ResolvedProps, WidgetRegistry,
};

// 单元测试
#[cfg(test)]
mod tests;
