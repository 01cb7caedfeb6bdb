//! 渲染器 - 节点树遍历、输出树、组件注册表

mod dsl_renderer;
mod output;
mod registry;

pub use dsl_renderer::{DslRenderer, MAX_DEPTH};
pub use output::{Rendered, RenderedKind, RenderedNode, ResolvedProps};
pub use registry::{NativeWidget, OpaqueWidget, WidgetRegistry};
