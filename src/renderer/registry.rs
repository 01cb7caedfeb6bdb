//! 原生组件注册表 - COMP_* 类型到组件实现的映射
//!
//! 组件内部（图表、地图、表格……）对渲染器完全不透明：
//! 注册表只回答"这个类型对应哪个实现"，实现拿到已解析的 props
//! 和子树后自行产出可挂载的输出。

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::output::{Rendered, RenderedKind, RenderedNode, ResolvedProps};

/// 内置目录里的组件类型名
static BUILTIN_WIDGETS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "COMP_ECHART",
        "COMP_AGGRID",
        "COMP_LEAFLET",
        "COMP_MAPBOX",
        "COMP_THREE_SCENE",
        "COMP_VIS_NETWORK",
        "COMP_LUCKYSHEET",
        "COMP_HANDSONTABLE",
        "COMP_PDF_VIEWER",
        "COMP_MARKDOWN",
        "COMP_ICONIFY_ICON",
        "COMP_DUCKDB_INTERFACE",
        "COMP_DUCKDB_UPLOAD",
    ]
});

/// 原生组件实现
pub trait NativeWidget: Send + Sync {
    /// 用已解析的 props 和子树产出可挂载的输出
    fn render(&self, key: &str, props: ResolvedProps, children: Vec<Rendered>) -> Rendered;
}

/// 透传组件：原样输出类型、props 和子树，由宿主侧的实现接管
pub struct OpaqueWidget {
    type_name: String,
}

impl OpaqueWidget {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into() }
    }
}

impl NativeWidget for OpaqueWidget {
    fn render(&self, key: &str, props: ResolvedProps, children: Vec<Rendered>) -> Rendered {
        Rendered::Node(RenderedNode {
            key: key.to_string(),
            kind: RenderedKind::Widget(self.type_name.clone()),
            props,
            children,
        })
    }
}

/// 组件注册表
pub struct WidgetRegistry {
    widgets: HashMap<String, Arc<dyn NativeWidget>>,
}

impl WidgetRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self { widgets: HashMap::new() }
    }

    /// 带内置目录的注册表：所有已知 COMP_* 类型注册为透传组件
    pub fn with_builtin_catalog() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_WIDGETS.iter() {
            registry.register(*name, Arc::new(OpaqueWidget::new(*name)));
        }
        registry
    }

    pub fn register(&mut self, type_name: impl Into<String>, widget: Arc<dyn NativeWidget>) {
        let type_name = type_name.into();
        debug!(widget = %type_name, "register native widget");
        self.widgets.insert(type_name, widget);
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn NativeWidget>> {
        self.widgets.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.widgets.contains_key(type_name)
    }
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::with_builtin_catalog()
    }
}
