//! DSL 数据模型与表达式引擎

pub mod expr;
pub mod node;

pub use node::{
    parse_node, node_from_value, validate, BindRef, Child, Children, ExprRef, ForDef, Node,
    NodeKind, PropValue, ELEMENT_TAGS, WIDGET_PREFIX,
};
