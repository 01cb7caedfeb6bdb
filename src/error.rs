//! 渲染错误类型 - 整个渲染流程共用的错误分类

use thiserror::Error;

/// 渲染过程中的错误
///
/// 任何一处失败都会中止整个渲染 pass 并向上传播，
/// 渲染器本身不做恢复和部分渲染。
#[derive(Debug, Error)]
pub enum RenderError {
    /// 表达式求值失败（未定义的名字、不支持的方法、语法错误等）
    #[error("expression `{expr}` failed on node `{id}`: {reason}")]
    Evaluation {
        id: String,
        expr: String,
        reason: String,
    },

    /// 节点类型既不是已知元素标签，也不是已注册的原生组件
    #[error("unknown node type `{node_type}` on node `{id}`")]
    UnknownNodeType { id: String, node_type: String },

    /// 节点结构不符合约定（props/children 形状错误、for.in 不是数组等）
    #[error("malformed node `{id}`: {reason}")]
    MalformedNode { id: String, reason: String },

    /// 递归深度超限（疑似循环引用或异常深的树）
    #[error("node tree too deep at `{id}` (limit {limit})")]
    DepthExceeded { id: String, limit: usize },
}

pub type RenderResult<T> = Result<T, RenderError>;
