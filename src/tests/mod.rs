//! 单元测试模块
//! 覆盖渲染 pass、控制流、组件注册表

pub mod control_flow_tests;
pub mod renderer_tests;
