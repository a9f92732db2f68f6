//! Hive - Supervisor / Worker / Tool 编排智能体
//!
//! 模块划分：
//! - **agent**: 无头 Agent 服务（供 CLI / HTTP 调用）
//! - **agents**: Supervisor（虚拟用户）与 Worker（构建者）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、编排状态机与主循环
//! - **events**: 循环过程事件
//! - **llm**: 补全服务抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、模型目录
//! - **memory**: 会话消息与会话存储
//! - **tools**: 文件与 shell 工具、注册表与执行器
//! - **web**: HTTP API（feature `web`）

pub mod agent;
pub mod agents;
pub mod config;
pub mod core;
pub mod events;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;
#[cfg(feature = "web")]
pub mod web;

pub use crate::agent::{AgentService, ServiceOptions};
pub use crate::core::{AgentError, LoopState, OrchestrationLoop, TurnOutcome};
pub use crate::events::LoopEvent;
