//! Agent 错误类型
//!
//! 只有会中止当前轮次的错误才在这里出现；工具内部错误在工具边界转为文本结果，不会传播到循环。

use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::StoreError;
use crate::tools::ToolError;

/// 编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 入站消息为空，在进入循环前拒绝
    #[error("Message is required")]
    EmptyInput,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Conversation store error: {0}")]
    Store(#[from] StoreError),

    /// ToolExecutor 被调用时最新消息不含工具调用（调用方契约违例）
    #[error("No tool calls found in the latest message")]
    NoToolCalls,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Turn timed out after {0}s")]
    TurnTimeout(u64),

    #[error("Tool registration failed: {0}")]
    ToolRegistration(#[from] ToolError),

    #[error("Config error: {0}")]
    Config(String),
}
