//! LLM 补全服务抽象
//!
//! 核心只依赖 LlmClient：输入有序的带角色消息（可选绑定工具声明），返回一条 Completion，
//! 其中可附带结构化的工具调用请求与可选的轮次状态。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::{Message, ToolCall};

/// 补全服务错误：对当前轮次致命，不自动重试，调用方可视为瞬时错误自行重试
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 结构化轮次状态：替代从自由文本中匹配标记
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Continue,
    Done,
    NeedClarification,
}

/// 一次补全的结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// 后端若能给出显式状态则优先于文本标记
    pub status: Option<TurnStatus>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_status(mut self, status: TurnStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// 绑定到补全请求的工具声明（名称、描述、参数 JSON Schema）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// LLM 客户端 trait（CompletionService）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 当前客户端对应的模型名
    fn model(&self) -> &str;

    /// 非流式补全；tools 为空表示不绑定工具
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Completion, LlmError>;
}
