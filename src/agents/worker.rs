//! Worker：构建者 Agent
//!
//! 以完整会话调用 LLM 并绑定工具目录，产出纯文本回复或一批工具调用请求。

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{ActiveModel, ToolSpec};
use crate::memory::{Message, Session, ToolCall};

pub struct WorkerAgent {
    model: Arc<ActiveModel>,
}

impl WorkerAgent {
    pub fn new(model: Arc<ActiveModel>) -> Self {
        Self { model }
    }

    pub async fn respond(&self, session: &Session, tools: &[ToolSpec]) -> Result<Message, AgentError> {
        let llm = self.model.client().await;
        let completion = llm.complete(session.messages(), tools).await?;
        let tool_calls = ensure_unique_ids(completion.tool_calls);
        if !tool_calls.is_empty() {
            let names: Vec<&str> = tool_calls.iter().map(|c| c.name.as_str()).collect();
            tracing::info!(session = %session.id, tools = ?names, "worker requested tools");
        }
        Ok(Message::agent_with_tool_calls(completion.content, tool_calls))
    }
}

/// 空 id 或消息内重复的 id 重新分配，保证结果能一一对应
fn ensure_unique_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || !seen.insert(call.id.clone()) {
                call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}
