//! Mock LLM 客户端（用于测试与无 API Key 时的本地运行）
//!
//! 按顺序回放预设的 Completion，并记录每次请求。脚本耗尽后：
//! 未绑定工具的请求（Supervisor）回复完成标记，绑定工具的请求（Worker）回显最后一条指令。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completion, LlmClient, LlmError, ToolSpec, TurnStatus};
use crate::memory::{Message, Role};

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Mock 客户端：脚本回放 + 请求记录
#[derive(Debug)]
pub struct MockLlmClient {
    model: String,
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 预设一组按序返回的 Completion
    pub fn with_script(self, completions: impl IntoIterator<Item = Completion>) -> Self {
        for c in completions {
            self.push(c);
        }
        self
    }

    pub fn push(&self, completion: Completion) {
        self.lock_script().push_back(Ok(completion));
    }

    /// 预设一次失败
    pub fn push_error(&self, error: LlmError) {
        self.lock_script().push_back(Err(error));
    }

    /// 到目前为止收到的全部请求
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock_script().len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Completion, LlmError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fallback(messages: &[Message], tools: &[ToolSpec]) -> Completion {
        if tools.is_empty() {
            return Completion::text("Project is done.").with_status(TurnStatus::Done);
        }
        let last_instruction = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User | Role::Supervisor))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Completion::text(format!("Echo from Mock: {}", last_instruction))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Completion, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });

        match self.lock_script().pop_front() {
            Some(scripted) => scripted,
            None => Ok(Self::fallback(messages, tools)),
        }
    }
}
