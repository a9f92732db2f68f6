//! Supervisor：扮演虚拟用户，引导构建者 Agent 完成项目
//!
//! 把整段会话扁平化为 `[role] content` 行，前置固定指令，作为单条 user 消息交给 LLM；
//! 输出包装为 Supervisor 消息（Worker 视其为外部用户指令）。
//! 是否继续由 Completion.status 决定；后端未给出状态时回退到文本标记匹配（区分大小写的子串）。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{ActiveModel, TurnStatus};
use crate::memory::{Message, Session};

/// 控制标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub completion: String,
    pub clarification: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            completion: "Project is done".to_string(),
            clarification: "Ask user:".to_string(),
        }
    }
}

impl Markers {
    pub fn new(completion: impl Into<String>, clarification: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
            clarification: clarification.into(),
        }
    }

    /// 完成标记优先于澄清标记
    pub fn status_of(&self, content: &str) -> TurnStatus {
        if !self.completion.is_empty() && content.contains(&self.completion) {
            TurnStatus::Done
        } else if !self.clarification.is_empty() && content.contains(&self.clarification) {
            TurnStatus::NeedClarification
        } else {
            TurnStatus::Continue
        }
    }

    /// 去掉澄清标记，只留问题本身
    pub fn strip_clarification(&self, content: &str) -> String {
        if self.clarification.is_empty() || !content.contains(&self.clarification) {
            return content.to_string();
        }
        content.replace(&self.clarification, "").trim().to_string()
    }
}

/// 默认指令
pub fn default_directive(markers: &Markers) -> String {
    format!(
        "You are a virtual user. Your task is to guide the agent through building the whole project. \
         Tell the agent which files or folders to create and exactly what content to write in each file. \
         Behave like a real user. Requests from the real user appear as [user] lines; build what they ask for. \
         When the project is done, say '{}'. \
         If the initial request is unclear or the real user only wants to chat, ask for more details \
         using this pattern: {} ...your question...",
        markers.completion, markers.clarification
    )
}

/// Supervisor 一轮的产出
#[derive(Debug, Clone)]
pub struct SupervisorTurn {
    pub message: Message,
    pub status: TurnStatus,
}

/// Supervisor：共享活动模型，持有指令与标记
pub struct SupervisorAgent {
    model: Arc<ActiveModel>,
    directive: String,
    markers: Markers,
}

impl SupervisorAgent {
    pub fn new(model: Arc<ActiveModel>, markers: Markers) -> Self {
        Self {
            model,
            directive: default_directive(&markers),
            markers,
        }
    }

    /// 覆盖默认指令
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// 组装发给 LLM 的单条指令
    pub fn build_prompt(&self, session: &Session) -> String {
        let history: Vec<String> = session.messages.iter().map(Message::flatten).collect();
        format!(
            "{}\n\nCurrent conversation:\n{}",
            self.directive,
            history.join("\n")
        )
    }

    pub async fn instruct(&self, session: &Session) -> Result<SupervisorTurn, AgentError> {
        let prompt = self.build_prompt(session);
        tracing::debug!(session = %session.id, prompt_chars = prompt.len(), "supervisor prompt");

        let llm = self.model.client().await;
        let completion = llm.complete(&[Message::user(prompt)], &[]).await?;
        let status = completion
            .status
            .unwrap_or_else(|| self.markers.status_of(&completion.content));

        Ok(SupervisorTurn {
            message: Message::supervisor(completion.content),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, LlmClient, LlmFactory, MockLlmClient, ModelCatalog};

    fn active_with(mock: Arc<MockLlmClient>) -> Arc<ActiveModel> {
        let factory: Arc<dyn LlmFactory> =
            Arc::new(move |_: &str| -> Arc<dyn LlmClient> { mock.clone() });
        Arc::new(ActiveModel::new(ModelCatalog::new(["mock"]), factory, "mock").unwrap())
    }

    #[test]
    fn test_marker_classification() {
        let markers = Markers::default();
        assert_eq!(markers.status_of("Great. Project is done!"), TurnStatus::Done);
        assert_eq!(markers.status_of("Ask user: which language?"), TurnStatus::NeedClarification);
        assert_eq!(markers.status_of("Create hello.py"), TurnStatus::Continue);
        // 区分大小写
        assert_eq!(markers.status_of("project is done"), TurnStatus::Continue);
    }

    #[test]
    fn test_strip_clarification() {
        let markers = Markers::default();
        assert_eq!(markers.strip_clarification("Ask user: Which framework?"), "Which framework?");
        assert_eq!(markers.strip_clarification("Plain text"), "Plain text");
    }

    #[tokio::test]
    async fn test_prompt_flattens_history() {
        let mock = Arc::new(MockLlmClient::default());
        let supervisor = SupervisorAgent::new(active_with(mock.clone()), Markers::default());
        let mut session = Session::new("1");
        session.messages.push(Message::user("Build a hello-world script"));
        session.messages.push(Message::agent("Done."));

        let prompt = supervisor.build_prompt(&session);
        assert!(prompt.contains("Project is done"));
        assert!(prompt.ends_with("Current conversation:\n[user] Build a hello-world script\n[agent] Done."));
    }

    #[tokio::test]
    async fn test_instruct_sends_single_message_without_tools() {
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Create hello.py")]));
        let supervisor = SupervisorAgent::new(active_with(mock.clone()), Markers::default());
        let mut session = Session::new("1");
        session.messages.push(Message::user("Build a hello-world script"));

        let turn = supervisor.instruct(&session).await.unwrap();
        assert_eq!(turn.status, TurnStatus::Continue);
        assert_eq!(turn.message, Message::supervisor("Create hello.py"));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert!(requests[0].tool_names.is_empty());
    }

    #[tokio::test]
    async fn test_structured_status_wins_over_text() {
        let mock = Arc::new(MockLlmClient::default().with_script([
            Completion::text("The phrase Project is done appears in prose").with_status(TurnStatus::Continue),
        ]));
        let supervisor = SupervisorAgent::new(active_with(mock), Markers::default());
        let turn = supervisor.instruct(&Session::new("1")).await.unwrap();
        assert_eq!(turn.status, TurnStatus::Continue);
    }
}
