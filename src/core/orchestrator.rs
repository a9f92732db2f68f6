//! 编排主循环
//!
//! 每轮：追加用户消息，然后在 Supervisor、Worker、ToolExecutor 之间按状态机推进直到 END。
//! 每个状态的工作完成后才追加其产出并计算下一状态；一批工具结果一次性追加。
//! 返回最后一条消息的内容（去掉澄清标记），会话为空时返回 "No response"。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::agents::{SupervisorAgent, WorkerAgent};
use crate::core::state::{after_supervisor, after_worker};
use crate::core::{AgentError, LoopState};
use crate::events::LoopEvent;
use crate::llm::TurnStatus;
use crate::memory::{ConversationStore, Message};
use crate::tools::ToolExecutor;

/// 没有任何可返回内容时的回复
pub const NO_RESPONSE: &str = "No response";

/// 一轮编排的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// 对外回复（已去掉澄清标记）
    pub response: String,
    /// 最后一次 Supervisor 的判定；步数耗尽时为 Continue
    pub status: TurnStatus,
    /// 本轮执行的状态步数
    pub steps: usize,
}

/// 编排循环：组件与存储由调用方持有，循环本身不含会话状态
pub struct OrchestrationLoop {
    supervisor: SupervisorAgent,
    worker: WorkerAgent,
    executor: ToolExecutor,
    store: Arc<dyn ConversationStore>,
    /// 0 表示不限
    max_steps: usize,
}

impl OrchestrationLoop {
    pub fn new(
        supervisor: SupervisorAgent,
        worker: WorkerAgent,
        executor: ToolExecutor,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            supervisor,
            worker,
            executor,
            store,
            max_steps: 0,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// 跑完一轮：input 为空时在进入循环前拒绝
    pub async fn run(
        &self,
        session_id: &str,
        input: &str,
        events: Option<&mpsc::UnboundedSender<LoopEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AgentError::EmptyInput);
        }

        self.close_interrupted_calls(session_id).await?;
        self.store
            .append(session_id, vec![Message::user(input)])
            .await?;

        let specs = self.executor.specs();
        let mut state = LoopState::Start;
        let mut status = TurnStatus::Continue;
        let mut steps = 0usize;

        transition(session_id, &mut state, LoopState::Supervising, events);

        while !state.is_terminal() {
            // 工具批次总是执行完，避免留下没有结果的工具调用
            if self.max_steps > 0 && steps >= self.max_steps && state != LoopState::ToolExec {
                tracing::warn!(
                    session = %session_id,
                    max_steps = self.max_steps,
                    state = %state,
                    "step limit reached, ending turn"
                );
                break;
            }
            steps += 1;

            let next = match state {
                LoopState::Supervising => {
                    let session = self.store.load(session_id).await?;
                    let turn = self.supervisor.instruct(&session).await?;
                    emit(
                        events,
                        LoopEvent::SupervisorMessage {
                            text: turn.message.content.clone(),
                            status: turn.status,
                        },
                    );
                    status = turn.status;
                    let next = after_supervisor(&turn.message, turn.status);
                    self.store.append(session_id, vec![turn.message]).await?;
                    next
                }
                LoopState::Working => {
                    let session = self.store.load(session_id).await?;
                    let reply = self.worker.respond(&session, &specs).await?;
                    if !reply.content.trim().is_empty() {
                        emit(
                            events,
                            LoopEvent::WorkerMessage {
                                text: reply.content.clone(),
                            },
                        );
                    }
                    for call in &reply.tool_calls {
                        emit(
                            events,
                            LoopEvent::ToolCall {
                                id: call.id.clone(),
                                tool: call.name.clone(),
                                args: call.arguments.clone(),
                            },
                        );
                    }
                    let next = after_worker(&reply);
                    self.store.append(session_id, vec![reply]).await?;
                    next
                }
                LoopState::ToolExec => {
                    let session = self.store.load(session_id).await?;
                    let trigger = session.last().ok_or(AgentError::NoToolCalls)?;
                    let results = self.executor.execute_batch(trigger).await?;
                    for result in &results {
                        emit(
                            events,
                            LoopEvent::tool_result(
                                result.tool_call_id.as_deref().unwrap_or_default(),
                                result.tool_name.as_deref().unwrap_or_default(),
                                &result.content,
                            ),
                        );
                    }
                    self.store.append(session_id, results).await?;
                    LoopState::Working
                }
                LoopState::Start => LoopState::Supervising,
                LoopState::End => LoopState::End,
            };
            transition(session_id, &mut state, next, events);
        }

        let session = self.store.load(session_id).await?;
        let response = session
            .last()
            .map(|m| self.supervisor.markers().strip_clarification(&m.content))
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string());

        emit(
            events,
            LoopEvent::Finished {
                response: response.clone(),
                steps,
            },
        );
        tracing::info!(session = %session_id, steps, status = ?status, "turn finished");

        Ok(TurnOutcome {
            response,
            status,
            steps,
        })
    }

    /// 上一轮在工具执行前被取消时，会话以没有结果的工具调用结尾；
    /// 先为每个调用补一条中断结果，保证调用与结果一一对应
    async fn close_interrupted_calls(&self, session_id: &str) -> Result<(), AgentError> {
        let session = self.store.load(session_id).await?;
        let Some(last) = session.last().filter(|m| m.has_tool_calls()) else {
            return Ok(());
        };
        let results: Vec<Message> = last
            .tool_calls
            .iter()
            .map(|call| {
                Message::tool_result(
                    &call.id,
                    &call.name,
                    format!("Error: Tool {} was interrupted", call.name),
                )
            })
            .collect();
        tracing::warn!(
            session = %session_id,
            calls = results.len(),
            "closing tool calls left open by an interrupted turn"
        );
        self.store.append(session_id, results).await?;
        Ok(())
    }
}

fn transition(
    session_id: &str,
    state: &mut LoopState,
    next: LoopState,
    events: Option<&mpsc::UnboundedSender<LoopEvent>>,
) {
    tracing::info!(session = %session_id, from = %state, to = %next, "state transition");
    emit(
        events,
        LoopEvent::StateChanged {
            from: *state,
            to: next,
        },
    );
    *state = next;
}

fn emit(events: Option<&mpsc::UnboundedSender<LoopEvent>>, event: LoopEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Markers;
    use crate::llm::{ActiveModel, Completion, LlmClient, LlmError, LlmFactory, MockLlmClient, ModelCatalog};
    use crate::memory::{InMemoryStore, Role, ToolCall};
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase text"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> Result<Value, String> {
            let text = args["text"].as_str().unwrap_or_default();
            Ok(Value::String(text.to_uppercase()))
        }
    }

    fn build(mock: Arc<MockLlmClient>, store: Arc<InMemoryStore>) -> OrchestrationLoop {
        let factory: Arc<dyn LlmFactory> =
            Arc::new(move |_: &str| -> Arc<dyn LlmClient> { mock.clone() });
        let model = Arc::new(ActiveModel::new(ModelCatalog::new(["mock"]), factory, "mock").unwrap());
        let mut registry = ToolRegistry::new();
        registry.register(Upper).unwrap();
        OrchestrationLoop::new(
            SupervisorAgent::new(model.clone(), Markers::default()),
            WorkerAgent::new(model),
            ToolExecutor::new(registry, 0),
            store,
        )
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_loop() {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(Arc::new(MockLlmClient::default()), store.clone());
        let err = orchestrator.run("1", "   ", None).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyInput));
        assert!(store.load("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_done_marker_skips_worker() {
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Project is done. Bye.")]));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(mock.clone(), store.clone());

        let outcome = orchestrator.run("1", "hi", None).await.unwrap();
        assert_eq!(outcome.response, "Project is done. Bye.");
        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(store.load("1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clarification_marker_is_stripped() {
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Ask user: Which language?")]));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(mock, store.clone());

        let outcome = orchestrator.run("1", "make something", None).await.unwrap();
        assert_eq!(outcome.response, "Which language?");
        assert_eq!(outcome.status, TurnStatus::NeedClarification);
        // 存储中的消息不被改写
        let session = store.load("1").await.unwrap();
        assert_eq!(session.last().unwrap().content, "Ask user: Which language?");
    }

    #[tokio::test]
    async fn test_tool_round_trip_and_events() {
        let mock = Arc::new(MockLlmClient::default().with_script([
            Completion::text("Uppercase the word bee"),
            Completion::text("").with_tool_calls(vec![
                ToolCall::new("a", "upper", json!({"text": "bee"})),
                ToolCall::new("b", "nope", json!({})),
            ]),
            Completion::text("Got BEE"),
            Completion::text("Project is done"),
        ]));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(mock.clone(), store.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = orchestrator.run("s", "go", Some(&tx)).await.unwrap();
        assert_eq!(outcome.response, "Project is done");

        let session = store.load("s").await.unwrap();
        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Supervisor, Role::Agent, Role::Tool, Role::Tool, Role::Agent, Role::Supervisor]
        );
        assert_eq!(session.messages()[3].content, "BEE");
        assert_eq!(session.messages()[3].tool_call_id.as_deref(), Some("a"));
        assert!(session.messages()[4].content.starts_with("Error: "));
        assert_eq!(session.messages()[4].tool_call_id.as_deref(), Some("b"));

        // 工具结果之后回到 Worker，Worker 看到完整历史
        let requests = mock.requests();
        assert_eq!(requests[2].messages.len(), 5);
        assert_eq!(requests[2].tool_names, vec!["upper".to_string()]);

        drop(tx);
        let mut states = Vec::new();
        let mut finished = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                LoopEvent::StateChanged { to, .. } => states.push(to),
                LoopEvent::Finished { .. } => finished = true,
                _ => {}
            }
        }
        assert!(finished);
        assert_eq!(
            states,
            vec![
                LoopState::Supervising,
                LoopState::Working,
                LoopState::ToolExec,
                LoopState::Working,
                LoopState::Supervising,
                LoopState::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_plain_worker_reply_returns_to_supervisor() {
        let mock = Arc::new(MockLlmClient::default().with_script([
            Completion::text("Say hello"),
            Completion::text("Hello!"),
            Completion::text("Project is done"),
        ]));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(mock.clone(), store);
        let outcome = orchestrator.run("1", "hi", None).await.unwrap();
        assert_eq!(outcome.steps, 3);
        // 第三次请求来自 Supervisor：单条消息且不绑定工具
        let third = &mock.requests()[2];
        assert_eq!(third.messages.len(), 1);
        assert!(third.tool_names.is_empty());
    }

    #[tokio::test]
    async fn test_step_guard_ends_turn() {
        let mock = Arc::new(MockLlmClient::default().with_script([
            Completion::text("Step one"),
            Completion::text("Working on it"),
            Completion::text("Step two"),
        ]));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(mock, store).with_max_steps(2);
        let outcome = orchestrator.run("1", "hi", None).await.unwrap();
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.response, "Working on it");
        assert_eq!(outcome.status, TurnStatus::Continue);
    }

    #[tokio::test]
    async fn test_open_tool_calls_closed_before_next_input() {
        let store = Arc::new(InMemoryStore::new());
        store
            .append(
                "1",
                vec![
                    Message::user("go"),
                    Message::supervisor("Uppercase bee"),
                    Message::agent_with_tool_calls(
                        "",
                        vec![
                            ToolCall::new("a", "upper", json!({"text": "bee"})),
                            ToolCall::new("b", "upper", json!({"text": "wasp"})),
                        ],
                    ),
                ],
            )
            .await
            .unwrap();
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Project is done")]));
        let orchestrator = build(mock, store.clone());

        orchestrator.run("1", "again", None).await.unwrap();

        let session = store.load("1").await.unwrap();
        let messages = session.messages();
        assert_eq!(messages[3].role, Role::Tool);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("a"));
        assert_eq!(messages[3].content, "Error: Tool upper was interrupted");
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("b"));
        assert_eq!(messages[5], Message::user("again"));
    }

    #[tokio::test]
    async fn test_answered_tool_calls_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        store
            .append(
                "1",
                vec![
                    Message::agent_with_tool_calls("", vec![ToolCall::new("a", "upper", json!({"text": "x"}))]),
                    Message::tool_result("a", "upper", "X"),
                ],
            )
            .await
            .unwrap();
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Project is done")]));
        let orchestrator = build(mock, store.clone());

        orchestrator.run("1", "next", None).await.unwrap();
        let session = store.load("1").await.unwrap();
        assert_eq!(session.messages()[2], Message::user("next"));
    }

    #[tokio::test]
    async fn test_empty_supervisor_output_falls_back() {
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("")]));
        let orchestrator = build(mock, Arc::new(InMemoryStore::new()));
        let outcome = orchestrator.run("1", "hi", None).await.unwrap();
        assert_eq!(outcome.response, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_llm_failure_aborts_turn_keeping_appended_messages() {
        let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Do it")]));
        mock.push_error(LlmError::Request("boom".into()));
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = build(mock, store.clone());
        let err = orchestrator.run("1", "hi", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        let session = store.load("1").await.unwrap();
        assert_eq!(session.messages().last(), Some(&Message::supervisor("Do it")));
    }
}
