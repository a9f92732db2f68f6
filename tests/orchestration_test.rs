//! 编排端到端测试：脚本化 Mock 后端 + 临时工作目录

use std::sync::Arc;

use hive::agents::Markers;
use hive::llm::{ActiveModel, Completion, LlmClient, LlmFactory, MockLlmClient, ModelCatalog, TurnStatus};
use hive::memory::{ConversationStore, InMemoryStore, Role, ToolCall};
use hive::tools::builtin_registry;
use hive::{AgentError, AgentService, LoopEvent, LoopState, ServiceOptions};
use serde_json::json;
use tokio::sync::mpsc;

fn service(mock: Arc<MockLlmClient>, workspace: &std::path::Path) -> AgentService {
    let factory: Arc<dyn LlmFactory> = Arc::new(move |_: &str| -> Arc<dyn LlmClient> { mock.clone() });
    let model = Arc::new(
        ActiveModel::new(
            ModelCatalog::new(["deepseek-chat", "deepseek-reasoner"]),
            factory,
            "deepseek-chat",
        )
        .unwrap(),
    );
    let registry = builtin_registry(workspace, None).unwrap();
    AgentService::new(
        model,
        registry,
        Arc::new(InMemoryStore::new()),
        ServiceOptions {
            markers: Markers::default(),
            ..ServiceOptions::default()
        },
    )
}

#[tokio::test]
async fn test_hello_world_project() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::default().with_script([
        Completion::text("Create a file named hello.py that prints Hello, World!"),
        Completion::text("I'll create the file.").with_tool_calls(vec![ToolCall::new(
            "call_1",
            "create_file",
            json!({"path": "hello.py", "content": "print('Hello, World!')\n"}),
        )]),
        Completion::text("hello.py has been created."),
        Completion::text("Great work. Project is done."),
    ]));
    let service = service(mock.clone(), dir.path());

    let reply = service.ask("Build a hello-world script").await.unwrap();
    assert!(reply.contains("Project is done"));

    let written = std::fs::read_to_string(dir.path().join("hello.py")).unwrap();
    assert_eq!(written, "print('Hello, World!')\n");

    let session = service.store().load("1").await.unwrap();
    let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Supervisor, Role::Agent, Role::Tool, Role::Agent, Role::Supervisor]
    );
    let tool_msg = &session.messages()[3];
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_msg.content.contains("hello.py"));

    // Worker 请求绑定了全部文件工具，未开启 shell
    let worker_tools = &mock.requests()[1].tool_names;
    assert_eq!(worker_tools.len(), 7);
    assert!(worker_tools.contains(&"create_file".to_string()));
    assert!(!worker_tools.contains(&"run_command".to_string()));
}

#[tokio::test]
async fn test_completion_marker_skips_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::default().with_script([Completion::text("Project is done")]));
    let service = service(mock.clone(), dir.path());

    let outcome = service.ask_in("1", "anything", None).await.unwrap();
    assert_eq!(outcome.status, TurnStatus::Done);
    assert_eq!(mock.requests().len(), 1);
    assert!(mock.requests()[0].tool_names.is_empty());
}

#[tokio::test]
async fn test_clarification_marker_removed_from_reply() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::default().with_script([Completion::text(
        "Ask user: What should the program do?",
    )]));
    let service = service(mock, dir.path());

    let reply = service.ask("hi").await.unwrap();
    assert_eq!(reply, "What should the program do?");
}

#[tokio::test]
async fn test_worker_without_tools_goes_back_to_supervisor() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::default().with_script([
        Completion::text("Explain what you will build"),
        Completion::text("A tiny script."),
        Completion::text("Project is done"),
    ]));
    let service = service(mock, dir.path());
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.ask_in("1", "go", Some(&tx)).await.unwrap();
    drop(tx);

    let mut transitions = Vec::new();
    while let Some(event) = rx.recv().await {
        if let LoopEvent::StateChanged { from, to } = event {
            transitions.push((from, to));
        }
    }
    assert!(transitions.contains(&(LoopState::Working, LoopState::Supervising)));
    assert!(!transitions.iter().any(|(_, to)| *to == LoopState::ToolExec));
}

#[tokio::test]
async fn test_unknown_model_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(Arc::new(MockLlmClient::default()), dir.path());

    let err = service.switch_model("gemini-2.5-pro").await.unwrap_err();
    assert!(matches!(err, AgentError::UnknownModel(_)));
    assert_eq!(service.active_model().await, "deepseek-chat");

    service.switch_model("deepseek-reasoner").await.unwrap();
    assert_eq!(service.active_model().await, "deepseek-reasoner");
}

#[tokio::test]
async fn test_clear_memory_resets_session() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(Arc::new(MockLlmClient::default()), dir.path());

    service.ask("first").await.unwrap();
    assert!(!service.store().load("1").await.unwrap().is_empty());

    service.clear_memory("1").await.unwrap();
    assert!(service.store().load("1").await.unwrap().is_empty());

    // 清空后重新开始
    service.ask("second").await.unwrap();
    let session = service.store().load("1").await.unwrap();
    assert_eq!(session.messages()[0].content, "second");
}

#[tokio::test]
async fn test_path_escape_is_reported_to_worker() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("ws");
    let mock = Arc::new(MockLlmClient::default().with_script([
        Completion::text("Write outside"),
        Completion::text("").with_tool_calls(vec![ToolCall::new(
            "c",
            "write_file",
            json!({"path": "../escape.txt", "content": "x"}),
        )]),
        Completion::text("That failed."),
        Completion::text("Project is done"),
    ]));
    let service = service(mock, &workspace);

    service.ask("go").await.unwrap();
    assert!(!dir.path().join("escape.txt").exists());
    let session = service.store().load("1").await.unwrap();
    assert!(session.messages()[3].content.starts_with("Error: "));
}
