//! Headless Agent 服务
//!
//! 供 CLI 与 HTTP 前端调用：ask 对单条用户输入跑一轮编排并返回回复；
//! 另提供模型列表与切换、会话清空。同一会话的并发请求按会话锁串行执行，不同会话互不影响。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::agents::{Markers, SupervisorAgent, WorkerAgent};
use crate::config::AppConfig;
use crate::core::{AgentError, OrchestrationLoop, TurnOutcome};
use crate::events::LoopEvent;
use crate::llm::{ActiveModel, LlmFactory, ModelCatalog, ProviderFactory};
use crate::memory::{ConversationStore, InMemoryStore};
use crate::tools::{builtin_registry, ShellTool, ToolExecutor, ToolRegistry};

/// 服务级参数
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// 未指定会话时使用的会话 id
    pub session_id: String,
    /// 0 表示不限
    pub max_steps: usize,
    /// 单轮超时；0 表示不限
    pub turn_timeout_secs: u64,
    /// 单次工具调用超时；0 表示不限
    pub tool_timeout_secs: u64,
    pub markers: Markers,
    /// 覆盖 Supervisor 默认指令
    pub directive: Option<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            session_id: "1".to_string(),
            max_steps: 200,
            turn_timeout_secs: 0,
            tool_timeout_secs: 300,
            markers: Markers::default(),
            directive: None,
        }
    }
}

impl ServiceOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            session_id: cfg.app.session_id.clone(),
            max_steps: cfg.app.max_steps,
            turn_timeout_secs: cfg.app.turn_timeout_secs,
            tool_timeout_secs: cfg.tools.tool_timeout_secs,
            markers: Markers::new(
                cfg.supervisor.completion_marker.clone(),
                cfg.supervisor.clarification_marker.clone(),
            ),
            directive: cfg.supervisor.prompt.clone(),
        }
    }
}

pub struct AgentService {
    orchestrator: OrchestrationLoop,
    model: Arc<ActiveModel>,
    default_session: String,
    turn_timeout: Option<Duration>,
    /// 会话 id -> 会话锁
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AgentService {
    /// 按配置构建：后端由 ProviderFactory 决定，run_command 仅在 tools.shell.enabled 时注册
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        if cfg.llm.models.is_empty() {
            return Err(AgentError::Config("llm.models must list at least one model".to_string()));
        }
        let factory: Arc<dyn LlmFactory> = Arc::new(ProviderFactory::from_config(&cfg.llm));
        let catalog = ModelCatalog::new(cfg.llm.models.clone());
        let model = Arc::new(ActiveModel::new(catalog, factory, &cfg.llm.model)?);

        let workspace = cfg.workspace_root();
        let shell = cfg.tools.shell.enabled.then(|| {
            tracing::warn!(workdir = %workspace.display(), "run_command enabled");
            ShellTool::new(&workspace, cfg.tools.shell.timeout_secs)
        });
        let registry = builtin_registry(&workspace, shell)?;
        tracing::info!(
            workspace = %workspace.display(),
            tools = ?registry.tool_names(),
            model = %cfg.llm.model,
            "agent service ready"
        );

        Ok(Self::new(
            model,
            registry,
            Arc::new(InMemoryStore::new()),
            ServiceOptions::from_config(cfg),
        ))
    }

    pub fn new(
        model: Arc<ActiveModel>,
        registry: ToolRegistry,
        store: Arc<dyn ConversationStore>,
        options: ServiceOptions,
    ) -> Self {
        let mut supervisor = SupervisorAgent::new(model.clone(), options.markers.clone());
        if let Some(directive) = options.directive {
            supervisor = supervisor.with_directive(directive);
        }
        let orchestrator = OrchestrationLoop::new(
            supervisor,
            WorkerAgent::new(model.clone()),
            ToolExecutor::new(registry, options.tool_timeout_secs),
            store,
        )
        .with_max_steps(options.max_steps);

        Self {
            orchestrator,
            model,
            default_session: options.session_id,
            turn_timeout: (options.turn_timeout_secs > 0)
                .then(|| Duration::from_secs(options.turn_timeout_secs)),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_session(&self) -> &str {
        &self.default_session
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        self.orchestrator.store()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.orchestrator.executor().tool_names()
    }

    /// 在默认会话上处理一条用户消息
    pub async fn ask(&self, message: &str) -> Result<String, AgentError> {
        let session = self.default_session.clone();
        Ok(self.ask_in(&session, message, None).await?.response)
    }

    /// 在指定会话上处理一条用户消息，可选推送过程事件
    pub async fn ask_in(
        &self,
        session_id: &str,
        message: &str,
        events: Option<&mpsc::UnboundedSender<LoopEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        if message.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            let run = self.orchestrator.run(session_id, message, events);
            match self.turn_timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => {
                        // 被取消的轮次可能留下未执行的工具调用，下一轮开始时补齐
                        tracing::warn!(session = %session_id, "turn timed out");
                        Err(AgentError::TurnTimeout(limit.as_secs()))
                    }
                },
                None => run.await,
            }
        };
        self.release_lock(session_id, lock).await;
        result
    }

    /// 可选模型（配置顺序）
    pub fn list_models(&self) -> Vec<String> {
        self.model.catalog().models().to_vec()
    }

    pub async fn active_model(&self) -> String {
        self.model.name().await
    }

    /// 切换 Supervisor 与 Worker 共用的模型；历史不变
    pub async fn switch_model(&self, model: &str) -> Result<(), AgentError> {
        self.model.switch(model).await
    }

    /// 清空会话历史；等待该会话正在进行的轮次结束
    pub async fn clear_memory(&self, session_id: &str) -> Result<(), AgentError> {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.store().reset(session_id).await
        };
        self.release_lock(session_id, lock).await;
        result?;
        tracing::info!(session = %session_id, "memory cleared");
        Ok(())
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// 没有其他请求持有或等待该锁时从表中移除，避免表随会话数无限增长
    async fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.session_locks.lock().await;
        // 表中一份加上这里一份；克隆只在持有表锁时发生，所以计数在此刻是稳定的
        if Arc::strong_count(&lock) == 2 {
            locks.remove(session_id);
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.session_locks.lock().await.len()
    }
}
