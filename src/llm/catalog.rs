//! 模型目录与活动模型
//!
//! ModelCatalog 是固定、可枚举的模型集合；ActiveModel 持有当前客户端，Supervisor 与 Worker 共用。
//! 切换只影响之后的补全，不改动历史；目录外的模型名在生效前即被拒绝。

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::AgentError;
use crate::llm::{LlmClient, LlmFactory};

/// 可选模型集合（保持配置顺序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<String>,
}

impl ModelCatalog {
    pub fn new(models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut list: Vec<String> = Vec::new();
        for m in models {
            let m = m.into();
            if !m.is_empty() && !list.contains(&m) {
                list.push(m);
            }
        }
        Self { models: list }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// 进程内活动模型：当前客户端 + 用于切换的工厂
pub struct ActiveModel {
    catalog: ModelCatalog,
    factory: Arc<dyn LlmFactory>,
    /// (模型名, 客户端)
    current: RwLock<(String, Arc<dyn LlmClient>)>,
}

impl ActiveModel {
    /// initial 必须在目录中
    pub fn new(
        catalog: ModelCatalog,
        factory: Arc<dyn LlmFactory>,
        initial: &str,
    ) -> Result<Self, AgentError> {
        if !catalog.contains(initial) {
            return Err(AgentError::UnknownModel(initial.to_string()));
        }
        let client = factory.create(initial);
        Ok(Self {
            catalog,
            factory,
            current: RwLock::new((initial.to_string(), client)),
        })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// 当前客户端（快照）；正在进行的补全不受后续切换影响
    pub async fn client(&self) -> Arc<dyn LlmClient> {
        self.current.read().await.1.clone()
    }

    pub async fn name(&self) -> String {
        self.current.read().await.0.clone()
    }

    /// 切换活动模型；未知模型返回 UnknownModel 且保持不变
    pub async fn switch(&self, model: &str) -> Result<(), AgentError> {
        if !self.catalog.contains(model) {
            tracing::warn!(model = %model, "rejected switch to unknown model");
            return Err(AgentError::UnknownModel(model.to_string()));
        }
        let client = self.factory.create(model);
        *self.current.write().await = (model.to_string(), client);
        tracing::info!(model = %model, "active model switched");
        Ok(())
    }
}
