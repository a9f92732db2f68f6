//! LLM 层：补全服务抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、模型目录与活动模型

pub mod catalog;
pub mod factory;
pub mod mock;
pub mod openai;
pub mod traits;

pub use catalog::{ActiveModel, ModelCatalog};
pub use factory::{LlmFactory, Provider, ProviderFactory, DEEPSEEK_BASE_URL};
pub use mock::{MockLlmClient, RecordedRequest};
pub use openai::OpenAiClient;
pub use traits::{Completion, LlmClient, LlmError, ToolSpec, TurnStatus};
