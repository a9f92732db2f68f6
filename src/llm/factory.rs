//! LLM 后端工厂
//!
//! 根据配置与环境变量选择后端（DeepSeek / OpenAI 兼容 / Mock），按模型名构建 LlmClient。
//! 切换模型时由 ActiveModel 调用工厂重建客户端。

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

/// DeepSeek API（OpenAI 兼容格式）
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// 按模型名构建客户端
pub trait LlmFactory: Send + Sync {
    fn create(&self, model: &str) -> Arc<dyn LlmClient>;
}

impl<F> LlmFactory for F
where
    F: Fn(&str) -> Arc<dyn LlmClient> + Send + Sync,
{
    fn create(&self, model: &str) -> Arc<dyn LlmClient> {
        self(model)
    }
}

/// 已解析的后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    DeepSeek { api_key: String },
    OpenAi { api_key: String, base_url: Option<String> },
    Mock,
}

/// 基于配置的工厂：所有模型共用同一后端与超时
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    provider: Provider,
    request_timeout_secs: u64,
}

impl ProviderFactory {
    pub fn new(provider: Provider, request_timeout_secs: u64) -> Self {
        Self {
            provider,
            request_timeout_secs,
        }
    }

    /// 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）；
    /// 均无 Key 或 provider = mock 时使用 Mock
    pub fn from_config(cfg: &LlmSection) -> Self {
        let provider = cfg.provider.to_lowercase();
        let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
        let openai_key = std::env::var("OPENAI_API_KEY").ok();

        let resolved = match (provider.as_str(), deepseek_key, openai_key) {
            ("mock", _, _) => Provider::Mock,
            ("deepseek", Some(key), _) | ("deepseek", None, Some(key)) => {
                Provider::DeepSeek { api_key: key }
            }
            (_, _, Some(key)) => Provider::OpenAi {
                api_key: key,
                base_url: cfg.base_url.clone(),
            },
            (_, Some(key), None) => Provider::DeepSeek { api_key: key },
            _ => {
                tracing::warn!("No API key set or provider unknown, using Mock LLM");
                Provider::Mock
            }
        };
        Self::new(resolved, cfg.request_timeout_secs)
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

impl LlmFactory for ProviderFactory {
    fn create(&self, model: &str) -> Arc<dyn LlmClient> {
        match &self.provider {
            Provider::DeepSeek { api_key } => {
                tracing::info!("Using DeepSeek LLM ({})", model);
                Arc::new(
                    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model, Some(api_key))
                        .with_request_timeout(self.request_timeout_secs),
                )
            }
            Provider::OpenAi { api_key, base_url } => {
                tracing::info!("Using OpenAI LLM ({})", model);
                Arc::new(
                    OpenAiClient::new(base_url.as_deref(), model, Some(api_key))
                        .with_request_timeout(self.request_timeout_secs),
                )
            }
            Provider::Mock => Arc::new(MockLlmClient::new(model)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_builds_named_client() {
        let factory = ProviderFactory::new(Provider::Mock, 0);
        let client = factory.create("gpt-4o-mini");
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_explicit_mock_provider_ignores_keys() {
        let cfg = LlmSection {
            provider: "mock".to_string(),
            ..LlmSection::default()
        };
        assert_eq!(ProviderFactory::from_config(&cfg).provider(), &Provider::Mock);
    }

    #[test]
    fn test_closure_factory() {
        let factory = |model: &str| -> Arc<dyn LlmClient> { Arc::new(MockLlmClient::new(model)) };
        assert_eq!(LlmFactory::create(&factory, "x").model(), "x");
    }
}
