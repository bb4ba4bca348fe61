//! 翻译后端客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 调用 OpenAI 兼容的 chat completion 接口
//! - 支持自定义 API 端点（本地 vLLM / 代理服务等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::TranslationServiceError;

/// 翻译后端
///
/// 只负责"一段文本 → 中文"这一次调用，不做缓存与重试。
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// 使用的模型名（用于日志与错误信息）
    fn model(&self) -> &str;

    /// 翻译单段文本
    async fn translate_zh(&self, text: &str) -> Result<String, TranslationServiceError>;
}

/// OpenAI 兼容接口的翻译客户端
pub struct OpenAiTranslator {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiTranslator {
    /// 根据配置创建，`model_name` 通常来自 `--openai-model`
    pub fn new(config: &Config, model_name: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.translate_api_key)
            .with_api_base(&config.translate_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.into(),
        }
    }
}

/// 构建翻译提示词
pub fn build_translation_prompt(text: &str) -> String {
    format!(
        "请将下面文本翻译成中文，保持原意，尽量自然流畅；保留专有名词；不要添加额外解释。\n\n文本：\n{}",
        text
    )
}

#[async_trait]
impl TranslationBackend for OpenAiTranslator {
    fn model(&self) -> &str {
        &self.model_name
    }

    async fn translate_zh(&self, text: &str) -> Result<String, TranslationServiceError> {
        debug!("调用翻译接口，模型: {}，原文长度: {} 字符", self.model_name, text.chars().count());

        let request_failed = |e: async_openai::error::OpenAIError| TranslationServiceError::RequestFailed {
            model: self.model_name.clone(),
            source: Box::new(e),
        };

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(build_translation_prompt(text))
            .build()
            .map_err(request_failed)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(0.0)
            .build()
            .map_err(request_failed)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("翻译接口调用失败: {}", e);
            request_failed(e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| TranslationServiceError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_prompt_keeps_text_verbatim() {
        let prompt = build_translation_prompt("I would say, \"I help\"");
        assert!(prompt.ends_with("文本：\nI would say, \"I help\""));
    }

    /// 需要本地 OpenAI 兼容服务，手动运行：cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_live_translation() {
        let _ = tracing_subscriber::fmt::try_init();
        let config = Config::from_env().expect("读取配置失败");
        let translator = OpenAiTranslator::new(&config, config.translate_model.clone());

        let result = translator.translate_zh("Good morning").await;
        match result {
            Ok(text) => {
                println!("译文: {}", text);
                assert!(!text.is_empty());
            }
            Err(e) => panic!("翻译失败: {}", e),
        }
    }
}
