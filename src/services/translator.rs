//! 翻译服务 - 业务能力层
//!
//! 缓存优先；未命中时调用后端，单条文本带超时与有限次重试

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clients::TranslationBackend;
use crate::config::Config;
use crate::error::{AppResult, TranslationServiceError};
use crate::infrastructure::TranslationCache;
use crate::utils::logging::truncate_text;

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub timeout: Duration,
    /// 第 k 次失败后等待 `backoff * k`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.translate_max_attempts.max(1),
            timeout: Duration::from_secs(config.translate_timeout_secs.max(1)),
            backoff: Duration::from_secs(2),
        }
    }
}

/// 翻译服务
///
/// 职责：
/// - 持有显式传入的缓存
/// - 只在启用时调用后端
/// - 每条新译文写入后立即落盘，中断后重跑可直接命中
pub struct Translator {
    backend: Option<Arc<dyn TranslationBackend>>,
    cache: TranslationCache,
    policy: RetryPolicy,
    calls: usize,
    hits: usize,
}

impl Translator {
    /// 不翻译，原文直出
    pub fn disabled() -> Self {
        Self {
            backend: None,
            cache: TranslationCache::in_memory(),
            policy: RetryPolicy {
                max_attempts: 1,
                timeout: Duration::from_secs(1),
                backoff: Duration::ZERO,
            },
            calls: 0,
            hits: 0,
        }
    }

    /// 启用翻译
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        cache: TranslationCache,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend: Some(backend),
            cache,
            policy,
            calls: 0,
            hits: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// 翻译为中文；未启用时原样返回
    pub async fn translate_zh(&mut self, text: &str) -> AppResult<String> {
        let Some(backend) = self.backend.clone() else {
            return Ok(text.to_string());
        };
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        if let Some(hit) = self.cache.get(text) {
            self.hits += 1;
            return Ok(hit.to_string());
        }

        let translated = self.call_with_retry(backend.as_ref(), text).await?;
        self.calls += 1;
        self.cache.insert(text, translated.clone());
        self.cache.save().await?;
        Ok(translated)
    }

    async fn call_with_retry(
        &self,
        backend: &dyn TranslationBackend,
        text: &str,
    ) -> Result<String, TranslationServiceError> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let outcome = tokio::time::timeout(self.policy.timeout, backend.translate_zh(text)).await;
            let err = match outcome {
                Ok(Ok(translated)) => {
                    debug!("翻译成功 (第 {} 次): {}", attempt, truncate_text(text, 40));
                    return Ok(translated);
                }
                Ok(Err(e)) => e,
                Err(_) => TranslationServiceError::Timeout {
                    model: backend.model().to_string(),
                    timeout_secs: self.policy.timeout.as_secs(),
                },
            };

            warn!(
                "⚠️ 翻译失败 ({}/{}): {}",
                attempt, self.policy.max_attempts, err
            );
            last_error = err.to_string();

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.backoff * attempt as u32).await;
            }
        }

        Err(TranslationServiceError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last_error,
        })
    }

    /// 输出统计
    pub fn log_stats(&self) {
        if self.is_enabled() {
            let location = self
                .cache
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "内存".to_string());
            info!(
                "🌐 翻译统计: 调用 {} 次, 缓存命中 {} 次, 缓存共 {} 条 ({})",
                self.calls,
                self.hits,
                self.cache.len(),
                location
            );
        }
    }

    pub fn backend_calls(&self) -> usize {
        self.calls
    }

    pub fn cache_hits(&self) -> usize {
        self.hits
    }
}
