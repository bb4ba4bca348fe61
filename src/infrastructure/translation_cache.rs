//! 翻译缓存 - 基础设施层
//!
//! 原文 SHA-256 → 译文 的键值表，跨多次构建复用，避免重复调用翻译后端

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::loaders::atomic_write;
use crate::utils::content_hash;

/// 翻译缓存
///
/// 由调用方显式创建并传入构建流程；`path` 为空时只存在于内存中。
#[derive(Debug, Default)]
pub struct TranslationCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl TranslationCache {
    /// 纯内存缓存
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// 打开（或新建）缓存文件
    ///
    /// 文件不存在时为空缓存；内容损坏时记录警告并从空缓存开始，下次保存会覆盖。
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("⚠️ 翻译缓存 {} 无法解析，将重新建立: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(AppError::file_read_failed(path.display().to_string(), e)),
        };
        debug!("翻译缓存已加载 {} 条: {}", entries.len(), path.display());

        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// 查找原文对应的译文
    pub fn get(&self, source_text: &str) -> Option<&str> {
        self.entries
            .get(&content_hash(source_text))
            .map(String::as_str)
    }

    /// 写入一条译文
    pub fn insert(&mut self, source_text: &str, translated: impl Into<String>) {
        self.entries
            .insert(content_hash(source_text), translated.into());
    }

    /// 持久化到文件（内存缓存时为空操作）
    pub async fn save(&self) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| AppError::serialize_failed(path.display().to_string(), e))?;
        atomic_write(path, body.as_bytes()).await
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/translate.json");

        let mut cache = TranslationCache::open(&path).await.unwrap();
        assert!(cache.is_empty());
        cache.insert("hello", "你好");
        cache.save().await.unwrap();

        let reopened = TranslationCache::open(&path).await.unwrap();
        assert_eq!(reopened.get("hello"), Some("你好"));
        assert_eq!(reopened.get("other"), None);
    }

    #[tokio::test]
    async fn test_corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translate.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = TranslationCache::open(&path).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_save_is_noop() {
        let mut cache = TranslationCache::in_memory();
        cache.insert("a", "甲");
        cache.save().await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.path().is_none());
    }
}
