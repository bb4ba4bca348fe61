//! 一键流水线 - 编排层
//!
//! 从一个 TOML 文件依次运行 build → split →（可选）import
//!
//! ```toml
//! [build]
//! task = "value"
//! path_a = "outputs/base.jsonl"
//! path_b = "outputs/ours.jsonl"
//! out = "data/banks/value_bank.jsonl"
//!
//! [split]
//! m = 5
//! n = 3
//!
//! [import]
//! banks_dir = "data/questions"
//! dry_run = true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::orchestrator::build_stage::{run_build, BuildArgs};
use crate::orchestrator::import_stage::{run_import, ImportArgs};
use crate::orchestrator::split_stage::{run_split, SplitArgs};

/// 流水线配置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFile {
    pub build: BuildArgs,
    pub split: SplitArgs,
    #[serde(default)]
    pub import: Option<ImportArgs>,
}

impl PipelineFile {
    /// 解析 TOML 文本；`[split].bank` 缺省时使用 `[build].out`
    pub fn parse(text: &str, origin: &str) -> AppResult<Self> {
        let mut file: PipelineFile =
            toml::from_str(text).map_err(|e| ConfigError::PipelineParseFailed {
                path: origin.to_string(),
                source: e,
            })?;
        if file.split.bank.as_os_str().is_empty() {
            file.split.bank = file.build.out.clone();
        }
        Ok(file)
    }

    pub async fn load(path: &Path) -> AppResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::parse(&text, &path.display().to_string())
    }
}

/// 运行流水线，返回拆分出的问卷文件
pub async fn run_pipeline(config: &Config, config_path: &Path) -> Result<Vec<PathBuf>> {
    let pipeline = PipelineFile::load(config_path)
        .await
        .with_context(|| format!("读取流水线配置失败: {}", config_path.display()))?;
    info!("🧭 流水线配置: {}", config_path.display());

    run_build(config, &pipeline.build).await?;
    let outcome = run_split(&pipeline.split).await?;
    if let Some(import) = &pipeline.import {
        run_import(config, import).await?;
    } else {
        info!("⏭️ 未配置 [import]，跳过导入");
    }
    Ok(outcome.files)
}
