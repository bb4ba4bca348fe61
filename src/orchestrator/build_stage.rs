//! 题库构建阶段 - 编排层
//!
//! ## 职责
//!
//! 1. **资源准备**：按需创建翻译客户端与翻译缓存
//! 2. **委托构建**：调用 `services::build_bank` 完成对齐、抽样和逐题生成
//! 3. **写出题库**：JSONL（默认）或带缩进的 JSON 数组
//! 4. **统计输出**：对齐方式、丢弃条数、翻译调用次数

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::clients::OpenAiTranslator;
use crate::config::Config;
use crate::infrastructure::TranslationCache;
use crate::models::loaders::{write_json_pretty, write_jsonl};
use crate::models::{ComparisonQuestion, TaskKind};
use crate::services::{build_bank, BuildOptions, RetryPolicy, Translator};
use crate::utils::logging::{log_stage_start, print_stage_stats};

/// 题库文件格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankFormat {
    #[default]
    Jsonl,
    Json,
}

/// `build` 参数
#[derive(Debug, Clone, Args, Deserialize)]
pub struct BuildArgs {
    /// 任务：value 或 mic
    #[arg(long)]
    pub task: TaskKind,
    /// 方法 A 的推理结果（JSON 或 JSONL）
    #[arg(long = "path-a")]
    pub path_a: PathBuf,
    /// 方法 B 的推理结果（JSON 或 JSONL）
    #[arg(long = "path-b")]
    pub path_b: PathBuf,
    /// 抽样条数，<= 0 表示全部
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    #[serde(default)]
    pub num: i64,
    /// 输出题库路径
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, value_enum, default_value_t = BankFormat::Jsonl)]
    #[serde(default)]
    pub format: BankFormat,
    #[arg(long, default_value_t = 42)]
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[arg(long = "method-a-name", default_value = "methodA")]
    #[serde(default = "default_method_a")]
    pub method_a_name: String,
    #[arg(long = "method-b-name", default_value = "methodB")]
    #[serde(default = "default_method_b")]
    pub method_b_name: String,
    /// 把题干和 A/B 选项翻译成中文
    #[arg(long = "translate-zh")]
    #[serde(default)]
    pub translate_zh: bool,
    /// 翻译模型，默认取配置
    #[arg(long = "openai-model")]
    #[serde(default)]
    pub openai_model: Option<String>,
    /// 翻译缓存文件
    #[arg(long = "translate-cache")]
    #[serde(default)]
    pub translate_cache: Option<PathBuf>,
    /// 覆盖默认的对齐字段
    #[arg(long = "key-field")]
    #[serde(default)]
    pub key_field: Option<String>,
}

fn default_seed() -> u64 {
    42
}

fn default_method_a() -> String {
    "methodA".to_string()
}

fn default_method_b() -> String {
    "methodB".to_string()
}

/// 运行构建阶段，返回写出的题目数
pub async fn run_build(config: &Config, args: &BuildArgs) -> Result<usize> {
    log_stage_start(
        "题库构建",
        &format!(
            "{} | A: {} | B: {}",
            args.task,
            args.path_a.display(),
            args.path_b.display()
        ),
    );

    let mut translator = prepare_translator(config, args).await?;

    let options = BuildOptions {
        task: args.task,
        path_a: args.path_a.clone(),
        path_b: args.path_b.clone(),
        num: args.num,
        seed: args.seed,
        method_a_name: args.method_a_name.clone(),
        method_b_name: args.method_b_name.clone(),
        key_field: args.key_field.clone(),
    };
    let report = build_bank(&options, &mut translator)
        .await
        .context("构建题库失败")?;

    write_bank(&args.out, args.format, &report.questions)
        .await
        .with_context(|| format!("写出题库失败: {}", args.out.display()))?;
    translator.log_stats();

    print_stage_stats(
        "题库构建",
        &[
            ("对齐方式", format!("{:?}", report.align_mode)),
            ("可对齐", report.aligned.to_string()),
            ("A 侧丢弃", report.unmatched_a.to_string()),
            ("B 侧丢弃", report.unmatched_b.to_string()),
            ("写出题目", report.questions.len().to_string()),
            ("翻译", if translator.is_enabled() { "开启" } else { "关闭" }.to_string()),
            ("输出", args.out.display().to_string()),
        ],
    );
    Ok(report.questions.len())
}

async fn prepare_translator(config: &Config, args: &BuildArgs) -> Result<Translator> {
    if !args.translate_zh {
        return Ok(Translator::disabled());
    }

    let model = args
        .openai_model
        .clone()
        .unwrap_or_else(|| config.translate_model.clone());
    let cache = match &args.translate_cache {
        Some(path) => TranslationCache::open(path)
            .await
            .with_context(|| format!("打开翻译缓存失败: {}", path.display()))?,
        None => TranslationCache::in_memory(),
    };
    info!(
        "🌐 已开启翻译，模型: {}，缓存: {} 条",
        model,
        cache.len()
    );

    let backend = Arc::new(OpenAiTranslator::new(config, model));
    Ok(Translator::new(backend, cache, RetryPolicy::from_config(config)))
}

async fn write_bank(path: &std::path::Path, format: BankFormat, questions: &[ComparisonQuestion]) -> Result<()> {
    match format {
        BankFormat::Jsonl => write_jsonl(path, questions).await?,
        BankFormat::Json => write_json_pretty(path, questions).await?,
    }
    Ok(())
}
