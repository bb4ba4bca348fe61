//! 题库拆分阶段 - 编排层

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::models::load_bank;
use crate::models::loaders::write_jsonl;
use crate::services::bank_splitter::{default_out_dir, questionnaire_file_name};
use crate::services::{split_bank, SplitPlan};
use crate::utils::logging::{log_stage_start, print_stage_stats};

/// `split` 参数
#[derive(Debug, Clone, Args, Deserialize)]
pub struct SplitArgs {
    /// 题库文件（JSON 或 JSONL）；流水线中缺省为 build 的输出
    #[arg(long)]
    #[serde(default)]
    pub bank: PathBuf,
    /// 问卷份数
    #[arg(long)]
    pub m: usize,
    /// 每道题出现在多少份问卷中（<= m）
    #[arg(long)]
    pub n: usize,
    #[arg(long, default_value_t = 42)]
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// 问卷文件名前缀
    #[arg(long, default_value = "questionnaire")]
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[arg(long = "max-attempts", default_value_t = 30)]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// 输出目录，默认 `<题库目录>/../questions/<题库名>`
    #[arg(long = "out-dir")]
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

fn default_seed() -> u64 {
    42
}

pub(crate) fn default_prefix() -> String {
    "questionnaire".to_string()
}

fn default_max_attempts() -> usize {
    30
}

/// 拆分结果
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub out_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub per_questionnaire: usize,
}

/// 运行拆分阶段
pub async fn run_split(args: &SplitArgs) -> Result<SplitOutcome> {
    log_stage_start("题库拆分", &args.bank.display().to_string());

    let bank = load_bank(&args.bank)
        .await
        .with_context(|| format!("读取题库失败: {}", args.bank.display()))?;
    let plan = SplitPlan {
        m: args.m,
        n: args.n,
        seed: args.seed,
        max_attempts: args.max_attempts,
    };
    let buckets = split_bank(&bank, &plan).context("拆分题库失败")?;

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| default_out_dir(&args.bank));

    let mut files = Vec::with_capacity(buckets.len());
    for (idx, bucket) in buckets.iter().enumerate() {
        let path = out_dir.join(questionnaire_file_name(&args.prefix, idx + 1));
        write_jsonl(&path, bucket)
            .await
            .with_context(|| format!("写出问卷失败: {}", path.display()))?;
        files.push(path);
    }

    let per_questionnaire = buckets.first().map(Vec::len).unwrap_or(0);
    info!(
        "📝 示例: {} ... {}",
        questionnaire_file_name(&args.prefix, 1),
        questionnaire_file_name(&args.prefix, args.m)
    );
    print_stage_stats(
        "题库拆分",
        &[
            ("题库题数 N", bank.len().to_string()),
            ("问卷份数 m", args.m.to_string()),
            ("每题重复 n", args.n.to_string()),
            ("总分配数", (bank.len() * args.n).to_string()),
            ("每份题数", per_questionnaire.to_string()),
            ("输出目录", out_dir.display().to_string()),
        ],
    );

    Ok(SplitOutcome {
        out_dir,
        files,
        per_questionnaire,
    })
}
