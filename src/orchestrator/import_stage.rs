//! 问卷导入阶段 - 编排层
//!
//! 扫描 → （演练时只列出）→ 连接数据库 → 分批导入

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::infrastructure::QuestionnaireSink;
use crate::orchestrator::split_stage::default_prefix;
use crate::orchestrator::store_ops::StoreArgs;
use crate::services::importer::questionnaire_identity;
use crate::services::{import_questionnaires, scan_questionnaires, ImportOptions, ImportReport};
use crate::utils::logging::{log_stage_start, print_stage_stats};

/// 演练模式列出的问卷数
const DRY_RUN_PREVIEW: usize = 10;

/// `import` 参数
#[derive(Debug, Clone, Args, Deserialize)]
pub struct ImportArgs {
    /// 问卷根目录（递归扫描 `<prefix>_*.jsonl`）
    #[arg(long = "banks_dir")]
    pub banks_dir: PathBuf,
    /// 导入前清空 questionnaires / submissions
    #[arg(long)]
    #[serde(default)]
    pub reset: bool,
    /// 只扫描统计，不连接数据库
    #[arg(long = "dry_run")]
    #[serde(default)]
    pub dry_run: bool,
    /// 只导入前 N 份，0 表示全部
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub limit: usize,
    /// 每 N 份提交一次
    #[arg(long, default_value_t = 200)]
    #[serde(default = "default_batch")]
    pub batch: usize,
    #[arg(long, default_value = "questionnaire")]
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[command(flatten)]
    #[serde(flatten)]
    pub store: StoreArgs,
}

fn default_batch() -> usize {
    200
}

/// 运行导入阶段；演练模式返回 None
pub async fn run_import(config: &Config, args: &ImportArgs) -> Result<Option<ImportReport>> {
    log_stage_start("问卷导入", &args.banks_dir.display().to_string());

    let files = scan_target_files(args).await?;
    info!("🔍 共找到 {} 份问卷", files.len());

    if args.dry_run {
        for path in files.iter().take(DRY_RUN_PREVIEW) {
            let (rel_path, bank) = questionnaire_identity(&args.banks_dir, path);
            info!("  - {} / {}", bank, rel_path);
        }
        info!("🧪 演练结束，未写入数据库");
        return Ok(None);
    }

    let store = args.store.connect(config).await?;
    let report = import_into(&store, args, &files).await?;
    Ok(Some(report))
}

/// 扫描并按 `--limit` 截断
pub async fn scan_target_files(args: &ImportArgs) -> Result<Vec<PathBuf>> {
    let mut files = scan_questionnaires(&args.banks_dir, &args.prefix)
        .await
        .with_context(|| format!("扫描问卷目录失败: {}", args.banks_dir.display()))?;
    if args.limit > 0 {
        files.truncate(args.limit);
    }
    Ok(files)
}

/// 导入到任意写入目标
pub async fn import_into(
    sink: &dyn QuestionnaireSink,
    args: &ImportArgs,
    files: &[PathBuf],
) -> Result<ImportReport> {
    let options = ImportOptions {
        reset: args.reset,
        batch: args.batch,
    };
    let report = import_questionnaires(sink, &args.banks_dir, files, &options)
        .await
        .context("导入问卷失败")?;

    print_stage_stats(
        "问卷导入",
        &[
            ("导入问卷", report.imported.to_string()),
            ("已完成(meta)", report.already_done.to_string()),
            ("表中总行数", report.total_rows.to_string()),
        ],
    );
    Ok(report)
}
