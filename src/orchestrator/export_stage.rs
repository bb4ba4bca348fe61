//! 结果导出阶段 - 编排层
//!
//! - `export-merge`：每份问卷导出一个文件，保持 `<bank>/<问卷文件>` 结构
//! - `export-bank`：每个题库导出一个去重后的题目文件

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::TidbStore;
use crate::models::loaders::{write_jsonl, write_questionnaire};
use crate::orchestrator::store_ops::StoreArgs;
use crate::services::{merge_into_banks, merge_questionnaire};
use crate::utils::logging::{log_stage_start, print_stage_stats};

/// `export-merge` 参数
#[derive(Debug, Clone, Args)]
pub struct ExportMergeArgs {
    /// 导出根目录
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,
    /// 只导出 status = done 的问卷
    #[arg(long = "only_done")]
    pub only_done: bool,
    /// 只导出前 N 份，0 表示全部
    #[arg(long, default_value_t = 0)]
    pub limit: usize,
    #[command(flatten)]
    pub store: StoreArgs,
}

/// `export-bank` 参数
#[derive(Debug, Clone, Args)]
pub struct ExportBankArgs {
    /// 导出根目录，生成 `<output_dir>/<bank>/<out_name>`
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,
    /// 只用 status = done 的问卷建立题目索引
    #[arg(long = "only_done")]
    pub only_done: bool,
    /// 只导出指定题库
    #[arg(long)]
    pub bank: Option<String>,
    #[arg(long = "out_name", default_value = "bank_merged.jsonl")]
    pub out_name: String,
    #[command(flatten)]
    pub store: StoreArgs,
}

/// 按问卷导出，返回写出的文件数
pub async fn run_export_merge(config: &Config, args: &ExportMergeArgs) -> Result<usize> {
    log_stage_start("按问卷导出", &args.output_dir.display().to_string());
    let store = args.store.connect(config).await?;

    let mut questionnaires = store
        .fetch_questionnaires(args.only_done)
        .await
        .context("读取问卷失败")?;
    if args.limit > 0 {
        questionnaires.truncate(args.limit);
    }
    let total = questionnaires.len();
    info!("🔍 问卷 {} 份 (only_done={})", total, args.only_done);

    let exported_at = now_text();
    let mut written = 0;
    let mut submissions_seen = 0;
    for (idx, q) in questionnaires.iter().enumerate() {
        let submissions = store
            .fetch_submissions_for(&q.qid)
            .await
            .with_context(|| format!("读取答卷失败: {}", q.qid))?;
        submissions_seen += submissions.len();

        let (meta, merged) = merge_questionnaire(q, &submissions, &exported_at);
        let out_path = args.output_dir.join(&q.rel_path);
        write_questionnaire(&out_path, &meta, &merged)
            .await
            .with_context(|| format!("写出失败: {}", out_path.display()))?;

        written += 1;
        if written % 50 == 0 || idx + 1 == total {
            info!("📤 已写出 {}/{} (答卷 {} 份)", written, total, submissions_seen);
        }
    }

    print_stage_stats(
        "按问卷导出",
        &[
            ("导出问卷", written.to_string()),
            ("处理答卷", submissions_seen.to_string()),
            ("输出目录", args.output_dir.display().to_string()),
        ],
    );
    Ok(written)
}

/// 按题库导出，返回写出的题目总数
pub async fn run_export_bank(config: &Config, args: &ExportBankArgs) -> Result<usize> {
    log_stage_start("按题库导出", &args.output_dir.display().to_string());
    let store = args.store.connect(config).await?;
    export_banks_from(&store, args).await
}

async fn export_banks_from(store: &TidbStore, args: &ExportBankArgs) -> Result<usize> {
    let questionnaires = store
        .fetch_questionnaires(args.only_done)
        .await
        .context("读取问卷失败")?;
    info!("🔍 问卷 {} 份 (only_done={})", questionnaires.len(), args.only_done);

    let submissions = store.fetch_all_submissions().await.context("读取答卷失败")?;
    info!("🔍 答卷 {} 份", submissions.len());

    let export = merge_into_banks(&questionnaires, &submissions, args.bank.as_deref());
    if export.banks.is_empty() {
        bail!("没有可导出的题目，请检查 --only_done / --bank 过滤条件");
    }
    info!("🧩 追加 choice 记录 {} 条", export.appended);
    if export.missed_submissions > 0 {
        warn!(
            "⚠️ 有 {} 份答卷对应的问卷不在本次索引中（可能被 --only_done 或 --bank 过滤）",
            export.missed_submissions
        );
    }

    for (bank, items) in &export.banks {
        let out_path = bank_output_path(&args.output_dir, bank, &args.out_name);
        write_jsonl(&out_path, items)
            .await
            .with_context(|| format!("写出失败: {}", out_path.display()))?;
        info!("📤 {}: {} 道题 -> {}", bank, items.len(), out_path.display());
    }

    let total = export.total_items();
    print_stage_stats(
        "按题库导出",
        &[
            ("题库数", export.banks.len().to_string()),
            ("去重题目", total.to_string()),
            ("输出目录", args.output_dir.display().to_string()),
        ],
    );
    Ok(total)
}

fn bank_output_path(output_dir: &Path, bank: &str, out_name: &str) -> PathBuf {
    output_dir.join(bank).join(out_name)
}

fn now_text() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
