//! 命令行定义

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::orchestrator::{
    run_build, run_export_bank, run_export_merge, run_import, run_pipeline, run_reclaim, run_split,
    BuildArgs, ExportBankArgs, ExportMergeArgs, ImportArgs, ReclaimArgs, SplitArgs,
};

/// 对比评测问卷工具：构建题库 → 拆分问卷 → 导入数据库 → 导出结果
#[derive(Debug, Parser)]
#[command(name = "survey-bank", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 由两份推理结果生成对比题库
    Build(BuildArgs),
    /// 把题库拆分成 m 份问卷
    Split(SplitArgs),
    /// 把问卷导入数据库
    Import(ImportArgs),
    /// 回收过期未提交的问卷
    Reclaim(ReclaimArgs),
    /// 按问卷导出答卷
    #[command(name = "export-merge")]
    ExportMerge(ExportMergeArgs),
    /// 按题库导出答卷
    #[command(name = "export-bank")]
    ExportBank(ExportBankArgs),
    /// 按 TOML 配置依次运行 build → split → import
    Pipeline {
        #[arg(long)]
        config: PathBuf,
    },
}

/// 执行子命令
pub async fn dispatch(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Command::Build(args) => {
            run_build(config, &args).await?;
        }
        Command::Split(args) => {
            run_split(&args).await?;
        }
        Command::Import(args) => {
            run_import(config, &args).await?;
        }
        Command::Reclaim(args) => {
            run_reclaim(config, &args).await?;
        }
        Command::ExportMerge(args) => {
            run_export_merge(config, &args).await?;
        }
        Command::ExportBank(args) => {
            run_export_bank(config, &args).await?;
        }
        Command::Pipeline { config: path } => {
            run_pipeline(config, &path).await?;
        }
    }
    Ok(())
}
