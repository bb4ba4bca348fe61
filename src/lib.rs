//! # Survey Bank
//!
//! 成对人工评测问卷工具：把两个方法的推理结果做成对比题库，
//! 拆分成多份问卷导入 TiDB，收集答卷后再导出合并。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `TidbStore` - 数据库连接池与全部 SQL
//! - `TranslationCache` - 译文缓存文件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `aligner` - 对齐两份推理结果
//! - `Translator` - 带缓存与重试的翻译
//! - `bank_splitter` - 题库拆分
//! - `importer` / `exporter` - 导入与导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道对比题"的完整生成流程
//! - `QuestionCtx` - 上下文封装（任务 + 方法名 + 行号）
//! - `QuestionFlow` - 流程编排（标签 → 题干/选项 → 翻译 → qid）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 每个子命令一个阶段，负责资源创建与统计输出
//!
//! ## 模块结构

pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{MemorySink, QuestionnaireSink, TidbStore, TranslationCache};
pub use models::{AssignedQuestion, ComparisonQuestion, TaskKind};
pub use services::{build_bank, split_bank, BuildOptions, SplitPlan, Translator};
pub use workflow::{QuestionCtx, QuestionFlow};
