//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责阶段调度与资源管理，是整个系统的"指挥中心"。
//! 每个阶段对应一个子命令，参数结构同时用于命令行与流水线 TOML。
//!
//! ## 模块划分
//!
//! ### `build_stage` - 题库构建
//! - 创建翻译客户端与翻译缓存（只有开启翻译时）
//! - 委托 `services::build_bank` 完成对齐、抽样、逐题生成
//! - 按格式写出题库
//!
//! ### `split_stage` - 题库拆分
//! - 读取题库，委托 `services::split_bank`
//! - 写出 `<prefix>_001.jsonl ... <prefix>_m.jsonl`
//!
//! ### `import_stage` - 问卷导入
//! - 扫描问卷目录，演练模式只列出不连接
//! - 连接数据库后分批 upsert
//!
//! ### `export_stage` - 结果导出
//! - 按问卷 / 按题库把答卷合并回题目
//!
//! ### `store_ops` - 连接参数与运维
//! - 命令行覆盖配置中的连接参数
//! - 回收过期锁
//!
//! ### `pipeline` - 一键流水线
//! - build → split →（可选）import
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator (阶段: build / split / import / export)
//!     ↓
//! workflow::QuestionFlow (单道对比题)
//!     ↓
//! services (能力层：对齐 / 翻译 / 拆分 / 导入 / 导出)
//!     ↓
//! infrastructure (基础设施：TidbStore / TranslationCache)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：一个阶段一个模块
//! 2. **资源隔离**：只有编排层创建数据库连接与翻译客户端
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod build_stage;
pub mod export_stage;
pub mod import_stage;
pub mod pipeline;
pub mod split_stage;
pub mod store_ops;

// 重新导出主要类型
pub use build_stage::{run_build, BankFormat, BuildArgs};
pub use export_stage::{run_export_bank, run_export_merge, ExportBankArgs, ExportMergeArgs};
pub use import_stage::{run_import, ImportArgs};
pub use pipeline::{run_pipeline, PipelineFile};
pub use split_stage::{run_split, SplitArgs, SplitOutcome};
pub use store_ops::{run_reclaim, ReclaimArgs, StoreArgs};
