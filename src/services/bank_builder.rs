//! 题库构建 - 业务能力层
//!
//! 读取两份推理结果 → 对齐 → 抽样 → 逐条生成对比题
//!
//! 不负责写文件，写出格式由编排层决定

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{AppResult, InputMismatchError};
use crate::models::{load_records, ComparisonQuestion, PredictionRecord, TaskKind};
use crate::services::aligner::{align_records, AlignMode, AlignedPair};
use crate::services::Translator;
use crate::workflow::{QuestionCtx, QuestionFlow};

/// 构建参数
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub task: TaskKind,
    pub path_a: PathBuf,
    pub path_b: PathBuf,
    /// 抽样条数；<= 0 表示全部
    pub num: i64,
    pub seed: u64,
    pub method_a_name: String,
    pub method_b_name: String,
    /// 覆盖任务默认的对齐字段
    pub key_field: Option<String>,
}

/// 构建结果
#[derive(Debug)]
pub struct BuildReport {
    pub questions: Vec<ComparisonQuestion>,
    pub align_mode: AlignMode,
    pub aligned: usize,
    pub unmatched_a: usize,
    pub unmatched_b: usize,
}

/// 生成题库
pub async fn build_bank(opts: &BuildOptions, translator: &mut Translator) -> AppResult<BuildReport> {
    let mut fields = opts.task.field_mapping();
    if let Some(key) = opts.key_field.as_ref().filter(|k| !k.trim().is_empty()) {
        fields.key = key.clone();
    }

    let rows_a: Vec<PredictionRecord> = load_records(&opts.path_a)
        .await?
        .iter()
        .map(|obj| PredictionRecord::from_json(obj, &fields))
        .collect();
    let rows_b: Vec<PredictionRecord> = load_records(&opts.path_b)
        .await?
        .iter()
        .map(|obj| PredictionRecord::from_json(obj, &fields))
        .collect();
    info!(
        "📥 已读取 A: {} 条, B: {} 条 (对齐字段: {})",
        rows_a.len(),
        rows_b.len(),
        fields.key
    );

    let alignment = align_records(rows_a, rows_b);
    if alignment.pairs.is_empty() {
        return Err(InputMismatchError::NoAlignedRecords {
            path_a: opts.path_a.display().to_string(),
            path_b: opts.path_b.display().to_string(),
            key_field: fields.key,
        }
        .into());
    }
    if alignment.unmatched_a > 0 || alignment.unmatched_b > 0 {
        warn!(
            "⚠️ 有记录未能对齐，已丢弃: A 侧 {} 个键, B 侧 {} 行",
            alignment.unmatched_a, alignment.unmatched_b
        );
    }
    info!(
        "🔗 对齐方式: {:?}, 可用 {} 对",
        alignment.mode,
        alignment.pairs.len()
    );

    let aligned = alignment.pairs.len();
    let selected = sample_pairs(alignment.pairs, opts.num, opts.seed);

    let base_ctx = QuestionCtx {
        task: opts.task,
        method_a: opts.method_a_name.clone(),
        method_b: opts.method_b_name.clone(),
        path_a: opts.path_a.display().to_string(),
        path_b: opts.path_b.display().to_string(),
        row_index: 0,
        position: 0,
    };

    let total = selected.len();
    let mut questions = Vec::with_capacity(total);
    for (idx, pair) in selected.iter().enumerate() {
        let ctx = base_ctx.at(pair.row_index, idx + 1);
        questions.push(QuestionFlow::run(translator, &ctx, pair).await?);
        if (idx + 1) % 50 == 0 || idx + 1 == total {
            info!("✏️ 已生成 {}/{} 道题", idx + 1, total);
        }
    }

    Ok(BuildReport {
        questions,
        align_mode: alignment.mode,
        aligned,
        unmatched_a: alignment.unmatched_a,
        unmatched_b: alignment.unmatched_b,
    })
}

/// 按种子无放回抽样；`num` 不在 (0, len) 区间时保留全部并维持原顺序
pub fn sample_pairs(pairs: Vec<AlignedPair>, num: i64, seed: u64) -> Vec<AlignedPair> {
    if num <= 0 || num as usize >= pairs.len() {
        return pairs;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    pairs
        .choose_multiple(&mut rng, num as usize)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::TranslationCache;
    use crate::services::translator::tests::{fast_policy, FakeBackend};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_lines(path: &Path, ids: &[&str], response: &str) {
        let body: String = ids
            .iter()
            .map(|id| {
                json!({
                    "input": format!("question {}", id),
                    "id": id,
                    "response": format!("{} {}", response, id),
                    "value_ids": [1, 0, 0, 0, 0, 0, 0, 0, 0, 1],
                })
                .to_string()
                    + "\n"
            })
            .collect();
        std::fs::write(path, body).unwrap();
    }

    fn options(dir: &Path, num: i64) -> BuildOptions {
        BuildOptions {
            task: TaskKind::Value,
            path_a: dir.join("a.jsonl"),
            path_b: dir.join("b.jsonl"),
            num,
            seed: 42,
            method_a_name: "methodA".to_string(),
            method_b_name: "methodB".to_string(),
            key_field: Some("id".to_string()),
        }
    }

    #[tokio::test]
    async fn test_partial_overlap_samples_only_shared_items() {
        let dir = tempdir().unwrap();
        write_lines(&dir.path().join("a.jsonl"), &["1", "2", "3"], "a");
        write_lines(&dir.path().join("b.jsonl"), &["2", "3", "4"], "b");

        let mut translator = Translator::disabled();
        let report = build_bank(&options(dir.path(), 2), &mut translator).await.unwrap();

        assert_eq!(report.align_mode, AlignMode::ByKey);
        assert_eq!(report.questions.len(), 2);
        for q in &report.questions {
            assert!(q.raw.input == "question 2" || q.raw.input == "question 3");
            assert_eq!(q.target_labels.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_disjoint_ids_is_input_mismatch() {
        let dir = tempdir().unwrap();
        write_lines(&dir.path().join("a.jsonl"), &["1", "2"], "a");
        write_lines(&dir.path().join("b.jsonl"), &["8", "9", "10"], "b");

        let mut translator = Translator::disabled();
        let err = build_bank(&options(dir.path(), 0), &mut translator).await.unwrap_err();
        assert!(matches!(err, AppError::InputMismatch(_)));
    }

    #[tokio::test]
    async fn test_translation_enabled_marks_questions() {
        let dir = tempdir().unwrap();
        write_lines(&dir.path().join("a.jsonl"), &["1", "2"], "a");
        write_lines(&dir.path().join("b.jsonl"), &["1", "2"], "b");

        let backend = Arc::new(FakeBackend::new(0));
        let mut translator = Translator::new(backend, TranslationCache::in_memory(), fast_policy(1));
        let report = build_bank(&options(dir.path(), 0), &mut translator).await.unwrap();

        assert_eq!(report.align_mode, AlignMode::ByIndex);
        assert!(report.questions.iter().all(|q| q.translated));
        // 两题的题干相同，第二次命中缓存
        assert!(translator.cache_hits() >= 1);
    }

    #[test]
    fn test_sample_pairs_is_seeded() {
        let pairs: Vec<AlignedPair> = (0..20)
            .map(|i| AlignedPair {
                row_index: i,
                a: PredictionRecord {
                    item_id: i.to_string(),
                    input: String::new(),
                    response: String::new(),
                    label_ids: Vec::new(),
                    pred_label_ids: None,
                },
                b: PredictionRecord {
                    item_id: i.to_string(),
                    input: String::new(),
                    response: String::new(),
                    label_ids: Vec::new(),
                    pred_label_ids: None,
                },
            })
            .collect();

        let first = sample_pairs(pairs.clone(), 5, 7);
        let second = sample_pairs(pairs.clone(), 5, 7);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(sample_pairs(pairs.clone(), 0, 7).len(), 20);
        assert_eq!(sample_pairs(pairs, 99, 7).len(), 20);
    }
}
