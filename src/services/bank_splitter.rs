//! 题库拆分 - 业务能力层
//!
//! 把 N 道题拆成 m 份问卷，每道题出现在 n 份不同的问卷中，
//! 每份问卷恰好 N·n/m 道题且不含重复 qid。
//!
//! 算法：多轮尝试（每轮不同种子），每轮按"容量约束 + 最少负载优先"贪心分配。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppResult, InsufficientQuestionsError};
use crate::models::{AssignedQuestion, ComparisonQuestion};
use crate::utils::content_hash;

const ATTEMPT_SEED_STRIDE: u64 = 10007;
const BUCKET_SEED_STRIDE: u64 = 97;
const RESHUFFLE_SEED_STRIDE: u64 = 99991;
const MAX_RESHUFFLES: u64 = 20;
/// 题库里遗留的实例编号会被本次拆分覆盖
const INSTANCE_ID_KEY: &str = "instance_id";

/// 拆分参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    /// 问卷份数
    pub m: usize,
    /// 每道题出现的问卷份数
    pub n: usize,
    pub seed: u64,
    pub max_attempts: usize,
}

impl SplitPlan {
    pub fn new(m: usize, n: usize, seed: u64) -> Self {
        Self {
            m,
            n,
            seed,
            max_attempts: 30,
        }
    }

    /// 校验参数并返回每份问卷的题数
    pub fn questions_per_questionnaire(&self, bank_size: usize) -> AppResult<usize> {
        let (m, n) = (self.m, self.n);
        if m == 0 || n == 0 {
            return Err(InsufficientQuestionsError::InvalidCounts { m, n }.into());
        }
        if n > m {
            return Err(InsufficientQuestionsError::RepeatsExceedQuestionnaires { m, n }.into());
        }
        if bank_size == 0 {
            return Err(InsufficientQuestionsError::EmptyBank.into());
        }
        let total = bank_size * n;
        if total % m != 0 {
            return Err(InsufficientQuestionsError::NotDivisible { total, m }.into());
        }
        Ok(total / m)
    }
}

/// 拆分题库
///
/// 同一题库 + 同一参数 ⇒ 完全相同的结果
pub fn split_bank(
    bank: &[ComparisonQuestion],
    plan: &SplitPlan,
) -> AppResult<Vec<Vec<AssignedQuestion>>> {
    let target_len = plan.questions_per_questionnaire(bank.len())?;
    if let Some(index) = bank.iter().position(|q| q.qid.trim().is_empty()) {
        return Err(InsufficientQuestionsError::MissingQid { index }.into());
    }

    for attempt in 0..plan.max_attempts {
        let attempt_seed = plan
            .seed
            .wrapping_add((attempt as u64).wrapping_mul(ATTEMPT_SEED_STRIDE));
        match try_split(bank, plan, target_len, attempt, attempt_seed) {
            Some(buckets) => {
                debug!("第 {} 轮拆分成功", attempt + 1);
                return Ok(buckets);
            }
            None => debug!("第 {} 轮拆分失败，换种子重试", attempt + 1),
        }
    }

    Err(InsufficientQuestionsError::AttemptsExhausted {
        attempts: plan.max_attempts,
    }
    .into())
}

/// 单轮尝试；失败返回 None
fn try_split(
    bank: &[ComparisonQuestion],
    plan: &SplitPlan,
    target_len: usize,
    attempt: usize,
    attempt_seed: u64,
) -> Option<Vec<Vec<AssignedQuestion>>> {
    let m = plan.m;
    let mut rng = StdRng::seed_from_u64(attempt_seed);

    let mut order: Vec<&ComparisonQuestion> = bank.iter().collect();
    order.shuffle(&mut rng);

    let mut buckets: Vec<Vec<AssignedQuestion>> = vec![Vec::with_capacity(target_len); m];
    let mut bucket_qids: Vec<HashSet<&str>> = vec![HashSet::new(); m];

    for question in order {
        let qid = question.qid.as_str();
        let mut candidates: Vec<(usize, f64)> = (0..m)
            .filter(|&bi| buckets[bi].len() < target_len && !bucket_qids[bi].contains(qid))
            .map(|bi| (bi, rng.gen::<f64>()))
            .collect();
        if candidates.len() < plan.n {
            return None;
        }

        // 负载小的优先，同负载随机
        candidates.sort_by(|(x, rx), (y, ry)| {
            buckets[*x]
                .len()
                .cmp(&buckets[*y].len())
                .then(rx.total_cmp(ry))
        });

        let mut copy = question.clone();
        copy.extra.remove(INSTANCE_ID_KEY);
        for &(bi, _) in candidates.iter().take(plan.n) {
            let position = buckets[bi].len();
            buckets[bi].push(AssignedQuestion {
                question: copy.clone(),
                instance_id: format!("{}#{}-{}-{}", qid, attempt, bi, position),
            });
            bucket_qids[bi].insert(qid);
        }
    }

    if buckets.iter().any(|b| b.len() != target_len) {
        return None;
    }

    for (bi, bucket) in buckets.iter_mut().enumerate() {
        let mut rng_b = StdRng::seed_from_u64(
            attempt_seed.wrapping_add((bi as u64).wrapping_mul(BUCKET_SEED_STRIDE)),
        );
        bucket.shuffle(&mut rng_b);
    }

    // 不允许出现题目顺序完全相同的两份问卷
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (bi, bucket) in buckets.iter_mut().enumerate() {
        let mut sig = order_signature(bucket);
        let mut t: u64 = 0;
        while seen.contains_key(&sig) {
            if t == MAX_RESHUFFLES {
                return None;
            }
            t += 1;
            let mut rng_b = StdRng::seed_from_u64(
                attempt_seed
                    .wrapping_add((bi as u64).wrapping_mul(BUCKET_SEED_STRIDE))
                    .wrapping_add(t.wrapping_mul(RESHUFFLE_SEED_STRIDE)),
            );
            bucket.shuffle(&mut rng_b);
            sig = order_signature(bucket);
        }
        seen.insert(sig, bi);
    }

    Some(buckets)
}

fn order_signature(bucket: &[AssignedQuestion]) -> String {
    let joined = bucket
        .iter()
        .map(AssignedQuestion::qid)
        .collect::<Vec<_>>()
        .join("|");
    content_hash(&joined)
}

/// 默认输出目录：`<题库所在目录>/../questions/<题库文件名去后缀>`
pub fn default_out_dir(bank_path: &Path) -> PathBuf {
    let root = bank_path
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    let stem = bank_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bank".to_string());
    root.join("questions").join(stem)
}

/// 第 `index` 份（从 1 开始）问卷的文件名
pub fn questionnaire_file_name(prefix: &str, index: usize) -> String {
    format!("{}_{:03}.jsonl", prefix, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{RawPair, SourceRef, TaskKind};
    use proptest::prelude::*;

    fn bank(size: usize) -> Vec<ComparisonQuestion> {
        (0..size)
            .map(|i| ComparisonQuestion {
                qid: format!("value-{:016x}", i),
                task: TaskKind::Value,
                method_a: "methodA".to_string(),
                method_b: "methodB".to_string(),
                source: SourceRef {
                    path_a: "a.jsonl".to_string(),
                    path_b: "b.jsonl".to_string(),
                    row_index: i,
                },
                target_labels: Vec::new(),
                prompt: format!("prompt {}", i),
                options: Vec::new(),
                translated: false,
                raw: RawPair {
                    input: String::new(),
                    response_a: String::new(),
                    response_b: String::new(),
                    value_ids: Vec::new(),
                    pred_value_ids_a: None,
                    pred_value_ids_b: None,
                },
                extra: serde_json::Map::new(),
            })
            .collect()
    }

    fn qids(buckets: &[Vec<AssignedQuestion>]) -> Vec<Vec<String>> {
        buckets
            .iter()
            .map(|b| b.iter().map(|q| q.qid().to_string()).collect())
            .collect()
    }

    #[test]
    fn test_ten_questions_five_questionnaires_three_repeats() {
        let bank = bank(10);
        let plan = SplitPlan::new(5, 3, 42);

        let first = split_bank(&bank, &plan).unwrap();
        let second = split_bank(&bank, &plan).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|b| b.len() == 6));

        let mut appearances: HashMap<String, usize> = HashMap::new();
        for bucket in qids(&first) {
            let unique: HashSet<&String> = bucket.iter().collect();
            assert_eq!(unique.len(), bucket.len());
            for qid in bucket {
                *appearances.entry(qid).or_default() += 1;
            }
        }
        assert_eq!(appearances.len(), 10);
        assert!(appearances.values().all(|&c| c == 3));
    }

    #[test]
    fn test_instance_id_format() {
        let buckets = split_bank(&bank(4), &SplitPlan::new(2, 1, 1)).unwrap();
        let q = &buckets[0][0];
        let (qid, rest) = q.instance_id.split_once('#').unwrap();
        assert_eq!(qid, q.qid());
        assert_eq!(rest.split('-').count(), 3);
    }

    #[test]
    fn test_invalid_plans() {
        let b = bank(10);
        let cases = [
            SplitPlan::new(0, 1, 42),
            SplitPlan::new(3, 4, 42),
            SplitPlan::new(3, 1, 42),
        ];
        for plan in cases {
            assert!(matches!(
                split_bank(&b, &plan),
                Err(AppError::InsufficientQuestions(_))
            ));
        }
        assert!(matches!(
            split_bank(&[], &SplitPlan::new(1, 1, 42)),
            Err(AppError::InsufficientQuestions(InsufficientQuestionsError::EmptyBank))
        ));
    }

    #[test]
    fn test_missing_qid_is_rejected() {
        let mut b = bank(4);
        b[2].qid = String::new();
        assert!(matches!(
            split_bank(&b, &SplitPlan::new(2, 1, 42)),
            Err(AppError::InsufficientQuestions(InsufficientQuestionsError::MissingQid { index: 2 }))
        ));
    }

    #[tokio::test]
    async fn test_bank_line_without_qid_reports_missing_qid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.jsonl");
        let mut lines: Vec<serde_json::Value> = bank(4)
            .iter()
            .map(|q| serde_json::to_value(q).unwrap())
            .collect();
        lines[1].as_object_mut().unwrap().remove("qid");
        let body: String = lines.iter().map(|v| format!("{}\n", v)).collect();
        std::fs::write(&path, body).unwrap();

        let loaded = crate::models::load_bank(&path).await.unwrap();
        assert!(loaded[1].qid.is_empty());
        assert!(matches!(
            split_bank(&loaded, &SplitPlan::new(2, 1, 42)),
            Err(AppError::InsufficientQuestions(InsufficientQuestionsError::MissingQid { index: 1 }))
        ));
    }

    #[test]
    fn test_extra_bank_fields_survive_split() {
        let mut item = serde_json::to_value(&bank(1)[0]).unwrap();
        let obj = item.as_object_mut().unwrap();
        obj.insert("reviewer_note".to_string(), serde_json::json!("checked"));
        obj.insert("instance_id".to_string(), serde_json::json!("stale#0-0-0"));
        let question: ComparisonQuestion = serde_json::from_value(item).unwrap();
        assert_eq!(question.extra["reviewer_note"], "checked");

        let buckets = split_bank(&[question], &SplitPlan::new(1, 1, 42)).unwrap();
        let written = serde_json::to_value(&buckets[0][0]).unwrap();
        assert_eq!(written["reviewer_note"], "checked");
        assert_eq!(written["instance_id"], format!("{}#0-0-0", buckets[0][0].qid()));
        assert_eq!(written["qid"], "value-0000000000000000");
    }

    #[test]
    fn test_identical_questionnaires_exhaust_attempts() {
        // 一道题放进两份问卷，两份必然完全相同
        let mut plan = SplitPlan::new(2, 2, 42);
        plan.max_attempts = 3;
        assert!(matches!(
            split_bank(&bank(1), &plan),
            Err(AppError::InsufficientQuestions(
                InsufficientQuestionsError::AttemptsExhausted { attempts: 3 }
            ))
        ));
    }

    #[test]
    fn test_default_out_dir_and_file_name() {
        assert_eq!(
            default_out_dir(Path::new("data/banks/value_bank.jsonl")),
            PathBuf::from("data/questions/value_bank")
        );
        assert_eq!(
            default_out_dir(Path::new("value_bank.jsonl")),
            PathBuf::from("questions/value_bank")
        );
        assert_eq!(questionnaire_file_name("questionnaire", 7), "questionnaire_007.jsonl");
    }

    proptest! {
        #[test]
        fn prop_split_is_deterministic_and_balanced(
            size in 1usize..40,
            m in 1usize..7,
            n_raw in 1usize..7,
            seed in 0u64..1000,
        ) {
            let n = n_raw.min(m);
            prop_assume!((size * n) % m == 0);

            let b = bank(size);
            let plan = SplitPlan::new(m, n, seed);
            let first = split_bank(&b, &plan);
            let second = split_bank(&b, &plan);

            match (first, second) {
                (Ok(x), Ok(y)) => {
                    prop_assert_eq!(&x, &y);
                    let known: HashSet<&str> = b.iter().map(|q| q.qid.as_str()).collect();
                    for bucket in &x {
                        prop_assert_eq!(bucket.len(), size * n / m);
                        let unique: HashSet<&str> = bucket.iter().map(AssignedQuestion::qid).collect();
                        prop_assert_eq!(unique.len(), bucket.len());
                        prop_assert!(unique.iter().all(|q| known.contains(q)));
                    }
                }
                (Err(AppError::InsufficientQuestions(InsufficientQuestionsError::AttemptsExhausted { .. })),
                 Err(AppError::InsufficientQuestions(InsufficientQuestionsError::AttemptsExhausted { .. }))) => {}
                (x, y) => prop_assert!(false, "unexpected outcome: {:?} / {:?}", x.is_ok(), y.is_ok()),
            }
        }
    }
}
