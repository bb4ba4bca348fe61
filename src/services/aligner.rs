//! 记录对齐 - 业务能力层
//!
//! 把方法 A / B 的推理结果按同一条输入配对

use std::collections::{HashMap, HashSet};

use crate::models::PredictionRecord;

/// 按下标对齐时抽查的最大行数
const INDEX_PROBE_ROWS: usize = 200;

/// 对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    /// 两份文件逐行对应
    ByIndex,
    /// 按对齐键做内连接
    ByKey,
}

/// 一对可比较的记录
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    /// 在来源文件中的行号（按键对齐时为 B 文件行号）
    pub row_index: usize,
    pub a: PredictionRecord,
    pub b: PredictionRecord,
}

/// 对齐结果
#[derive(Debug, Clone)]
pub struct Alignment {
    pub mode: AlignMode,
    pub pairs: Vec<AlignedPair>,
    /// A 中未被配对的键数
    pub unmatched_a: usize,
    /// B 中未被配对的行数
    pub unmatched_b: usize,
}

/// 对齐两份推理结果
///
/// 1. 行数相同且前 200 行中至少 90% 的键逐行相同 → 按下标对齐
/// 2. 否则按键连接：A 中同键取第一条，空键忽略，按 B 的顺序输出
pub fn align_records(rows_a: Vec<PredictionRecord>, rows_b: Vec<PredictionRecord>) -> Alignment {
    if rows_a.len() == rows_b.len() && !rows_a.is_empty() {
        let probe = rows_a.len().min(INDEX_PROBE_ROWS);
        let matched = rows_a
            .iter()
            .zip(rows_b.iter())
            .take(probe)
            .filter(|(a, b)| a.item_id == b.item_id)
            .count();
        if matched >= probe * 9 / 10 {
            let pairs = rows_a
                .into_iter()
                .zip(rows_b)
                .enumerate()
                .map(|(row_index, (a, b))| AlignedPair { row_index, a, b })
                .collect();
            return Alignment {
                mode: AlignMode::ByIndex,
                pairs,
                unmatched_a: 0,
                unmatched_b: 0,
            };
        }
    }

    let mut by_key: HashMap<String, PredictionRecord> = HashMap::new();
    for rec in rows_a {
        if !rec.item_id.is_empty() && !by_key.contains_key(&rec.item_id) {
            by_key.insert(rec.item_id.clone(), rec);
        }
    }

    let mut pairs = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut unmatched_b = 0;
    for (row_index, b) in rows_b.into_iter().enumerate() {
        match by_key.get(&b.item_id).filter(|_| !b.item_id.is_empty()) {
            Some(a) => {
                used.insert(b.item_id.clone());
                pairs.push(AlignedPair {
                    row_index,
                    a: a.clone(),
                    b,
                });
            }
            None => unmatched_b += 1,
        }
    }

    Alignment {
        mode: AlignMode::ByKey,
        pairs,
        unmatched_a: by_key.len() - used.len(),
        unmatched_b,
    }
}
