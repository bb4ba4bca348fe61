//! 问卷写入目标
//!
//! 导入流程只依赖这个 trait；生产环境是 `TidbStore`，测试与离线演练用 `MemorySink`

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::AppResult;
use crate::models::{QuestionnaireRecord, QuestionnaireStatus};

/// 问卷写入目标
#[async_trait]
pub trait QuestionnaireSink: Send + Sync {
    /// 建表；`reset` 为真时清空已有数据
    async fn prepare(&self, reset: bool) -> AppResult<()>;

    /// 写入一批问卷；主键冲突时只更新内容，保留状态
    async fn upsert_batch(&self, rows: &[QuestionnaireRecord]) -> AppResult<()>;

    /// 当前问卷总数
    async fn count(&self) -> AppResult<u64>;
}

/// 内存中的问卷表
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<String, (QuestionnaireRecord, QuestionnaireStatus)>>,
    commits: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按主键排序的全部问卷
    pub fn records(&self) -> Vec<QuestionnaireRecord> {
        self.lock_rows().values().map(|(r, _)| r.clone()).collect()
    }

    pub fn status_of(&self, qid: &str) -> Option<QuestionnaireStatus> {
        self.lock_rows().get(qid).map(|(_, s)| *s)
    }

    /// 修改状态（模拟填写端领取 / 提交）
    pub fn set_status(&self, qid: &str, status: QuestionnaireStatus) {
        if let Some(entry) = self.lock_rows().get_mut(qid) {
            entry.1 = status;
        }
    }

    /// 已提交的批次数
    pub fn commits(&self) -> usize {
        *self.commits.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_rows(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, (QuestionnaireRecord, QuestionnaireStatus)>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QuestionnaireSink for MemorySink {
    async fn prepare(&self, reset: bool) -> AppResult<()> {
        if reset {
            self.lock_rows().clear();
        }
        Ok(())
    }

    async fn upsert_batch(&self, rows: &[QuestionnaireRecord]) -> AppResult<()> {
        let mut table = self.lock_rows();
        for row in rows {
            let status = table
                .get(&row.qid)
                .map(|(_, s)| *s)
                .unwrap_or(QuestionnaireStatus::Available);
            table.insert(row.qid.clone(), (row.clone(), status));
        }
        *self.commits.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.lock_rows().len() as u64)
    }
}
