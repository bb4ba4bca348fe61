//! 数据库行结构

use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};

use crate::models::questionnaire::QuestionnaireFile;

/// 问卷状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionnaireStatus {
    Available,
    InProgress,
    Done,
}

impl QuestionnaireStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionnaireStatus::Available => "available",
            QuestionnaireStatus::InProgress => "in_progress",
            QuestionnaireStatus::Done => "done",
        }
    }
}

/// 待导入的一份问卷
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionnaireRecord {
    /// 相对路径（POSIX 分隔符），同时作为主键
    pub qid: String,
    /// 相对路径的第一段
    pub bank: String,
    pub rel_path: String,
    /// `{meta, questions, source: {bank, rel_path}}`
    pub payload: Value,
    pub question_count: usize,
}

impl QuestionnaireRecord {
    pub fn from_file(rel_path: &str, bank: &str, file: QuestionnaireFile) -> Self {
        let question_count = file.questions.len();
        let payload = json!({
            "meta": Value::Object(file.meta),
            "questions": Value::Array(file.questions),
            "source": {"bank": bank, "rel_path": rel_path},
        });
        Self {
            qid: rel_path.to_string(),
            bank: bank.to_string(),
            rel_path: rel_path.to_string(),
            payload,
            question_count,
        }
    }
}

/// 库中的一份问卷
#[derive(Debug, Clone, PartialEq)]
pub struct StoredQuestionnaire {
    pub qid: String,
    pub bank: String,
    pub rel_path: String,
    pub payload: Value,
    pub question_count: i64,
    pub status: String,
    pub claimed_by: Option<String>,
}

impl StoredQuestionnaire {
    pub fn meta(&self) -> Map<String, Value> {
        match self.payload.get("meta") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        }
    }

    pub fn questions(&self) -> &[Value] {
        match self.payload.get("questions") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }
}

/// 一份答卷
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    /// 问卷 id（questionnaires.qid），不是题目 qid
    pub questionnaire_id: String,
    pub sid: String,
    pub submitted_at: Option<NaiveDateTime>,
    /// `{题目 qid: "A" | "B" | "C"}`
    pub answers: Map<String, Value>,
}

impl SubmissionRow {
    /// `YYYY-MM-DD HH:MM:SS`，缺失为空串
    pub fn submitted_at_text(&self) -> String {
        self.submitted_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}
