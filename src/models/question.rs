use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::task::TaskKind;

/// 目标标签（名称 + 解释）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLabel {
    pub name: String,
    pub desc: String,
}

/// 选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub key: String,
    pub text: String,
}

impl AnswerOption {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// 题目来源（用于回溯）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub path_a: String,
    pub path_b: String,
    pub row_index: usize,
}

/// 原始内容，不展示给填写者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPair {
    pub input: String,
    pub response_a: String,
    pub response_b: String,
    #[serde(default)]
    pub value_ids: Vec<Value>,
    #[serde(default)]
    pub pred_value_ids_a: Option<Value>,
    #[serde(default)]
    pub pred_value_ids_b: Option<Value>,
}

/// 对比题：同一条输入下方法 A 与方法 B 的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonQuestion {
    /// 缺失时为空串，由拆分阶段报告 `MissingQid`
    #[serde(default)]
    pub qid: String,
    pub task: TaskKind,
    pub method_a: String,
    pub method_b: String,
    pub source: SourceRef,
    pub target_labels: Vec<TargetLabel>,
    pub prompt: String,
    pub options: Vec<AnswerOption>,
    /// prompt / options 是否为译文
    #[serde(default)]
    pub translated: bool,
    pub raw: RawPair,
    /// 手工编辑题库时附加的其他字段，原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 分配到某份问卷中的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedQuestion {
    #[serde(flatten)]
    pub question: ComparisonQuestion,
    /// `<qid>#<attempt>-<bucket>-<position>`
    pub instance_id: String,
}

impl AssignedQuestion {
    pub fn qid(&self) -> &str {
        &self.question.qid
    }
}
