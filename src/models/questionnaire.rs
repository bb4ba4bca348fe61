use serde_json::{Map, Value};

/// 问卷文件首行 meta 的键
pub const META_KEY: &str = "__meta__";

/// 一份问卷文件：可选的 meta 行 + 题目列表
///
/// 题目保持为 JSON 对象，导入/导出时原样透传（导出会追加 `choice` 字段）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionnaireFile {
    pub meta: Map<String, Value>,
    pub questions: Vec<Value>,
}

impl QuestionnaireFile {
    /// meta 中 status 为 done（不区分大小写）
    pub fn is_done(&self) -> bool {
        self.meta
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("done"))
            .unwrap_or(false)
    }
}
