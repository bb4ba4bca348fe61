use serde_json::{Map, Value};

use crate::models::task::FieldMapping;

/// 单个方法对某条输入的推理结果
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// 对齐键（字段值的字符串形式，缺失时为空串）
    pub item_id: String,
    pub input: String,
    pub response: String,
    pub label_ids: Vec<Value>,
    pub pred_label_ids: Option<Value>,
}

impl PredictionRecord {
    /// 按字段映射从一条 JSON 对象中提取
    pub fn from_json(obj: &Map<String, Value>, fields: &FieldMapping) -> Self {
        let label_ids = match obj.get(&fields.label_ids) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let pred_label_ids = match obj.get(&fields.pred_label_ids) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        };

        Self {
            item_id: text_field(obj, &fields.key),
            input: text_field(obj, &fields.input),
            response: text_field(obj, &fields.response),
            label_ids,
            pred_label_ids,
        }
    }
}

/// 取字段的文本：字符串原样返回，其余标量取 JSON 文本，缺失或 null 为空串
fn text_field(obj: &Map<String, Value>, field: &str) -> String {
    match obj.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskKind;
    use serde_json::json;

    fn as_map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_from_json_defaults() {
        let fields = TaskKind::Value.field_mapping();
        let rec = PredictionRecord::from_json(&as_map(json!({"input": "hi"})), &fields);
        assert_eq!(rec.item_id, "hi");
        assert_eq!(rec.response, "");
        assert!(rec.label_ids.is_empty());
        assert!(rec.pred_label_ids.is_none());
    }

    #[test]
    fn test_numeric_key_is_stringified() {
        let mut fields = TaskKind::Mic.field_mapping();
        fields.key = "id".to_string();
        let rec = PredictionRecord::from_json(
            &as_map(json!({"id": 7, "input": "q", "response": "r", "value_ids": [1, 0]})),
            &fields,
        );
        assert_eq!(rec.item_id, "7");
        assert_eq!(rec.label_ids.len(), 2);
    }
}
