//! 结果导出 - 业务能力层
//!
//! 把答卷合并回题目，每道题追加 `choice: [{sid, submitted_at, choice}]`
//!
//! - 按问卷导出：结构与拆分出的问卷文件一致，meta 追加导出信息
//! - 按题库导出：同一题库内按题目 qid 去重，汇总所有答卷

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::models::{StoredQuestionnaire, SubmissionRow};

/// 题库导出结果
#[derive(Debug, Default)]
pub struct BankExport {
    /// 题库名 → 按 (source.row_index, qid) 排序的题目
    pub banks: BTreeMap<String, Vec<Value>>,
    /// 追加的 choice 条数
    pub appended: usize,
    /// 找不到所属问卷的答卷数
    pub missed_submissions: usize,
}

impl BankExport {
    pub fn total_items(&self) -> usize {
        self.banks.values().map(Vec::len).sum()
    }
}

/// 合并一份问卷的答卷，返回 (meta, 题目)
pub fn merge_questionnaire(
    questionnaire: &StoredQuestionnaire,
    submissions: &[SubmissionRow],
    exported_at: &str,
) -> (Map<String, Value>, Vec<Value>) {
    let questions = questionnaire.questions();
    let mut choices: HashMap<String, Vec<Value>> = questions
        .iter()
        .filter_map(|q| q.get("qid").filter(|v| !v.is_null()).map(value_text))
        .map(|qid| (qid, Vec::new()))
        .collect();

    for sub in submissions {
        let at = sub.submitted_at_text();
        for (qid, list) in choices.iter_mut() {
            if let Some(chosen) = sub.answers.get(qid).filter(|v| !v.is_null()) {
                list.push(choice_entry(sub, &at, chosen));
            }
        }
    }

    let merged = questions
        .iter()
        .map(|q| {
            let qid = q.get("qid").map(value_text).unwrap_or_default();
            let list = choices.get(&qid).cloned().unwrap_or_default();
            with_choice(q, list)
        })
        .collect();

    let mut meta = questionnaire.meta();
    meta.insert("exported_at".to_string(), json!(exported_at));
    meta.insert("questionnaire_id".to_string(), json!(questionnaire.qid));
    meta.insert("bank".to_string(), json!(questionnaire.bank));
    meta.insert("rel_path".to_string(), json!(questionnaire.rel_path));
    meta.insert("status".to_string(), json!(questionnaire.status));
    meta.insert("submission_count".to_string(), json!(submissions.len()));

    (meta, merged)
}

/// 把所有答卷合并回各题库的去重题目
///
/// 同一题目在多份问卷中出现时，以最先遇到的那份内容为准。
pub fn merge_into_banks(
    questionnaires: &[StoredQuestionnaire],
    submissions: &[SubmissionRow],
    bank_filter: Option<&str>,
) -> BankExport {
    let mut items: BTreeMap<String, HashMap<String, Value>> = BTreeMap::new();
    let mut owner: HashMap<&str, &str> = HashMap::new();

    for q in questionnaires {
        if bank_filter.is_some_and(|b| b != q.bank) {
            continue;
        }
        owner.insert(q.qid.as_str(), q.bank.as_str());
        let bank_items = items.entry(q.bank.clone()).or_default();
        for item in q.questions() {
            let Some(qid) = item.get("qid").filter(|v| !v.is_null()).map(value_text) else {
                continue;
            };
            bank_items
                .entry(qid)
                .or_insert_with(|| with_choice(item, Vec::new()));
        }
    }

    let mut export = BankExport::default();
    for sub in submissions {
        let Some(bank) = owner.get(sub.questionnaire_id.as_str()) else {
            export.missed_submissions += 1;
            continue;
        };
        let Some(bank_items) = items.get_mut(*bank) else {
            continue;
        };
        let at = sub.submitted_at_text();
        for (qid, chosen) in &sub.answers {
            let Some(Value::Array(list)) = bank_items
                .get_mut(qid)
                .and_then(|item| item.get_mut("choice"))
            else {
                continue;
            };
            list.push(choice_entry(sub, &at, chosen));
            export.appended += 1;
        }
    }

    for (bank, map) in items {
        let mut list: Vec<Value> = map.into_values().collect();
        list.sort_by(|a, b| {
            row_index(a)
                .cmp(&row_index(b))
                .then_with(|| qid_text(a).cmp(&qid_text(b)))
        });
        export.banks.insert(bank, list);
    }
    export
}

fn choice_entry(sub: &SubmissionRow, submitted_at: &str, chosen: &Value) -> Value {
    json!({
        "sid": sub.sid,
        "submitted_at": submitted_at,
        "choice": value_text(chosen),
    })
}

fn with_choice(item: &Value, choices: Vec<Value>) -> Value {
    let mut out = item.clone();
    if let Value::Object(map) = &mut out {
        map.insert("choice".to_string(), Value::Array(choices));
    }
    out
}

/// `source.row_index`，缺失或无效时排到最后
fn row_index(item: &Value) -> u64 {
    item.get("source")
        .and_then(|s| s.get("row_index"))
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(u64::MAX)
}

fn qid_text(item: &Value) -> String {
    item.get("qid").map(value_text).unwrap_or_default()
}

/// 字符串取原值，其他取 JSON 文本
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn questionnaire(qid: &str, bank: &str, questions: Vec<Value>) -> StoredQuestionnaire {
        StoredQuestionnaire {
            qid: qid.to_string(),
            bank: bank.to_string(),
            rel_path: qid.to_string(),
            payload: json!({"meta": {"origin": "split"}, "questions": questions}),
            question_count: 0,
            status: "done".to_string(),
            claimed_by: None,
        }
    }

    fn submission(questionnaire_id: &str, sid: &str, answers: Value) -> SubmissionRow {
        SubmissionRow {
            questionnaire_id: questionnaire_id.to_string(),
            sid: sid.to_string(),
            submitted_at: NaiveDateTime::parse_from_str("2025-03-01 10:00:00", "%Y-%m-%d %H:%M:%S").ok(),
            answers: match answers {
                Value::Object(m) => m,
                _ => Map::new(),
            },
        }
    }

    #[test]
    fn test_merge_questionnaire_appends_choices() {
        let q = questionnaire(
            "bank/questionnaire_001.jsonl",
            "bank",
            vec![json!({"qid": "value-1"}), json!({"qid": "value-2"})],
        );
        let subs = vec![
            submission(&q.qid, "s1", json!({"value-1": "A", "value-2": "C"})),
            submission(&q.qid, "s2", json!({"value-1": "B"})),
        ];

        let (meta, merged) = merge_questionnaire(&q, &subs, "2025-03-02 00:00:00");

        assert_eq!(meta["origin"], json!("split"));
        assert_eq!(meta["submission_count"], json!(2));
        assert_eq!(meta["questionnaire_id"], json!("bank/questionnaire_001.jsonl"));
        assert_eq!(merged[0]["choice"].as_array().unwrap().len(), 2);
        assert_eq!(merged[0]["choice"][1]["sid"], json!("s2"));
        assert_eq!(merged[1]["choice"][0]["choice"], json!("C"));
        assert_eq!(merged[1]["choice"][0]["submitted_at"], json!("2025-03-01 10:00:00"));
    }

    #[test]
    fn test_merge_questionnaire_without_submissions_has_empty_lists() {
        let q = questionnaire("b/q.jsonl", "b", vec![json!({"qid": "x"})]);
        let (_, merged) = merge_questionnaire(&q, &[], "now");
        assert_eq!(merged[0]["choice"], json!([]));
    }

    #[test]
    fn test_merge_into_banks_dedups_and_sorts() {
        let q1 = questionnaire(
            "bank/questionnaire_001.jsonl",
            "bank",
            vec![
                json!({"qid": "b", "source": {"row_index": 5}}),
                json!({"qid": "a", "source": {"row_index": 9}}),
            ],
        );
        let q2 = questionnaire(
            "bank/questionnaire_002.jsonl",
            "bank",
            vec![json!({"qid": "b", "source": {"row_index": 5}}), json!({"qid": "c"})],
        );
        let subs = vec![
            submission("bank/questionnaire_001.jsonl", "s1", json!({"a": "A", "b": "B"})),
            submission("bank/questionnaire_002.jsonl", "s2", json!({"b": "C", "c": "A"})),
            submission("other/questionnaire_001.jsonl", "s3", json!({"a": "A"})),
        ];

        let export = merge_into_banks(&[q1, q2], &subs, None);

        let items = &export.banks["bank"];
        let order: Vec<&str> = items.iter().map(|i| i["qid"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(items[0]["choice"].as_array().unwrap().len(), 2);
        assert_eq!(export.appended, 4);
        assert_eq!(export.missed_submissions, 1);
        assert_eq!(export.total_items(), 3);
    }

    #[test]
    fn test_merge_into_banks_bank_filter() {
        let q1 = questionnaire("x/q.jsonl", "x", vec![json!({"qid": "1"})]);
        let q2 = questionnaire("y/q.jsonl", "y", vec![json!({"qid": "2"})]);
        let export = merge_into_banks(&[q1, q2], &[], Some("y"));
        assert_eq!(export.banks.keys().collect::<Vec<_>>(), vec!["y"]);
    }
}
