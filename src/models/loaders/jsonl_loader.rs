use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{AppError, AppResult, FileError};
use crate::models::question::ComparisonQuestion;
use crate::models::questionnaire::{QuestionnaireFile, META_KEY};

/// 读取 JSON 数组或 JSONL 文件，只保留对象记录
///
/// 以 `[` 开头按 JSON 数组解析，否则逐行解析（空行跳过）。
pub async fn load_records(path: &Path) -> AppResult<Vec<Map<String, Value>>> {
    let text = read_text(path).await?;
    parse_records(&text, &path.display().to_string())
}

/// 解析已读入内存的 JSON / JSONL 文本
pub fn parse_records(text: &str, origin: &str) -> AppResult<Vec<Map<String, Value>>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> = if text.starts_with('[') {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                return Err(FileError::NotAList {
                    path: origin.to_string(),
                }
                .into())
            }
            Err(e) => return Err(AppError::parse_failed(origin, e.line(), e)),
        }
    } else {
        let mut rows = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str::<Value>(line)
                .map_err(|e| AppError::parse_failed(origin, idx + 1, e))?;
            rows.push(value);
        }
        rows
    };

    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

/// 读取题库文件（JSON 或 JSONL）
pub async fn load_bank(path: &Path) -> AppResult<Vec<ComparisonQuestion>> {
    let origin = path.display().to_string();
    let records = load_records(path).await?;
    records
        .into_iter()
        .enumerate()
        .map(|(idx, map)| {
            serde_json::from_value(Value::Object(map))
                .map_err(|e| AppError::parse_failed(origin.as_str(), idx + 1, e))
        })
        .collect()
}

/// 读取问卷文件：首行若为 `{"__meta__": {...}}` 则作为 meta
pub async fn load_questionnaire(path: &Path) -> AppResult<QuestionnaireFile> {
    let text = read_text(path).await?;
    parse_questionnaire(&text, &path.display().to_string())
}

/// 解析问卷文本
pub fn parse_questionnaire(text: &str, origin: &str) -> AppResult<QuestionnaireFile> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(first) = lines.first() else {
        return Ok(QuestionnaireFile::default());
    };

    let mut meta = Map::new();
    let mut start = 0;
    if let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(first.trim()) {
        if let Some(m) = obj.remove(META_KEY) {
            if let Value::Object(m) = m {
                meta = m;
            }
            start = 1;
        }
    }

    let mut questions = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(start) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = serde_json::from_str::<Value>(line)
            .map_err(|e| AppError::parse_failed(origin, idx + 1, e))?;
        questions.push(value);
    }

    Ok(QuestionnaireFile { meta, questions })
}

/// 以 JSONL 写出（每行一条）
pub async fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> AppResult<()> {
    let mut body = String::new();
    for item in items {
        let line = serde_json::to_string(item)
            .map_err(|e| AppError::serialize_failed(path.display().to_string(), e))?;
        body.push_str(&line);
        body.push('\n');
    }
    atomic_write(path, body.as_bytes()).await
}

/// 以带缩进的 JSON 数组写出
pub async fn write_json_pretty<T: Serialize>(path: &Path, items: &[T]) -> AppResult<()> {
    let body = serde_json::to_string_pretty(items)
        .map_err(|e| AppError::serialize_failed(path.display().to_string(), e))?;
    atomic_write(path, body.as_bytes()).await
}

/// 写出问卷文件：meta 行 + 每题一行
pub async fn write_questionnaire(
    path: &Path,
    meta: &Map<String, Value>,
    questions: &[Value],
) -> AppResult<()> {
    let mut header = Map::new();
    header.insert(META_KEY.to_string(), Value::Object(meta.clone()));

    let mut lines: Vec<Value> = Vec::with_capacity(questions.len() + 1);
    lines.push(Value::Object(header));
    lines.extend(questions.iter().cloned());
    write_jsonl(path, &lines).await
}

/// 先写临时文件再 rename，避免中途崩溃留下半个文件
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
    }

    let tmp = tmp_path_for(path);
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| AppError::file_write_failed(tmp.display().to_string(), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::file_write_failed(display, e))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp_{}", chrono::Local::now().timestamp_millis()));
    path.with_file_name(name)
}

async fn read_text(path: &Path) -> AppResult<String> {
    let display = path.display().to_string();
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FileError::NotFound { path: display }.into())
        }
        Err(e) => Err(AppError::file_read_failed(display, e)),
    }
}
