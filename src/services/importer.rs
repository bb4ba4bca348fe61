//! 问卷导入 - 业务能力层
//!
//! 扫描问卷目录 → 组装 payload → 分批写入数据库

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::infrastructure::QuestionnaireSink;
use crate::models::{load_questionnaire, QuestionnaireRecord};
use crate::utils::logging::log_batch_committed;

/// 导入参数
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub reset: bool,
    /// 每多少份提交一次
    pub batch: usize,
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// meta 中已标记为 done 的问卷数
    pub already_done: usize,
    /// 导入后表中的总行数
    pub total_rows: u64,
}

/// 递归扫描 `<prefix>_*.jsonl`，按路径排序
pub async fn scan_questionnaires(banks_dir: &Path, prefix: &str) -> AppResult<Vec<PathBuf>> {
    if !tokio::fs::metadata(banks_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(FileError::DirectoryNotFound {
            path: banks_dir.display().to_string(),
        }
        .into());
    }

    let pattern = format!(r"^{}_.*\.jsonl$", regex::escape(prefix));
    let re = Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.clone(),
        source: e,
    })?;

    let mut found = Vec::new();
    let mut pending = vec![banks_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if re.is_match(&entry.file_name().to_string_lossy()) {
                found.push(path);
            }
        }
    }

    found.sort();
    debug!("扫描到 {} 份问卷: {}", found.len(), banks_dir.display());
    Ok(found)
}

/// 相对路径（POSIX 分隔符）与所属题库名
pub fn questionnaire_identity(banks_dir: &Path, path: &Path) -> (String, String) {
    let rel = path.strip_prefix(banks_dir).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let bank = parts.first().cloned().unwrap_or_default();
    (parts.join("/"), bank)
}

/// 读取一份问卷文件并组装成待导入记录
pub async fn read_record(banks_dir: &Path, path: &Path) -> AppResult<(QuestionnaireRecord, bool)> {
    let (rel_path, bank) = questionnaire_identity(banks_dir, path);
    let file = load_questionnaire(path).await?;
    let done = file.is_done();
    Ok((QuestionnaireRecord::from_file(&rel_path, &bank, file), done))
}

/// 导入问卷
pub async fn import_questionnaires(
    sink: &dyn QuestionnaireSink,
    banks_dir: &Path,
    files: &[PathBuf],
    opts: &ImportOptions,
) -> AppResult<ImportReport> {
    sink.prepare(opts.reset).await?;

    let batch_size = opts.batch.max(1);
    let total = files.len();
    let mut report = ImportReport::default();
    let mut pending: Vec<QuestionnaireRecord> = Vec::with_capacity(batch_size);

    for path in files {
        let (record, done) = read_record(banks_dir, path).await?;
        if done {
            report.already_done += 1;
        }
        pending.push(record);
        report.imported += 1;

        if pending.len() == batch_size {
            sink.upsert_batch(&pending).await?;
            pending.clear();
            log_batch_committed(report.imported, total);
        }
    }
    if !pending.is_empty() {
        sink.upsert_batch(&pending).await?;
        log_batch_committed(report.imported, total);
    }

    report.total_rows = sink.count().await?;
    info!(
        "✅ 已导入 {} 份问卷，表中共 {} 行",
        report.imported, report.total_rows
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemorySink;
    use crate::models::QuestionnaireStatus;
    use tempfile::tempdir;

    fn write(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_scan_is_recursive_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("b_bank/questionnaire_002.jsonl"), "");
        write(&root.join("a_bank/questionnaire_001.jsonl"), "");
        write(&root.join("a_bank/deep/questionnaire_010.jsonl"), "");
        write(&root.join("a_bank/notes.jsonl"), "");
        write(&root.join("a_bank/questionnaire_001.json"), "");

        let files = scan_questionnaires(root, "questionnaire").await.unwrap();
        let rels: Vec<String> = files
            .iter()
            .map(|p| questionnaire_identity(root, p).0)
            .collect();
        assert_eq!(
            rels,
            vec![
                "a_bank/deep/questionnaire_010.jsonl",
                "a_bank/questionnaire_001.jsonl",
                "b_bank/questionnaire_002.jsonl",
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_missing_dir() {
        let err = scan_questionnaires(Path::new("/no/such/banks"), "questionnaire")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_identity_uses_first_component_as_bank() {
        let (rel, bank) = questionnaire_identity(
            Path::new("/data/banks"),
            Path::new("/data/banks/value_bank/questionnaire_001.jsonl"),
        );
        assert_eq!(rel, "value_bank/questionnaire_001.jsonl");
        assert_eq!(bank, "value_bank");
    }

    #[tokio::test]
    async fn test_import_batches_and_reimport_keeps_status() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for i in 1..=5 {
            write(
                &root.join(format!("bank/questionnaire_{:03}.jsonl", i)),
                "{\"qid\": \"q1\"}\n{\"qid\": \"q2\"}\n",
            );
        }
        write(
            &root.join("bank/questionnaire_006.jsonl"),
            "{\"__meta__\": {\"status\": \"done\"}}\n{\"qid\": \"q1\"}\n",
        );

        let files = scan_questionnaires(root, "questionnaire").await.unwrap();
        let sink = MemorySink::new();
        let opts = ImportOptions {
            reset: false,
            batch: 4,
        };

        let report = import_questionnaires(&sink, root, &files, &opts).await.unwrap();
        assert_eq!(report.imported, 6);
        assert_eq!(report.already_done, 1);
        assert_eq!(report.total_rows, 6);
        assert_eq!(sink.commits(), 2);

        let first = &sink.records()[0];
        assert_eq!(first.qid, "bank/questionnaire_001.jsonl");
        assert_eq!(first.question_count, 2);
        assert_eq!(first.payload["source"]["rel_path"], "bank/questionnaire_001.jsonl");

        sink.set_status("bank/questionnaire_001.jsonl", QuestionnaireStatus::InProgress);
        import_questionnaires(&sink, root, &files, &opts).await.unwrap();
        assert_eq!(
            sink.status_of("bank/questionnaire_001.jsonl"),
            Some(QuestionnaireStatus::InProgress)
        );
    }
}
