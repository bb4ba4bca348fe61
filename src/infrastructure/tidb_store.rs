//! TiDB 存储 - 基础设施层
//!
//! ## 职责
//!
//! - 建表、清空、批量 upsert 问卷（导入用）
//! - 问卷领取 / 续租 / 放弃 / 提交 / 回收过期锁（填写端用）
//! - 读取问卷与答卷（导出用）
//!
//! 所有 SQL 都走 MySQL 协议，TiDB Cloud 需要 TLS（通过 CA 证书环境变量开启）

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::types::Json;
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, StoreConnectionError};
use crate::infrastructure::questionnaire_sink::QuestionnaireSink;
use crate::models::{QuestionnaireRecord, QuestionnaireStatus, StoredQuestionnaire, SubmissionRow};

const DDL_QUESTIONNAIRES: &str = r#"
CREATE TABLE IF NOT EXISTS questionnaires (
  qid             VARCHAR(512) PRIMARY KEY,
  bank            VARCHAR(128) NOT NULL,
  rel_path        VARCHAR(512) NOT NULL,
  payload         JSON NOT NULL,
  question_count  INT NOT NULL,
  status          VARCHAR(16) NOT NULL DEFAULT 'available',
  claimed_by      VARCHAR(32) NULL,
  claimed_at      DATETIME NULL,
  lock_expires_at DATETIME NULL,
  created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
  KEY idx_status (status),
  KEY idx_bank   (bank)
)"#;

const DDL_SUBMISSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
  id           BIGINT PRIMARY KEY AUTO_INCREMENT,
  qid          VARCHAR(512) NOT NULL,
  sid          VARCHAR(32) NOT NULL,
  answers      JSON NOT NULL,
  submitted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  KEY idx_qid (qid),
  KEY idx_sid (sid)
)"#;

// 重复导入只更新内容，不覆盖 status / claimed_* 字段
const UPSERT_QUESTIONNAIRE: &str = r#"
INSERT INTO questionnaires (qid, bank, rel_path, payload, question_count)
VALUES (?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
  bank = VALUES(bank),
  rel_path = VALUES(rel_path),
  payload = VALUES(payload),
  question_count = VALUES(question_count),
  updated_at = CURRENT_TIMESTAMP"#;

const QUESTIONNAIRE_COLUMNS: &str =
    "qid, bank, rel_path, payload, question_count, status, claimed_by";

/// 连接参数
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    /// 存放密码的环境变量名
    pub password_env: String,
    /// 存放 CA 证书路径的环境变量名
    pub ca_env: String,
    /// 领取 / 续租时锁的有效期（秒）
    pub lock_ttl_seconds: u64,
}

impl StoreSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.store_host.clone(),
            port: config.store_port,
            user: config.store_user.clone(),
            database: config.store_database.clone(),
            password_env: config.store_password_env.clone(),
            ca_env: config.store_ca_env.clone(),
            lock_ttl_seconds: config.lock_ttl_seconds.max(1),
        }
    }

    /// 从环境变量读取密码
    pub fn password(&self) -> AppResult<String> {
        match std::env::var(&self.password_env) {
            Ok(p) if !p.is_empty() => Ok(p),
            _ => Err(StoreConnectionError::MissingPassword {
                env: self.password_env.clone(),
            }
            .into()),
        }
    }

    /// CA 证书路径；未设置或为空时返回 None
    pub fn ca_path(&self) -> Option<String> {
        std::env::var(&self.ca_env).ok().filter(|p| !p.trim().is_empty())
    }
}

/// TiDB 存储
#[derive(Clone)]
pub struct TidbStore {
    pool: MySqlPool,
    lock_ttl_seconds: u64,
}

impl TidbStore {
    /// 建立连接池
    pub async fn connect(settings: &StoreSettings) -> AppResult<Self> {
        let password = settings.password()?;

        let mut options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&password)
            .database(&settings.database)
            .charset("utf8mb4");
        if let Some(ca) = settings.ca_path() {
            debug!("使用 CA 证书: {}", ca);
            options = options.ssl_mode(MySqlSslMode::VerifyCa).ssl_ca(ca);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| StoreConnectionError::ConnectFailed {
                host: settings.host.clone(),
                port: settings.port,
                source: e,
            })?;

        info!(
            "🔌 已连接数据库 {}:{}/{}",
            settings.host, settings.port, settings.database
        );
        Ok(Self {
            pool,
            lock_ttl_seconds: settings.lock_ttl_seconds.max(1),
        })
    }

    /// 锁的有效期（秒）
    pub fn lock_ttl_seconds(&self) -> u64 {
        self.lock_ttl_seconds
    }

    /// 建表（已存在则跳过）
    pub async fn ensure_schema(&self) -> AppResult<()> {
        for ddl in [DDL_QUESTIONNAIRES, DDL_SUBMISSIONS] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::query_failed("create table", e))?;
        }
        Ok(())
    }

    /// 清空答卷与问卷
    pub async fn reset(&self) -> AppResult<()> {
        for sql in ["TRUNCATE TABLE submissions", "TRUNCATE TABLE questionnaires"] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::query_failed("truncate", e))?;
        }
        Ok(())
    }

    /// 在一个事务里 upsert 一批问卷
    pub async fn upsert_batch(&self, rows: &[QuestionnaireRecord]) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::query_failed("begin", e))?;
        for row in rows {
            sqlx::query(UPSERT_QUESTIONNAIRE)
                .bind(&row.qid)
                .bind(&row.bank)
                .bind(&row.rel_path)
                .bind(Json(&row.payload))
                .bind(row.question_count as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::query_failed(format!("upsert {}", row.qid), e))?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::query_failed("commit", e))?;
        Ok(())
    }

    /// questionnaires 表总行数
    pub async fn count_questionnaires(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questionnaires")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::query_failed("count", e))?;
        Ok(count.max(0) as u64)
    }

    /// 回收已过期的 in_progress 问卷，返回回收条数
    pub async fn reclaim_expired(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE questionnaires
             SET status = ?, claimed_by = NULL, claimed_at = NULL, lock_expires_at = NULL
             WHERE status = ? AND lock_expires_at IS NOT NULL AND lock_expires_at < NOW()",
        )
        .bind(QuestionnaireStatus::Available.as_str())
        .bind(QuestionnaireStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::query_failed("reclaim expired", e))?;
        Ok(result.rows_affected())
    }

    /// 随机领取一份可用问卷
    ///
    /// 先回收过期锁，再在事务中 `SELECT ... FOR UPDATE` 锁定一行并置为 in_progress。
    /// 锁的有效期取连接参数中的 `lock_ttl_seconds`。并发冲突时重试，没有可用问卷返回 None。
    pub async fn claim_one(
        &self,
        sid: &str,
        max_retries: usize,
    ) -> AppResult<Option<StoredQuestionnaire>> {
        self.reclaim_expired().await?;

        let select_sql = format!(
            "SELECT {} FROM questionnaires WHERE status = ? ORDER BY RAND() LIMIT 1 FOR UPDATE",
            QUESTIONNAIRE_COLUMNS
        );

        for attempt in 1..=max_retries {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| AppError::query_failed("begin", e))?;

            let row = sqlx::query(&select_sql)
                .bind(QuestionnaireStatus::Available.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::query_failed("select available", e))?;
            let Some(row) = row else {
                tx.rollback()
                    .await
                    .map_err(|e| AppError::query_failed("rollback", e))?;
                return Ok(None);
            };
            let mut claimed = questionnaire_from_row(&row)?;

            let updated = sqlx::query(
                "UPDATE questionnaires
                 SET status = ?, claimed_by = ?, claimed_at = NOW(),
                     lock_expires_at = DATE_ADD(NOW(), INTERVAL ? SECOND)
                 WHERE qid = ? AND status = ?",
            )
            .bind(QuestionnaireStatus::InProgress.as_str())
            .bind(sid)
            .bind(self.lock_ttl_seconds)
            .bind(&claimed.qid)
            .bind(QuestionnaireStatus::Available.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::query_failed("claim", e))?;

            if updated.rows_affected() != 1 {
                warn!("⚠️ 领取冲突 ({}/{}): {}", attempt, max_retries, claimed.qid);
                tx.rollback()
                    .await
                    .map_err(|e| AppError::query_failed("rollback", e))?;
                continue;
            }

            tx.commit()
                .await
                .map_err(|e| AppError::query_failed("commit", e))?;
            claimed.status = QuestionnaireStatus::InProgress.as_str().to_string();
            claimed.claimed_by = Some(sid.to_string());
            return Ok(Some(claimed));
        }

        Ok(None)
    }

    /// 续租；问卷仍属于 sid 时才成功
    pub async fn refresh_lock(&self, qid: &str, sid: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE questionnaires
             SET lock_expires_at = DATE_ADD(NOW(), INTERVAL ? SECOND)
             WHERE qid = ? AND status = ? AND claimed_by = ?",
        )
        .bind(self.lock_ttl_seconds)
        .bind(qid)
        .bind(QuestionnaireStatus::InProgress.as_str())
        .bind(sid)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::query_failed("refresh lock", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// 放弃问卷，改回 available
    pub async fn abandon(&self, qid: &str, sid: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE questionnaires
             SET status = ?, claimed_by = NULL, claimed_at = NULL, lock_expires_at = NULL
             WHERE qid = ? AND status = ? AND claimed_by = ?",
        )
        .bind(QuestionnaireStatus::Available.as_str())
        .bind(qid)
        .bind(QuestionnaireStatus::InProgress.as_str())
        .bind(sid)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::query_failed("abandon", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// 提交答案：写 submissions 并标记 done
    ///
    /// 已是 done 的问卷直接返回成功；不属于 sid 或不在进行中则返回 false。
    pub async fn submit(&self, qid: &str, sid: &str, answers: &Map<String, Value>) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::query_failed("begin", e))?;

        let row = sqlx::query("SELECT status, claimed_by FROM questionnaires WHERE qid = ? FOR UPDATE")
            .bind(qid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::query_failed("select for submit", e))?;
        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| AppError::query_failed("rollback", e))?;
            return Ok(false);
        };

        let status: String = row
            .try_get("status")
            .map_err(|e| AppError::query_failed("decode status", e))?;
        let claimed_by: Option<String> = row
            .try_get("claimed_by")
            .map_err(|e| AppError::query_failed("decode claimed_by", e))?;

        if status == QuestionnaireStatus::Done.as_str() {
            tx.commit()
                .await
                .map_err(|e| AppError::query_failed("commit", e))?;
            return Ok(true);
        }
        if status != QuestionnaireStatus::InProgress.as_str() || claimed_by.as_deref() != Some(sid) {
            tx.rollback()
                .await
                .map_err(|e| AppError::query_failed("rollback", e))?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO submissions (qid, sid, answers) VALUES (?, ?, ?)")
            .bind(qid)
            .bind(sid)
            .bind(Json(answers))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::query_failed("insert submission", e))?;

        let updated = sqlx::query(
            "UPDATE questionnaires SET status = ?, lock_expires_at = NULL
             WHERE qid = ? AND status = ? AND claimed_by = ?",
        )
        .bind(QuestionnaireStatus::Done.as_str())
        .bind(qid)
        .bind(QuestionnaireStatus::InProgress.as_str())
        .bind(sid)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::query_failed("mark done", e))?;

        if updated.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| AppError::query_failed("rollback", e))?;
            return Ok(false);
        }
        tx.commit()
            .await
            .map_err(|e| AppError::query_failed("commit", e))?;
        Ok(true)
    }

    /// 按 (bank, rel_path) 顺序读取问卷
    pub async fn fetch_questionnaires(&self, only_done: bool) -> AppResult<Vec<StoredQuestionnaire>> {
        let sql = if only_done {
            format!(
                "SELECT {} FROM questionnaires WHERE status = 'done' ORDER BY bank, rel_path",
                QUESTIONNAIRE_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM questionnaires ORDER BY bank, rel_path",
                QUESTIONNAIRE_COLUMNS
            )
        };
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::query_failed("select questionnaires", e))?;
        rows.iter().map(questionnaire_from_row).collect()
    }

    /// 某份问卷的全部答卷，按提交时间升序
    pub async fn fetch_submissions_for(&self, questionnaire_id: &str) -> AppResult<Vec<SubmissionRow>> {
        let rows = sqlx::query(
            "SELECT qid, sid, submitted_at, answers FROM submissions
             WHERE qid = ? ORDER BY submitted_at ASC, id ASC",
        )
        .bind(questionnaire_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::query_failed("select submissions", e))?;
        rows.iter().map(submission_from_row).collect()
    }

    /// 全部答卷，按提交时间升序（逐行读取，不一次性缓存原始行）
    pub async fn fetch_all_submissions(&self) -> AppResult<Vec<SubmissionRow>> {
        let mut stream = sqlx::query(
            "SELECT qid, sid, submitted_at, answers FROM submissions
             ORDER BY submitted_at ASC, id ASC",
        )
        .fetch(&self.pool);

        let mut submissions = Vec::new();
        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| AppError::query_failed("select submissions", e))?
        {
            submissions.push(submission_from_row(&row)?);
        }
        Ok(submissions)
    }
}

#[async_trait]
impl QuestionnaireSink for TidbStore {
    async fn prepare(&self, reset: bool) -> AppResult<()> {
        self.ensure_schema().await?;
        if reset {
            warn!("🧹 清空 submissions + questionnaires ...");
            self.reset().await?;
        }
        Ok(())
    }

    async fn upsert_batch(&self, rows: &[QuestionnaireRecord]) -> AppResult<()> {
        TidbStore::upsert_batch(self, rows).await
    }

    async fn count(&self) -> AppResult<u64> {
        self.count_questionnaires().await
    }
}

fn questionnaire_from_row(row: &MySqlRow) -> AppResult<StoredQuestionnaire> {
    let decode = |column: &str, e: sqlx::Error| AppError::query_failed(format!("decode {}", column), e);

    let qid: String = row.try_get("qid").map_err(|e| decode("qid", e))?;
    let Json(payload): Json<Value> = row.try_get("payload").map_err(|e| decode("payload", e))?;
    let question_count: i32 = row
        .try_get("question_count")
        .map_err(|e| decode("question_count", e))?;

    Ok(StoredQuestionnaire {
        bank: row.try_get("bank").map_err(|e| decode("bank", e))?,
        rel_path: row.try_get("rel_path").map_err(|e| decode("rel_path", e))?,
        payload,
        question_count: i64::from(question_count),
        status: row.try_get("status").map_err(|e| decode("status", e))?,
        claimed_by: row.try_get("claimed_by").map_err(|e| decode("claimed_by", e))?,
        qid,
    })
}

fn submission_from_row(row: &MySqlRow) -> AppResult<SubmissionRow> {
    let decode = |column: &str, e: sqlx::Error| AppError::query_failed(format!("decode {}", column), e);

    let questionnaire_id: String = row.try_get("qid").map_err(|e| decode("qid", e))?;
    let Json(answers): Json<Value> = row.try_get("answers").map_err(|e| decode("answers", e))?;
    let answers = match answers {
        Value::Object(map) => map,
        other => {
            warn!("⚠️ 问卷 {} 的答卷不是对象，已忽略: {}", questionnaire_id, other);
            Map::new()
        }
    };

    Ok(SubmissionRow {
        sid: row.try_get("sid").map_err(|e| decode("sid", e))?,
        submitted_at: row
            .try_get("submitted_at")
            .map_err(|e| decode("submitted_at", e))?,
        answers,
        questionnaire_id,
    })
}
