//! 需要可用的 TiDB / MySQL，默认忽略：
//! `TIDB_HOST=... TIDB_PASSWORD=... cargo test --test store_integration -- --ignored`

use serde_json::{json, Map, Value};
use survey_bank::infrastructure::{QuestionnaireSink, StoreSettings, TidbStore};
use survey_bank::models::QuestionnaireRecord;
use survey_bank::utils::logging;
use survey_bank::Config;

async fn connect() -> TidbStore {
    logging::init();
    let config = Config::from_env().expect("读取配置失败");
    let mut settings = StoreSettings::from_config(&config);
    settings.lock_ttl_seconds = 600;
    let store = TidbStore::connect(&settings)
        .await
        .expect("连接数据库失败");
    store.prepare(true).await.expect("建表失败");
    store
}

fn record(rel_path: &str) -> QuestionnaireRecord {
    QuestionnaireRecord {
        qid: rel_path.to_string(),
        bank: "it_bank".to_string(),
        rel_path: rel_path.to_string(),
        payload: json!({"meta": {}, "questions": [{"qid": "value-1"}], "source": {"bank": "it_bank", "rel_path": rel_path}}),
        question_count: 1,
    }
}

#[tokio::test]
#[ignore]
async fn test_claim_submit_and_reimport_keeps_status() {
    let store = connect().await;
    store
        .upsert_batch(&[record("it_bank/questionnaire_001.jsonl")])
        .await
        .unwrap();

    assert_eq!(store.lock_ttl_seconds(), 600);
    let claimed = store.claim_one("sid-1", 5).await.unwrap().expect("应领取到问卷");
    assert_eq!(claimed.status, "in_progress");
    assert!(store.refresh_lock(&claimed.qid, "sid-1").await.unwrap());
    assert!(!store.refresh_lock(&claimed.qid, "sid-2").await.unwrap());

    let mut answers = Map::new();
    answers.insert("value-1".to_string(), Value::from("A"));
    assert!(store.submit(&claimed.qid, "sid-1", &answers).await.unwrap());
    // 已完成的问卷再次提交视为成功
    assert!(store.submit(&claimed.qid, "sid-1", &answers).await.unwrap());

    store
        .upsert_batch(&[record("it_bank/questionnaire_001.jsonl")])
        .await
        .unwrap();
    let rows = store.fetch_questionnaires(true).await.unwrap();
    assert_eq!(rows.len(), 1);

    let subs = store.fetch_submissions_for(&claimed.qid).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].answers["value-1"], json!("A"));
}

#[tokio::test]
#[ignore]
async fn test_abandon_returns_to_pool() {
    let store = connect().await;
    store
        .upsert_batch(&[record("it_bank/questionnaire_002.jsonl")])
        .await
        .unwrap();

    let claimed = store.claim_one("sid-9", 5).await.unwrap().expect("应领取到问卷");
    assert!(store.claim_one("sid-8", 5).await.unwrap().is_none());
    assert!(store.abandon(&claimed.qid, "sid-9").await.unwrap());
    assert!(store.claim_one("sid-8", 5).await.unwrap().is_some());
    assert_eq!(store.reclaim_expired().await.unwrap(), 0);
}
