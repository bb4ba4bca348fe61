//! 题目构建流程 - 流程层
//!
//! 核心职责：定义"一道对比题"的完整生成流程
//!
//! 流程顺序：
//! 1. 多热向量 → 目标标签
//! 2. 按任务生成题干与 A/B/C 选项
//! 3. 可选翻译（题干 + A/B，C 固定不译）
//! 4. 计算 qid 并组装

use serde_json::Map;
use tracing::debug;

use crate::error::AppResult;
use crate::models::task::TIE_OPTION_KEY;
use crate::models::{AnswerOption, ComparisonQuestion, RawPair, SourceRef};
use crate::services::aligner::AlignedPair;
use crate::services::Translator;
use crate::utils::logging::truncate_text;
use crate::utils::short_hash;
use crate::workflow::question_ctx::QuestionCtx;

/// 题目构建流程
///
/// - 只处理单个对齐对
/// - 不持有缓存，翻译能力由调用方传入
pub struct QuestionFlow;

impl QuestionFlow {
    pub async fn run(
        translator: &mut Translator,
        ctx: &QuestionCtx,
        pair: &AlignedPair,
    ) -> AppResult<ComparisonQuestion> {
        let task = ctx.task;
        // 目标标签以 A 文件为准
        let targets = task.pick_target_labels(&pair.a.label_ids);
        let prompt = task.render_prompt(&targets, &pair.a.input);
        let options = task.render_options(&pair.a.response, &pair.b.response);

        debug!("{} 题干: {}", ctx, truncate_text(&prompt, 60));

        let translated = translator.is_enabled();
        let prompt = translator.translate_zh(&prompt).await?;
        let mut translated_options = Vec::with_capacity(options.len());
        for opt in options {
            let text = if opt.key == TIE_OPTION_KEY {
                opt.text
            } else {
                translator.translate_zh(&opt.text).await?
            };
            translated_options.push(AnswerOption::new(opt.key, text));
        }

        Ok(ComparisonQuestion {
            qid: question_id(ctx, &pair.a.input),
            task,
            method_a: ctx.method_a.clone(),
            method_b: ctx.method_b.clone(),
            source: SourceRef {
                path_a: ctx.path_a.clone(),
                path_b: ctx.path_b.clone(),
                row_index: ctx.row_index,
            },
            target_labels: targets,
            prompt,
            options: translated_options,
            translated,
            raw: RawPair {
                input: pair.a.input.clone(),
                response_a: pair.a.response.clone(),
                response_b: pair.b.response.clone(),
                value_ids: pair.a.label_ids.clone(),
                pred_value_ids_a: pair.a.pred_label_ids.clone(),
                pred_value_ids_b: pair.b.pred_label_ids.clone(),
            },
            extra: Map::new(),
        })
    }
}

/// `<task>-<sha256(methodA|methodB|row|input) 前 16 位>`
pub fn question_id(ctx: &QuestionCtx, input_text: &str) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        ctx.method_a, ctx.method_b, ctx.row_index, input_text
    );
    format!("{}-{}", ctx.task, short_hash(&material, 16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::TranslationCache;
    use crate::models::{PredictionRecord, TaskKind};
    use crate::services::translator::tests::{fast_policy, FakeBackend};
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(task: TaskKind) -> QuestionCtx {
        QuestionCtx {
            task,
            method_a: "base".to_string(),
            method_b: "ours".to_string(),
            path_a: "a.jsonl".to_string(),
            path_b: "b.jsonl".to_string(),
            row_index: 4,
            position: 1,
        }
    }

    fn pair() -> AlignedPair {
        let a = PredictionRecord {
            item_id: "q".to_string(),
            input: "Should I tell the truth?".to_string(),
            response: "yes".to_string(),
            label_ids: vec![json!(1), json!(0)],
            pred_label_ids: Some(json!([1, 1])),
        };
        let b = PredictionRecord {
            response: "no".to_string(),
            pred_label_ids: None,
            ..a.clone()
        };
        AlignedPair { row_index: 4, a, b }
    }

    #[tokio::test]
    async fn test_flow_without_translation() {
        let mut translator = Translator::disabled();
        let q = QuestionFlow::run(&mut translator, &ctx(TaskKind::Mic), &pair())
            .await
            .unwrap();

        assert!(q.qid.starts_with("mic-"));
        assert_eq!(q.qid.len(), "mic-".len() + 16);
        assert_eq!(q.target_labels[0].name, "Care");
        assert_eq!(q.options[0].text, "yes");
        assert_eq!(q.options[1].text, "no");
        assert!(!q.translated);
        assert_eq!(q.raw.pred_value_ids_a, Some(json!([1, 1])));
        assert_eq!(q.source.row_index, 4);
    }

    #[tokio::test]
    async fn test_flow_translates_prompt_and_ab_only() {
        let backend = Arc::new(FakeBackend::new(0));
        let mut translator = Translator::new(backend, TranslationCache::in_memory(), fast_policy(1));
        let q = QuestionFlow::run(&mut translator, &ctx(TaskKind::Value), &pair())
            .await
            .unwrap();

        assert!(q.translated);
        assert!(q.prompt.starts_with("[zh]"));
        assert_eq!(q.options[0].text, "[zh]I would say, \"I yes");
        assert_eq!(q.options[2].text, "差不多");
        assert_eq!(q.raw.response_a, "yes");
    }

    #[test]
    fn test_question_id_depends_on_methods_and_row() {
        let base = ctx(TaskKind::Value);
        let other_row = base.at(5, 2);
        assert_ne!(question_id(&base, "x"), question_id(&other_row, "x"));
        assert_eq!(question_id(&base, "x"), question_id(&base.clone(), "x"));
    }
}
