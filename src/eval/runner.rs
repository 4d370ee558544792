use super::judge::Judge;
use super::progress::{EvalProgressCallback, NoopProgressCallback};
use super::report::{EvalRecord, EvalReport, EvalStage, Verdict};
use super::EvalItem;
use crate::ask::QaPipeline;
use crate::pipeline::input::load_reference;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Items evaluated at once. Results keep input order regardless.
    pub concurrency: usize,
    /// Reference used by items that name none.
    pub default_reference: Option<PathBuf>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            default_reference: None,
        }
    }
}

pub struct EvalRunner {
    pipeline: Arc<QaPipeline>,
    judge: Judge,
    options: EvalOptions,
    progress: Arc<dyn EvalProgressCallback>,
}

impl EvalRunner {
    pub fn new(pipeline: Arc<QaPipeline>, judge: Judge, options: EvalOptions) -> Self {
        Self {
            pipeline,
            judge,
            options,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn EvalProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Evaluate every item and assemble the report.
    pub async fn run(&self, items: &[EvalItem]) -> EvalReport {
        let total = items.len();
        info!(
            "Evaluating {} questions (concurrency {})",
            total, self.options.concurrency
        );
        self.progress.on_eval_start(total);

        let records: Vec<EvalRecord> = stream::iter(items.iter().enumerate().map(|(i, item)| {
            let index = i + 1;
            async move {
                self.progress.on_item_start(index, total, &item.question);
                let record = self.evaluate_item(item).await;
                self.progress.on_item_complete(index, total, &record);
                record
            }
        }))
        .buffered(self.options.concurrency.max(1))
        .collect()
        .await;

        let report = EvalReport::from_records(records);
        self.progress.on_eval_complete(&report.evaluation_metadata);
        info!(
            "Evaluation finished: {}/{} correct, {} failed ({:.1}%)",
            report.evaluation_metadata.correct_answers,
            total,
            report.evaluation_metadata.failed_items,
            report.accuracy()
        );
        report
    }

    /// Load → ask → judge. Never fails; failures become `failed` records.
    async fn evaluate_item(&self, item: &EvalItem) -> EvalRecord {
        let start = Instant::now();
        let reference = item
            .image_reference
            .as_deref()
            .map(PathBuf::from)
            .or_else(|| self.options.default_reference.clone());

        let mut record = EvalRecord {
            question: item.question.clone(),
            expected_answer: item.expected_answer.clone(),
            image_reference: reference.as_deref().map(|p| p.display().to_string()),
            predicted_answer: None,
            page: None,
            verdict: Verdict::Failed,
            is_correct: false,
            rationale: None,
            error: None,
            failed_stage: None,
            duration_ms: 0,
        };

        let outcome = self.answer_and_grade(item, reference.as_deref(), &mut record).await;
        if let Err((stage, message)) = outcome {
            warn!("Item '{}' failed at {:?}: {}", item.question, stage, message);
            record.verdict = Verdict::Failed;
            record.failed_stage = Some(stage);
            record.error = Some(message);
        }
        record.duration_ms = start.elapsed().as_millis() as u64;
        record
    }

    async fn answer_and_grade(
        &self,
        item: &EvalItem,
        reference: Option<&Path>,
        record: &mut EvalRecord,
    ) -> Result<(), (EvalStage, String)> {
        let path = reference.ok_or((
            EvalStage::Load,
            "item has no document reference and no default was given".to_string(),
        ))?;
        let loaded = load_reference(path)
            .await
            .map_err(|e| (EvalStage::Load, e.to_string()))?;

        let answer = self
            .pipeline
            .ask_reference(loaded, &item.question)
            .await
            .map_err(|e| (EvalStage::Ask, e.to_string()))?;
        record.predicted_answer = Some(answer.answer.clone());
        record.page = Some(answer.page);

        let judgement = self
            .judge
            .grade(&item.question, &item.expected_answer, &answer.answer)
            .await
            .map_err(|e| (EvalStage::Judge, e.to_string()))?;
        record.verdict = judgement.verdict;
        record.is_correct = judgement.verdict == Verdict::Correct;
        record.rationale = judgement.rationale;
        Ok(())
    }
}
