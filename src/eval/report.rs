//! Evaluation records and the persisted JSON report.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// The item could not be answered or graded.
    Failed,
}

/// Where a failed item stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalStage {
    Load,
    Ask,
    Judge,
}

/// Outcome for one eval item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub expected_answer: String,
    pub image_reference: Option<String>,
    pub predicted_answer: Option<String>,
    /// 1-based page the answer was attributed to.
    pub page: Option<usize>,
    pub verdict: Verdict,
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<EvalStage>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    /// RFC 3339 local time the report was assembled.
    pub timestamp: String,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub failed_items: usize,
    /// Percentage of all questions graded correct (failed items count against it).
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub evaluation_metadata: EvaluationMetadata,
    pub results: Vec<EvalRecord>,
}

impl EvalReport {
    pub fn from_records(results: Vec<EvalRecord>) -> Self {
        let count = |v: Verdict| results.iter().filter(|r| r.verdict == v).count();
        let total = results.len();
        let correct = count(Verdict::Correct);
        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };

        Self {
            evaluation_metadata: EvaluationMetadata {
                timestamp: chrono::Local::now().to_rfc3339(),
                total_questions: total,
                correct_answers: correct,
                incorrect_answers: count(Verdict::Incorrect),
                failed_items: count(Verdict::Failed),
                accuracy,
            },
            results,
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.evaluation_metadata.accuracy
    }

    /// `evaluation_results_YYYYmmdd_HHMMSS.json` for the current local time.
    pub fn default_filename() -> String {
        format!(
            "evaluation_results_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    }

    /// Write the report as pretty JSON, atomically (temp file + rename).
    pub async fn save(&self, path: &Path) -> Result<(), EvalError> {
        let json = serde_json::to_string_pretty(self)?;
        let write_err = |source| EvalError::ReportWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        info!("Saved evaluation report to {}", path.display());
        Ok(())
    }
}
