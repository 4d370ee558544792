//! Offline evaluation harness.
//!
//! Replays a labelled JSONL question set through [`crate::ask::QaPipeline`],
//! grades each prediction with a judge model and writes a JSON report.
//!
//! ## Eval set format
//!
//! One JSON object per line; blank lines are skipped:
//!
//! ```text
//! {"question": "Was ist die Servicenummer?", "answer": "0800 123 456", "image": "tests/test.pdf"}
//! ```
//!
//! `answer` may also be spelled `expected_answer`, and `image` may be spelled
//! `image_reference` or `document`. Items without a reference fall back to
//! the runner's default document.
//!
//! ## Failure isolation
//!
//! A failing item (unreadable file, render error, backend error, judge error)
//! becomes a `failed` record with the stage and message; the remaining items
//! still run.

pub mod judge;
pub mod progress;
pub mod report;
pub mod runner;

pub use judge::{parse_judgement, Judge, Judgement};
pub use progress::{EvalProgressCallback, NoopProgressCallback};
pub use report::{EvalRecord, EvalReport, EvalStage, EvaluationMetadata, Verdict};
pub use runner::{EvalOptions, EvalRunner};

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One labelled question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalItem {
    pub question: String,
    #[serde(alias = "answer")]
    pub expected_answer: String,
    #[serde(default, alias = "image", alias = "document")]
    pub image_reference: Option<String>,
}

/// Read and parse a JSONL eval set.
pub async fn load_eval_set(path: &Path) -> Result<Vec<EvalItem>, EvalError> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EvalError::EvalSetUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
    let items = parse_eval_set(path, &content)?;
    info!("Loaded {} questions from {}", items.len(), path.display());
    Ok(items)
}

/// Parse JSONL `content`. `path` is only used in error messages.
pub fn parse_eval_set(path: &Path, content: &str) -> Result<Vec<EvalItem>, EvalError> {
    let mut items = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item: EvalItem =
            serde_json::from_str(line).map_err(|source| EvalError::EvalSetParse {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })?;
        items.push(item);
    }

    if items.is_empty() {
        return Err(EvalError::EmptyEvalSet {
            path: path.to_path_buf(),
        });
    }
    Ok(items)
}
