//! Progress-callback trait for evaluation runs.
//!
//! Inject an [`Arc<dyn EvalProgressCallback>`] via
//! [`crate::eval::EvalRunner::with_progress`] to receive events as items are
//! answered and graded. The CLI uses it to drive a terminal progress bar.
//!
//! With `--concurrency > 1`, `on_item_start` and `on_item_complete` may be
//! called from several tasks at once and in any order. Implementations must
//! protect shared mutable state themselves.

use super::report::{EvalRecord, EvaluationMetadata};
use std::sync::Arc;

/// Called by [`crate::eval::EvalRunner`] as it processes each item.
///
/// All methods default to no-ops.
pub trait EvalProgressCallback: Send + Sync {
    /// Called once before the first item starts.
    fn on_eval_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before an item is loaded. `index` is 1-based.
    fn on_item_start(&self, index: usize, total_items: usize, question: &str) {
        let _ = (index, total_items, question);
    }

    /// Called after an item has a record, whatever its verdict.
    fn on_item_complete(&self, index: usize, total_items: usize, record: &EvalRecord) {
        let _ = (index, total_items, record);
    }

    /// Called once after every item has a record.
    fn on_eval_complete(&self, metadata: &EvaluationMetadata) {
        let _ = metadata;
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl EvalProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn EvalProgressCallback>;
