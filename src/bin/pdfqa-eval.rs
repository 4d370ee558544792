//! Evaluation CLI for edgequake-pdfqa.
//!
//! Replays a JSONL question set through the QA pipeline, grades every answer
//! with a judge model and writes a JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfqa::eval::{
    load_eval_set, EvalOptions, EvalProgressCallback, EvalRecord, EvalReport, EvalRunner,
    EvaluationMetadata, Judge, Verdict,
};
use edgequake_pdfqa::{build_model, QaPipeline, RetryPolicy, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

struct CliProgressCallback {
    bar: ProgressBar,
    verbose: bool,
}

impl CliProgressCallback {
    fn new(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} questions  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Evaluating");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar, verbose })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}\u{2026}", s.chars().take(max - 1).collect::<String>())
    } else {
        s.to_string()
    }
}

impl EvalProgressCallback for CliProgressCallback {
    fn on_eval_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
    }

    fn on_item_start(&self, _index: usize, _total: usize, question: &str) {
        self.bar.set_message(truncate(question, 40));
    }

    fn on_item_complete(&self, index: usize, total: usize, record: &EvalRecord) {
        let mark = match record.verdict {
            Verdict::Correct => green("✓"),
            Verdict::Incorrect => red("✗"),
            Verdict::Failed => yellow("⚠"),
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            mark,
            index,
            total,
            truncate(&record.question, 60),
            dim(&format!("{:.1}s", record.duration_ms as f64 / 1000.0)),
        ));
        if self.verbose {
            self.bar.println(format!(
                "         expected:  {}\n         predicted: {}",
                record.expected_answer,
                record.predicted_answer.as_deref().unwrap_or("-"),
            ));
            if let Some(err) = &record.error {
                self.bar.println(format!("         error:     {}", red(err)));
            }
        }
        self.bar.inc(1);
    }

    fn on_eval_complete(&self, _metadata: &EvaluationMetadata) {
        self.bar.finish_and_clear();
    }
}

/// Run a labelled question set through the QA pipeline and grade it.
#[derive(Parser, Debug)]
#[command(
    name = "pdfqa-eval",
    version,
    about = "Evaluate visual PDF question answering against a labelled JSONL set",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// JSONL evaluation set.
    #[arg(long, default_value = "eval/eval_set.jsonl")]
    eval_set: PathBuf,

    /// Document (PDF, PNG or JPEG) for items that name none.
    #[arg(long, alias = "image")]
    document: Option<PathBuf>,

    /// Report path (default: evaluation_results_YYYYmmdd_HHMMSS.json).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Items evaluated at once.
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Read settings from this .env file instead of ./.env.
    #[arg(long, env = "PDFQA_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Show expected/predicted answers per item and DEBUG logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the final accuracy.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.env_file.as_deref()).context("Failed to load settings")?;

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = settings.cli_log_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Some(doc) = &cli.document {
        anyhow::ensure!(doc.exists(), "Document '{}' not found", doc.display());
    }
    let items = load_eval_set(&cli.eval_set)
        .await
        .context("Failed to load evaluation set")?;

    let settings = Arc::new(settings);
    let judge_model = build_model(&settings, settings.judge_model())
        .context("Failed to initialise judge model")?;
    let judge = Judge::new(judge_model, RetryPolicy::from_settings(&settings));
    let pipeline = Arc::new(
        QaPipeline::from_settings(settings.clone()).context("Failed to initialise pipeline")?,
    );

    if !cli.quiet {
        eprintln!(
            "{} {} questions  model {}  judge {}",
            bold("◆"),
            items.len(),
            bold(&settings.model_id),
            bold(settings.judge_model()),
        );
    }

    let options = EvalOptions {
        concurrency: cli.concurrency.max(1),
        default_reference: cli.document.clone(),
    };
    let mut runner = EvalRunner::new(pipeline, judge, options);
    if !cli.quiet {
        runner = runner.with_progress(CliProgressCallback::new(cli.verbose));
    }

    let report = runner.run(&items).await;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(EvalReport::default_filename()));
    report
        .save(&output)
        .await
        .context("Failed to save evaluation report")?;

    print_summary(&report, &output, cli.quiet);
    Ok(())
}

fn print_summary(report: &EvalReport, output: &std::path::Path, quiet: bool) {
    let meta = &report.evaluation_metadata;
    if quiet {
        println!("{:.1}", meta.accuracy);
        return;
    }

    eprintln!();
    eprintln!("{}", bold("EVALUATION SUMMARY"));
    eprintln!("  Total questions:   {}", meta.total_questions);
    eprintln!("  Correct answers:   {}", green(&meta.correct_answers.to_string()));
    eprintln!("  Incorrect answers: {}", red(&meta.incorrect_answers.to_string()));
    if meta.failed_items > 0 {
        eprintln!("  Failed items:      {}", yellow(&meta.failed_items.to_string()));
    }
    eprintln!("  Accuracy:          {}", bold(&format!("{:.1}%", meta.accuracy)));
    eprintln!("  Report:            {}", dim(&output.display().to_string()));
}
