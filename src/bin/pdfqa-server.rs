//! HTTP server binary for edgequake-pdfqa.
//!
//! Loads settings from the environment (and `.env`), applies CLI overrides,
//! and serves `POST /ask_pdf`, `GET /docs` and `GET /health`.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfqa::{server, Environment, QaPipeline, Settings};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Local vLLM / Ollama endpoint from .env
  pdfqa-server

  # Override bind address
  pdfqa-server --host 127.0.0.1 --port 9000

  # Ask a question
  curl -F file=@report.pdf -F question="What was the total revenue?" \
       http://localhost:8000/ask_pdf

ENVIRONMENT VARIABLES:
  API_BASE            OpenAI-compatible endpoint (default http://localhost:11434/v1)
  API_KEY             Bearer token for API_BASE
  MODEL_ID            Vision model (default google/gemma-3-27b-it)
  LLM_PROVIDER        Route through an edgequake-llm provider instead (openai, anthropic, gemini, …)
  MAX_STEPS           Model calls per question before giving up (default 20)
  IMAGE_WINDOW        Page images kept in context (default 2)
  RENDER_DPI          Rasterisation DPI (default 150)
  MAX_UPLOAD_BYTES    Upload size limit (default 32 MiB)
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  LOG_LEVEL           debug, info, warning, error (default INFO; RUST_LOG wins)
"#;

/// Visual question answering over PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdfqa-server",
    version,
    about = "Answer questions about PDF documents with a page-navigating vision-LLM agent",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Host to bind (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Read settings from this .env file instead of ./.env.
    #[arg(long, env = "PDFQA_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.env_file.as_deref()).context("Failed to load settings")?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = settings.cli_log_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_ansi(settings.environment != Environment::Production)
        .with_writer(io::stderr)
        .init();

    info!(
        model = settings.model_id.as_str(),
        api_base = settings.api_base.as_str(),
        provider = settings.llm_provider.as_deref().unwrap_or("openai-compatible"),
        environment = %settings.environment,
        "Starting pdfqa-server"
    );

    let addr = settings.bind_address();
    let settings = Arc::new(settings);
    let pipeline =
        Arc::new(QaPipeline::from_settings(settings).context("Failed to initialise pipeline")?);

    server::serve(pipeline, &addr)
        .await
        .context("HTTP server failed")?;
    Ok(())
}
