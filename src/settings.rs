//! Process settings for the QA service and evaluation harness.
//!
//! All behaviour is controlled through [`Settings`], loaded once at process
//! start from the environment (and an optional `.env` file) and then shared
//! read-only behind an `Arc`. Nothing in the library reads environment
//! variables after that point.
//!
//! Keys are matched case-insensitively: `API_BASE` and `api_base` are the
//! same setting. Unknown keys are ignored.
//!
//! Library users and tests that do not want to touch the environment use
//! [`Settings::builder()`] instead.

use crate::error::PdfQaError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Deployment mode (`ENVIRONMENT`).
/// Upper bound for `MAX_RENDERED_PIXELS`; pdfium takes render sizes as `i32`.
pub const RENDERED_PIXELS_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = PdfQaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(PdfQaError::InvalidConfig(format!(
                "ENVIRONMENT must be development, staging or production, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(s)
    }
}

/// Typed configuration for the whole process.
#[derive(Clone)]
pub struct Settings {
    // ── Backend ──────────────────────────────────────────────────────────
    /// Base URL of the OpenAI-compatible API (`API_BASE`). Default: `http://localhost:11434/v1`.
    ///
    /// Requests go to `{api_base}/chat/completions`.
    pub api_base: String,

    /// Bearer token for the backend (`API_KEY`). Local servers usually need none.
    pub api_key: Option<String>,

    /// Vision model identifier (`MODEL_ID`). Default: `google/gemma-3-27b-it`.
    pub model_id: String,

    /// Route model calls through an edgequake-llm provider (`LLM_PROVIDER`),
    /// e.g. `openai`, `anthropic`, `gemini`. When unset the OpenAI-compatible
    /// client talks to `api_base` directly.
    pub llm_provider: Option<String>,

    /// Model used by the evaluation judge (`JUDGE_MODEL_ID`). Defaults to `model_id`.
    pub judge_model_id: Option<String>,

    /// Sampling temperature for agent turns (`TEMPERATURE`). Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per agent turn (`MAX_TOKENS`). Default: 1024.
    pub max_tokens: usize,

    /// Per-call timeout in seconds (`API_TIMEOUT_SECS`). Default: 120.
    pub api_timeout_secs: u64,

    /// Extra attempts after a transient backend failure (`MAX_RETRIES`). Default: 2.
    ///
    /// Only timeouts, connection failures, 429 and 5xx are retried. Set to 0
    /// to fail the request on the first backend error.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt (`RETRY_BACKOFF_MS`). Default: 500.
    pub retry_backoff_ms: u64,

    // ── Agent ────────────────────────────────────────────────────────────
    /// Hard ceiling on model calls per question (`MAX_STEPS`). Default: 20.
    pub max_steps: usize,

    /// Number of distinct page images kept in context (`IMAGE_WINDOW`). Default: 2.
    pub image_window: usize,

    /// Append extracted page text to navigation observations (`INCLUDE_PAGE_TEXT`). Default: true.
    pub include_page_text: bool,

    // ── Rendering ────────────────────────────────────────────────────────
    /// Rendering DPI (`RENDER_DPI`). Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Longest rendered edge in pixels (`MAX_RENDERED_PIXELS`). Default: 2000,
    /// clamped to `100..=`[`RENDERED_PIXELS_LIMIT`].
    pub max_rendered_pixels: u32,

    /// Largest accepted page count (`MAX_PAGES`). Default: 500.
    pub max_pages: usize,

    /// Largest accepted upload in bytes (`MAX_UPLOAD_BYTES`). Default: 32 MiB.
    pub max_upload_bytes: usize,

    /// Path to libpdfium or the directory containing it (`PDFIUM_LIB_PATH`).
    /// When unset the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    // ── Server ───────────────────────────────────────────────────────────
    /// Bind address (`HOST`). Default: `0.0.0.0`.
    pub host: String,

    /// Bind port (`PORT`). Default: 8000.
    pub port: u16,

    /// Deployment mode (`ENVIRONMENT`). Default: development.
    pub environment: Environment,

    /// Include internal error detail in HTTP responses (`DEBUG`). Default: true.
    pub debug: bool,

    /// Log level used when `RUST_LOG` is unset (`LOG_LEVEL`). Default: `INFO`.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model_id: "google/gemma-3-27b-it".to_string(),
            llm_provider: None,
            judge_model_id: None,
            temperature: 0.1,
            max_tokens: 1024,
            api_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_steps: 20,
            image_window: 2,
            include_page_text: true,
            dpi: 150,
            max_rendered_pixels: 2000,
            max_pages: 500,
            max_upload_bytes: 32 * 1024 * 1024,
            pdfium_lib_path: None,
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::default(),
            debug: true,
            log_level: "INFO".to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("llm_provider", &self.llm_provider)
            .field("judge_model_id", &self.judge_model_id)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_steps", &self.max_steps)
            .field("image_window", &self.image_window)
            .field("dpi", &self.dpi)
            .field("max_pages", &self.max_pages)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("debug", &self.debug)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Settings {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder {
            settings: Self::default(),
        }
    }

    /// Load `.env` (if present, or the given file) and then read the environment.
    pub fn load(env_file: Option<&Path>) -> Result<Self, PdfQaError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    PdfQaError::InvalidConfig(format!("cannot load {}: {e}", path.display()))
                })?;
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    debug!("Loaded settings file {}", path.display());
                }
            }
        }
        Self::from_env()
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, PdfQaError> {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        Self::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
        })
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// `lookup` receives upper-case keys. Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PdfQaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut b = Settings::builder();

        if let Some(v) = get("API_BASE") {
            b = b.api_base(v);
        }
        if let Some(v) = get("API_KEY") {
            b = b.api_key(v);
        }
        if let Some(v) = get("MODEL_ID") {
            b = b.model_id(v);
        }
        if let Some(v) = get("LLM_PROVIDER") {
            b = b.llm_provider(v);
        }
        if let Some(v) = get("JUDGE_MODEL_ID") {
            b = b.judge_model_id(v);
        }
        if let Some(v) = get("TEMPERATURE") {
            b = b.temperature(parse_var("TEMPERATURE", &v)?);
        }
        if let Some(v) = get("MAX_TOKENS") {
            b = b.max_tokens(parse_var("MAX_TOKENS", &v)?);
        }
        if let Some(v) = get("API_TIMEOUT_SECS") {
            b = b.api_timeout_secs(parse_var("API_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("MAX_RETRIES") {
            b = b.max_retries(parse_var("MAX_RETRIES", &v)?);
        }
        if let Some(v) = get("RETRY_BACKOFF_MS") {
            b = b.retry_backoff_ms(parse_var("RETRY_BACKOFF_MS", &v)?);
        }
        if let Some(v) = get("MAX_STEPS") {
            b = b.max_steps(parse_var("MAX_STEPS", &v)?);
        }
        if let Some(v) = get("IMAGE_WINDOW") {
            b = b.image_window(parse_var("IMAGE_WINDOW", &v)?);
        }
        if let Some(v) = get("INCLUDE_PAGE_TEXT") {
            b = b.include_page_text(parse_bool("INCLUDE_PAGE_TEXT", &v)?);
        }
        if let Some(v) = get("RENDER_DPI") {
            b = b.dpi(parse_var("RENDER_DPI", &v)?);
        }
        if let Some(v) = get("MAX_RENDERED_PIXELS") {
            b = b.max_rendered_pixels(parse_var("MAX_RENDERED_PIXELS", &v)?);
        }
        if let Some(v) = get("MAX_PAGES") {
            b = b.max_pages(parse_var("MAX_PAGES", &v)?);
        }
        if let Some(v) = get("MAX_UPLOAD_BYTES") {
            b = b.max_upload_bytes(parse_var("MAX_UPLOAD_BYTES", &v)?);
        }
        if let Some(v) = get("PDFIUM_LIB_PATH") {
            b = b.pdfium_lib_path(v);
        }
        if let Some(v) = get("HOST") {
            b = b.host(v);
        }
        if let Some(v) = get("PORT") {
            b = b.port(parse_var("PORT", &v)?);
        }
        if let Some(v) = get("ENVIRONMENT") {
            b = b.environment(v.parse()?);
        }
        if let Some(v) = get("DEBUG") {
            b = b.debug(parse_bool("DEBUG", &v)?);
        }
        if let Some(v) = get("LOG_LEVEL") {
            b = b.log_level(v);
        }

        b.build()
    }

    /// The model the evaluation judge should use.
    pub fn judge_model(&self) -> &str {
        self.judge_model_id.as_deref().unwrap_or(&self.model_id)
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default `tracing` filter directive derived from `LOG_LEVEL`.
    pub fn log_filter(&self) -> String {
        let level = match self.log_level.trim().to_ascii_lowercase().as_str() {
            "critical" | "fatal" => "error".to_string(),
            "warning" => "warn".to_string(),
            other => other.to_string(),
        };
        format!("{level},tower_http={level}")
    }

    /// Filter for the binaries: `--verbose` forces debug, else `LOG_LEVEL`.
    /// `RUST_LOG` still wins when the subscriber is built.
    pub fn cli_log_filter(&self, verbose: bool) -> String {
        if verbose {
            "debug,tower_http=debug".to_string()
        } else {
            self.log_filter()
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, PdfQaError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PdfQaError::InvalidConfig(format!("{key}='{value}': {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PdfQaError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PdfQaError::InvalidConfig(format!(
            "{key}='{value}': expected a boolean"
        ))),
    }
}

/// Builder for [`Settings`].
#[derive(Debug)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.settings.api_base = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.api_key = Some(key.into());
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.settings.model_id = model.into();
        self
    }

    pub fn llm_provider(mut self, name: impl Into<String>) -> Self {
        self.settings.llm_provider = Some(name.into());
        self
    }

    pub fn judge_model_id(mut self, model: impl Into<String>) -> Self {
        self.settings.judge_model_id = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.settings.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.settings.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.settings.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.settings.retry_backoff_ms = ms;
        self
    }

    pub fn max_steps(mut self, n: usize) -> Self {
        self.settings.max_steps = n;
        self
    }

    pub fn image_window(mut self, k: usize) -> Self {
        self.settings.image_window = k.max(1);
        self
    }

    pub fn include_page_text(mut self, v: bool) -> Self {
        self.settings.include_page_text = v;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.settings.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.settings.max_rendered_pixels = px.clamp(100, RENDERED_PIXELS_LIMIT);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.settings.max_pages = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.settings.max_upload_bytes = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.settings.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.settings.port = port;
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.settings.environment = env;
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.settings.debug = v;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.settings.log_level = level.into();
        self
    }

    /// Build the settings, validating constraints.
    pub fn build(self) -> Result<Settings, PdfQaError> {
        let s = &self.settings;
        if s.max_steps == 0 {
            return Err(PdfQaError::InvalidConfig("MAX_STEPS must be ≥ 1".into()));
        }
        if s.max_pages == 0 {
            return Err(PdfQaError::InvalidConfig("MAX_PAGES must be ≥ 1".into()));
        }
        if s.api_timeout_secs == 0 {
            return Err(PdfQaError::InvalidConfig(
                "API_TIMEOUT_SECS must be ≥ 1".into(),
            ));
        }
        if s.model_id.trim().is_empty() {
            return Err(PdfQaError::InvalidConfig("MODEL_ID must not be empty".into()));
        }
        if s.llm_provider.is_none() && !is_http_url(&s.api_base) {
            return Err(PdfQaError::InvalidConfig(format!(
                "API_BASE must be an http(s) URL, got '{}'",
                s.api_base
            )));
        }
        Ok(self.settings)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let s = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(s.api_base, "http://localhost:11434/v1");
        assert_eq!(s.model_id, "google/gemma-3-27b-it");
        assert_eq!(s.port, 8000);
        assert_eq!(s.max_steps, 20);
        assert_eq!(s.image_window, 2);
        assert!(s.debug);
        assert_eq!(s.environment, Environment::Development);
    }

    #[test]
    fn reads_recognised_keys() {
        let s = Settings::from_lookup(lookup(&[
            ("API_BASE", "https://vllm.internal/v1"),
            ("API_KEY", "secret"),
            ("MODEL_ID", "qwen2.5-vl"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("ENVIRONMENT", "production"),
            ("DEBUG", "false"),
            ("LOG_LEVEL", "WARNING"),
            ("MAX_STEPS", "5"),
        ]))
        .unwrap();

        assert_eq!(s.api_base, "https://vllm.internal/v1");
        assert_eq!(s.api_key.as_deref(), Some("secret"));
        assert_eq!(s.model_id, "qwen2.5-vl");
        assert_eq!(s.bind_address(), "127.0.0.1:9000");
        assert_eq!(s.environment, Environment::Production);
        assert!(!s.debug);
        assert_eq!(s.max_steps, 5);
        assert_eq!(s.log_filter(), "warn,tower_http=warn");
    }

    #[test]
    fn cli_log_filter_follows_log_level_unless_verbose() {
        let s = Settings::from_lookup(lookup(&[("LOG_LEVEL", "ERROR")])).unwrap();
        assert_eq!(s.cli_log_filter(false), "error,tower_http=error");
        assert_eq!(s.cli_log_filter(true), "debug,tower_http=debug");
    }

    #[test]
    fn rendered_pixels_are_capped() {
        let s = Settings::from_lookup(lookup(&[("MAX_RENDERED_PIXELS", "4294967295")])).unwrap();
        assert_eq!(s.max_rendered_pixels, RENDERED_PIXELS_LIMIT);
        let s = Settings::builder().max_rendered_pixels(10).build().unwrap();
        assert_eq!(s.max_rendered_pixels, 100);
    }

    #[test]
    fn empty_values_are_unset() {
        let s = Settings::from_lookup(lookup(&[("API_KEY", "  ")])).unwrap();
        assert!(s.api_key.is_none());
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"), "got: {err}");
    }

    #[test]
    fn bad_bool_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[("DEBUG", "maybe")])).is_err());
    }

    #[test]
    fn zero_steps_is_invalid() {
        assert!(Settings::builder().max_steps(0).build().is_err());
    }

    #[test]
    fn api_base_must_be_url_without_provider() {
        assert!(Settings::builder().api_base("localhost").build().is_err());
        assert!(Settings::builder()
            .api_base("localhost")
            .llm_provider("anthropic")
            .build()
            .is_ok());
    }

    #[test]
    fn builder_clamps() {
        let s = Settings::builder()
            .dpi(1000)
            .image_window(0)
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(s.dpi, 400);
        assert_eq!(s.image_window, 1);
        assert_eq!(s.temperature, 2.0);
    }

    #[test]
    fn judge_model_falls_back_to_model_id() {
        let s = Settings::builder().model_id("m1").build().unwrap();
        assert_eq!(s.judge_model(), "m1");
        let s = Settings::builder()
            .model_id("m1")
            .judge_model_id("judge")
            .build()
            .unwrap();
        assert_eq!(s.judge_model(), "judge");
    }

    #[test]
    fn debug_redacts_api_key() {
        let s = Settings::builder().api_key("sk-very-secret").build().unwrap();
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("sk-very-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
