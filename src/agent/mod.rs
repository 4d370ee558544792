//! The page-navigation agent.
//!
//! ## State machine
//!
//! ```text
//!            ┌──────────────┐  Navigate   ┌────────────────┐
//!   start ─► │  Reasoning   │ ──────────► │ ToolExecution  │
//!            │ (model call) │ ◄────────── │ (tracker.apply)│
//!            └──────┬───────┘ observation └────────────────┘
//!                   │ Final
//!                   ▼
//!              ┌──────────┐
//!              │ Terminal │ ─► AgentOutcome
//!              └──────────┘
//! ```
//!
//! Every model call is one step. A reply that cannot be parsed goes back to
//! `Reasoning` with a corrective observation, and still counts. Once
//! `max_steps` calls have been spent without a final answer the run fails
//! with [`PdfQaError::StepLimitExceeded`]; nothing else bounds the loop.
//!
//! All run state (tracker, image window, transcript) lives in a [`Session`]
//! created per call to [`Agent::run`] and dropped with it.

pub mod directive;
pub mod transcript;

use crate::document::PdfDocument;
use crate::error::PdfQaError;
use crate::llm::{complete_with_retry, CompletionSettings, RetryPolicy, VisionModel};
use crate::memory::ImageWindow;
use crate::navigation::{Navigation, NavigationCommand, PageTracker};
use crate::prompts;
use crate::settings::Settings;
use directive::{parse_directive, AgentDirective};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use transcript::Transcript;

/// Tunables for one agent run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub image_window: usize,
    pub include_page_text: bool,
    pub completion: CompletionSettings,
    pub retry: RetryPolicy,
}

impl AgentConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_steps: settings.max_steps,
            image_window: settings.image_window,
            include_page_text: settings.include_page_text,
            completion: CompletionSettings {
                temperature: Some(settings.temperature),
                max_tokens: Some(settings.max_tokens),
            },
            retry: RetryPolicy::from_settings(settings),
        }
    }
}

/// How a navigation call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Moved,
    Boundary,
    InvalidPage,
}

/// One executed navigation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStep {
    /// Model call that requested this navigation (1-based).
    pub step: usize,
    /// e.g. `go_to_page(3)`.
    pub action: String,
    pub outcome: StepOutcome,
    /// Page shown after the call (1-based).
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
}

/// Token accounting across all model calls of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub model_calls: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    /// Page the agent was on when it answered (1-based).
    pub page: usize,
    pub steps: Vec<AgentStep>,
    pub usage: TokenUsage,
}

enum LoopState {
    Reasoning,
    ToolExecution {
        command: NavigationCommand,
        thought: Option<String>,
    },
    Terminal {
        answer: String,
    },
}

/// Per-run state. Never shared between runs.
struct Session<'d> {
    document: &'d PdfDocument,
    tracker: PageTracker,
    window: ImageWindow,
    transcript: Transcript,
    steps: Vec<AgentStep>,
    usage: TokenUsage,
    include_page_text: bool,
}

impl<'d> Session<'d> {
    fn new(
        document: &'d PdfDocument,
        question: &str,
        config: &AgentConfig,
    ) -> Result<Self, PdfQaError> {
        let tracker =
            PageTracker::new(document.page_count()).ok_or_else(|| PdfQaError::InvalidDocument {
                reason: "document has no pages".into(),
            })?;
        let mut window = ImageWindow::new(config.image_window);
        window.visit(tracker.current_page());

        Ok(Self {
            document,
            tracker,
            window,
            transcript: Transcript::new(question, document.page_count()),
            steps: Vec::new(),
            usage: TokenUsage::default(),
            include_page_text: config.include_page_text,
        })
    }

    fn execute(&mut self, command: NavigationCommand, thought: Option<String>) {
        let total = self.tracker.total_pages();
        let (outcome, observation, shown) = match self.tracker.apply(command) {
            Ok(Navigation::Moved { to, .. }) => {
                let text = if self.include_page_text {
                    self.document.page(to).and_then(|p| p.text.as_deref())
                } else {
                    None
                };
                (
                    StepOutcome::Moved,
                    prompts::switched_observation(to, total, text),
                    Some(to),
                )
            }
            Ok(Navigation::Boundary { page }) => (
                StepOutcome::Boundary,
                prompts::boundary_observation(
                    page,
                    total,
                    command == NavigationCommand::NextPage,
                ),
                Some(page),
            ),
            Err(e) => {
                warn!(
                    "Step {}: {} rejected — {}",
                    self.usage.model_calls, command, e
                );
                (
                    StepOutcome::InvalidPage,
                    prompts::invalid_page_observation(
                        e.requested.saturating_add(1),
                        e.total,
                        self.tracker.current_page(),
                    ),
                    None,
                )
            }
        };

        if let Some(page) = shown {
            if let Some(evicted) = self.window.visit(page) {
                debug!("Page {}: image dropped from context", evicted + 1);
            }
        }
        self.transcript.push_observation(observation, shown);

        debug!(
            "Step {}: {} → {:?}, now on page {}",
            self.usage.model_calls,
            command,
            outcome,
            self.tracker.current_page() + 1
        );
        self.steps.push(AgentStep {
            step: self.usage.model_calls,
            action: command.to_string(),
            outcome,
            page: self.tracker.current_page() + 1,
            thought,
        });
    }

    fn correct(&mut self, detail: &str) {
        self.transcript
            .push_observation(prompts::parse_error_observation(detail), None);
    }
}

/// Runs the navigation loop against one document.
#[derive(Clone)]
pub struct Agent {
    model: Arc<dyn VisionModel>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(model: Arc<dyn VisionModel>, config: AgentConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer `question` about `document`.
    pub async fn run(
        &self,
        document: &PdfDocument,
        question: &str,
    ) -> Result<AgentOutcome, PdfQaError> {
        let mut session = Session::new(document, question, &self.config)?;
        let max_steps = self.config.max_steps;
        let mut state = LoopState::Reasoning;

        info!(
            "Agent run started: {} pages, max {} steps, image window {}",
            document.page_count(),
            max_steps,
            session.window.capacity()
        );

        loop {
            state = match state {
                LoopState::Reasoning => {
                    if session.usage.model_calls >= max_steps {
                        warn!("Agent exceeded {} steps without an answer", max_steps);
                        return Err(PdfQaError::StepLimitExceeded { max_steps });
                    }
                    session.usage.model_calls += 1;
                    let step = session.usage.model_calls;

                    let messages = session.transcript.render(session.document, &session.window);
                    let completion = complete_with_retry(
                        self.model.as_ref(),
                        &messages,
                        &self.config.completion,
                        &self.config.retry,
                    )
                    .await?;
                    session.usage.prompt_tokens += completion.prompt_tokens;
                    session.usage.completion_tokens += completion.completion_tokens;
                    session.transcript.push_reply(completion.content.as_str());

                    match parse_directive(&completion.content) {
                        Ok(AgentDirective::Final { answer, .. }) if answer.is_empty() => {
                            warn!("Step {}: empty final answer", step);
                            session.correct("final_answer needs a non-empty answer");
                            LoopState::Reasoning
                        }
                        Ok(AgentDirective::Final { answer, .. }) => LoopState::Terminal { answer },
                        Ok(AgentDirective::Navigate { command, thought }) => {
                            LoopState::ToolExecution { command, thought }
                        }
                        Err(e) => {
                            warn!("Step {}: could not parse model reply — {}", step, e);
                            session.correct(&e.to_string());
                            LoopState::Reasoning
                        }
                    }
                }
                LoopState::ToolExecution { command, thought } => {
                    session.execute(command, thought);
                    LoopState::Reasoning
                }
                LoopState::Terminal { answer } => {
                    let page = session.tracker.current_page() + 1;
                    info!(
                        "Agent answered on page {} after {} steps",
                        page, session.usage.model_calls
                    );
                    return Ok(AgentOutcome {
                        answer,
                        page,
                        steps: session.steps,
                        usage: session.usage,
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RenderedPage;
    use crate::error::BackendError;
    use crate::llm::{Completion, Message};
    use async_trait::async_trait;
    use edgequake_llm::ImageData;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned replies; repeats the last one when the script runs out.
    struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<Vec<Message>>>,
        fail: bool,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _options: &CompletionSettings,
        ) -> Result<Completion, BackendError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(BackendError::permanent("scripted", "401 unauthorized"));
            }
            let mut replies = self.replies.lock().unwrap();
            let content = if replies.len() > 1 {
                replies.pop().unwrap_or_default()
            } else {
                replies.last().cloned().unwrap_or_default()
            };
            Ok(Completion {
                content,
                prompt_tokens: 10,
                completion_tokens: 2,
            })
        }
    }

    fn doc(texts: &[&str]) -> PdfDocument {
        let pages = texts
            .iter()
            .enumerate()
            .map(|(index, text)| RenderedPage {
                index,
                image: ImageData::new(format!("page{index}"), "image/png"),
                width: 10,
                height: 10,
                text: Some(text.to_string()),
            })
            .collect();
        PdfDocument::new("test.pdf", pages).unwrap()
    }

    fn config(max_steps: usize, window: usize) -> AgentConfig {
        AgentConfig {
            max_steps,
            image_window: window,
            include_page_text: true,
            completion: CompletionSettings::default(),
            retry: RetryPolicy::no_retry(Duration::from_secs(5)),
        }
    }

    #[tokio::test]
    async fn answers_from_second_page() {
        let model = ScriptedModel::new(&[
            r#"{"thought":"cover page","action":"next_page"}"#,
            r#"{"thought":"found it","action":"final_answer","answer":"$5M"}"#,
        ]);
        let agent = Agent::new(model.clone(), config(20, 2));
        let d = doc(&["Annual Report", "Total Revenue: $5M", "Appendix"]);

        let out = agent.run(&d, "What is the total revenue?").await.unwrap();
        assert_eq!(out.answer, "$5M");
        assert_eq!(out.page, 2);
        assert_eq!(out.usage.model_calls, 2);
        assert_eq!(out.usage.prompt_tokens, 20);
        assert_eq!(out.steps.len(), 1);
        assert_eq!(out.steps[0].outcome, StepOutcome::Moved);
        assert_eq!(out.steps[0].thought.as_deref(), Some("cover page"));

        let second = &model.requests()[1];
        let last = second.last().unwrap();
        assert!(last.text.contains("Switched to page 2 of 3."));
        assert!(last.text.contains("Total Revenue: $5M"));
    }

    #[tokio::test]
    async fn never_converging_agent_hits_step_limit() {
        let model = ScriptedModel::new(&[r#"{"action":"next_page"}"#]);
        let agent = Agent::new(model.clone(), config(5, 2));
        let err = agent.run(&doc(&["a", "b"]), "q").await.unwrap_err();
        assert!(matches!(err, PdfQaError::StepLimitExceeded { max_steps: 5 }));
        assert_eq!(model.requests().len(), 5);
    }

    #[tokio::test]
    async fn unparseable_reply_consumes_a_step() {
        let model = ScriptedModel::new(&[
            "I am not sure what to do.",
            r#"{"action":"final_answer","answer":"42"}"#,
        ]);
        let agent = Agent::new(model.clone(), config(20, 2));
        let out = agent.run(&doc(&["x"]), "q").await.unwrap();
        assert_eq!(out.answer, "42");
        assert_eq!(out.usage.model_calls, 2);
        assert!(out.steps.is_empty());

        let second = &model.requests()[1];
        assert!(second.last().unwrap().text.contains("could not be understood"));
    }

    #[tokio::test]
    async fn invalid_page_is_reported_back() {
        let model = ScriptedModel::new(&[
            r#"{"action":"go_to_page","page":9}"#,
            r#"{"action":"go_to_page","page":3}"#,
            r#"{"action":"final_answer","answer":"done"}"#,
        ]);
        let agent = Agent::new(model.clone(), config(20, 2));
        let out = agent.run(&doc(&["a", "b", "c"]), "q").await.unwrap();

        assert_eq!(out.steps[0].outcome, StepOutcome::InvalidPage);
        assert_eq!(out.steps[0].page, 1);
        assert_eq!(out.steps[1].outcome, StepOutcome::Moved);
        assert_eq!(out.page, 3);

        let second = &model.requests()[1];
        assert!(second.last().unwrap().text.contains("Page 9 does not exist"));
    }

    #[tokio::test]
    async fn boundary_is_not_an_error() {
        let model = ScriptedModel::new(&[
            r#"{"action":"previous_page"}"#,
            r#"{"action":"final_answer","answer":"first"}"#,
        ]);
        let agent = Agent::new(model.clone(), config(20, 2));
        let out = agent.run(&doc(&["a", "b"]), "q").await.unwrap();
        assert_eq!(out.steps[0].outcome, StepOutcome::Boundary);
        assert_eq!(out.page, 1);
    }

    #[tokio::test]
    async fn empty_final_answer_is_corrected() {
        let model = ScriptedModel::new(&[
            r#"{"action":"final_answer","answer":"  "}"#,
            r#"{"action":"final_answer","answer":"ok"}"#,
        ]);
        let agent = Agent::new(model, config(20, 2));
        let out = agent.run(&doc(&["a"]), "q").await.unwrap();
        assert_eq!(out.answer, "ok");
        assert_eq!(out.usage.model_calls, 2);
    }

    #[tokio::test]
    async fn backend_failure_is_fatal() {
        let agent = Agent::new(ScriptedModel::failing(), config(20, 2));
        let err = agent.run(&doc(&["a"]), "q").await.unwrap_err();
        assert!(matches!(err, PdfQaError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn image_count_stays_within_window() {
        let mut script: Vec<String> = (0..50)
            .map(|i| match i % 3 {
                0 => r#"{"action":"next_page"}"#.to_string(),
                1 => format!(r#"{{"action":"go_to_page","page":{}}}"#, (i % 5) + 1),
                _ => r#"{"action":"previous_page"}"#.to_string(),
            })
            .collect();
        script.push(r#"{"action":"final_answer","answer":"x"}"#.to_string());
        let refs: Vec<&str> = script.iter().map(String::as_str).collect();

        let model = ScriptedModel::new(&refs);
        let agent = Agent::new(model.clone(), config(60, 2));
        let out = agent
            .run(&doc(&["a", "b", "c", "d", "e"]), "q")
            .await
            .unwrap();
        assert_eq!(out.steps.len(), 50);

        for request in model.requests() {
            let images: usize = request.iter().map(|m| m.images.len()).sum();
            assert!(images <= 2, "request carried {images} images");
        }
    }
}
