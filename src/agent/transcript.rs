//! Conversation history for one agent run.
//!
//! The transcript stores text only. Page images are attached when the
//! history is rendered into [`Message`]s for a model call, and only for pages
//! the [`ImageWindow`] still holds: the latest observation of each retained
//! page carries that page's image; every other page observation gets a
//! placeholder line. The image count per request therefore never exceeds the
//! window capacity, however long the run.

use crate::document::PdfDocument;
use crate::llm::Message;
use crate::memory::ImageWindow;
use crate::prompts;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Raw model output.
    Reply(String),
    /// Tool result or correction shown to the model. `page` is set when the
    /// observation shows a page (0-based).
    Observation { text: String, page: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct Transcript {
    system_prompt: String,
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a run: the task message shows page 1.
    pub fn new(question: &str, total_pages: usize) -> Self {
        Self {
            system_prompt: prompts::AGENT_SYSTEM_PROMPT.to_string(),
            turns: vec![Turn::Observation {
                text: prompts::task_message(question, total_pages),
                page: Some(0),
            }],
        }
    }

    pub fn push_reply(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::Reply(content.into()));
    }

    pub fn push_observation(&mut self, text: impl Into<String>, page: Option<usize>) {
        self.turns.push(Turn::Observation {
            text: text.into(),
            page,
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Build the request messages, attaching images for pages in `window`.
    pub fn render(&self, document: &PdfDocument, window: &ImageWindow) -> Vec<Message> {
        // page → index of the turn that shows it most recently
        let mut latest: HashMap<usize, usize> = HashMap::new();
        for (i, turn) in self.turns.iter().enumerate() {
            if let Turn::Observation {
                page: Some(page), ..
            } = turn
            {
                latest.insert(*page, i);
            }
        }

        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(Message::system(self.system_prompt.as_str()));

        for (i, turn) in self.turns.iter().enumerate() {
            match turn {
                Turn::Reply(content) => messages.push(Message::assistant(content.as_str())),
                Turn::Observation { text, page: None } => {
                    messages.push(Message::user(text.as_str()))
                }
                Turn::Observation {
                    text,
                    page: Some(page),
                } => {
                    let image = (latest.get(page) == Some(&i) && window.contains(*page))
                        .then(|| document.page(*page))
                        .flatten()
                        .map(|p| p.image.clone());
                    match image {
                        Some(image) => {
                            messages.push(Message::user_with_images(text.as_str(), vec![image]))
                        }
                        None => messages.push(Message::user(format!(
                            "{}\n{}",
                            text,
                            prompts::image_evicted_placeholder(*page)
                        ))),
                    }
                }
            }
        }
        messages
    }
}
