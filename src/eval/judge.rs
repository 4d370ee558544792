//! LLM-as-judge grading.

use super::report::Verdict;
use crate::error::BackendError;
use crate::llm::{complete_with_retry, CompletionSettings, Message, RetryPolicy, VisionModel};
use crate::prompts::{judge_message, JUDGE_SYSTEM_PROMPT};
use std::sync::Arc;
use tracing::warn;

/// Enough for the verdict word and a one-sentence rationale.
const JUDGE_MAX_TOKENS: usize = 96;

/// A judge's decision on one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgement {
    /// Either [`Verdict::Correct`] or [`Verdict::Incorrect`].
    pub verdict: Verdict,
    pub rationale: Option<String>,
}

pub struct Judge {
    model: Arc<dyn VisionModel>,
    retry: RetryPolicy,
}

impl Judge {
    pub fn new(model: Arc<dyn VisionModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Ask the judge model whether `predicted` matches `expected`.
    pub async fn grade(
        &self,
        question: &str,
        expected: &str,
        predicted: &str,
    ) -> Result<Judgement, BackendError> {
        let messages = [
            Message::system(JUDGE_SYSTEM_PROMPT),
            Message::user(judge_message(question, expected, predicted)),
        ];
        let options = CompletionSettings {
            temperature: Some(0.0),
            max_tokens: Some(JUDGE_MAX_TOKENS),
        };
        let completion =
            complete_with_retry(self.model.as_ref(), &messages, &options, &self.retry).await?;
        Ok(parse_judgement(&completion.content))
    }
}

/// Read the verdict word from the first non-empty line; anything after it is
/// the rationale. Unrecognised replies grade as incorrect.
pub fn parse_judgement(content: &str) -> Judgement {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next().unwrap_or_default();

    let (mut word, mut rest) = leading_word(first);
    if word.eq_ignore_ascii_case("verdict") {
        (word, rest) = leading_word(rest);
    }

    let verdict = if word.eq_ignore_ascii_case("correct") {
        Verdict::Correct
    } else if word.eq_ignore_ascii_case("incorrect") {
        Verdict::Incorrect
    } else {
        warn!("Unexpected judge response '{}', grading as incorrect", first);
        return Judgement {
            verdict: Verdict::Incorrect,
            rationale: Some(content.trim().to_string()).filter(|s| !s.is_empty()),
        };
    };

    let inline = rest
        .trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .trim();
    let mut rationale: Vec<&str> = Vec::new();
    if !inline.is_empty() {
        rationale.push(inline);
    }
    rationale.extend(lines);

    Judgement {
        verdict,
        rationale: (!rationale.is_empty()).then(|| rationale.join(" ")),
    }
}

/// Split off the first run of ASCII letters, skipping any markup before it.
fn leading_word(line: &str) -> (&str, &str) {
    let line = line.trim_start_matches(|c: char| !c.is_ascii_alphabetic());
    let end = line
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(line.len());
    line.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_then_rationale() {
        let j = parse_judgement("correct\nBoth state 978.35 EUR.");
        assert_eq!(j.verdict, Verdict::Correct);
        assert_eq!(j.rationale.as_deref(), Some("Both state 978.35 EUR."));
    }

    #[test]
    fn incorrect_is_not_mistaken_for_correct() {
        let j = parse_judgement("Incorrect.");
        assert_eq!(j.verdict, Verdict::Incorrect);
        assert_eq!(j.rationale, None);
    }

    #[test]
    fn decorated_verdicts() {
        assert_eq!(parse_judgement("**Correct**").verdict, Verdict::Correct);
        assert_eq!(parse_judgement("Verdict: correct").verdict, Verdict::Correct);
        let j = parse_judgement("correct - dates match");
        assert_eq!(j.rationale.as_deref(), Some("dates match"));
    }

    #[test]
    fn unexpected_reply_is_incorrect() {
        let j = parse_judgement("The answers look similar.");
        assert_eq!(j.verdict, Verdict::Incorrect);
        assert!(j.rationale.is_some());
        assert_eq!(parse_judgement("").verdict, Verdict::Incorrect);
    }

    #[test]
    fn verdict_must_be_a_whole_word() {
        let j = parse_judgement("Correctness: incorrect");
        assert_eq!(j.verdict, Verdict::Incorrect);
        assert_eq!(j.rationale.as_deref(), Some("Correctness: incorrect"));

        let j = parse_judgement("correctly answered? no. incorrect");
        assert_eq!(j.verdict, Verdict::Incorrect);
        assert_eq!(
            j.rationale.as_deref(),
            Some("correctly answered? no. incorrect")
        );
    }

    #[test]
    fn rationale_keeps_reply_casing() {
        let j = parse_judgement("Verdict: Correct. Both say EUR 978.35\nSame currency.");
        assert_eq!(j.verdict, Verdict::Correct);
        assert_eq!(
            j.rationale.as_deref(),
            Some("Both say EUR 978.35 Same currency.")
        );
    }
}
