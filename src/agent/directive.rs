//! Parsing model replies into agent directives.
//!
//! The model is asked for one JSON object per turn:
//!
//! ```text
//! {"thought": "...", "action": "go_to_page", "page": 3}
//! ```
//!
//! Models drift from that format, so parsing is layered:
//!
//! 1. The whole reply as JSON, then a fenced ```` ```json ```` block, then the
//!    span from the first `{` to the last `}`.
//! 2. Failing that, a code-style call anywhere in the reply:
//!    `next_page()`, `go_to_page(page_number=3)`, `final_answer("...")`.
//!    The earliest call in the text wins.
//!
//! Page numbers from the model are 1-based and become 0-based
//! [`NavigationCommand::GoToPage`] indices here. Range checking is left to
//! the page tracker, so `go_to_page(0)` parses fine and fails there.

use crate::navigation::NavigationCommand;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// What the model asked for on one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentDirective {
    Navigate {
        command: NavigationCommand,
        thought: Option<String>,
    },
    Final {
        answer: String,
        thought: Option<String>,
    },
}

impl AgentDirective {
    pub fn thought(&self) -> Option<&str> {
        match self {
            AgentDirective::Navigate { thought, .. } | AgentDirective::Final { thought, .. } => {
                thought.as_deref()
            }
        }
    }
}

/// Why a reply could not be turned into a directive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("no JSON object or tool call found")]
    NoToolCall,

    #[error("JSON object has no 'action' field")]
    MissingAction,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("'{action}' requires a '{field}' argument")]
    MissingArgument {
        action: &'static str,
        field: &'static str,
    },

    #[error("page must be a whole number, got {0}")]
    InvalidPageArgument(String),
}

/// Parse one model reply.
pub fn parse_directive(content: &str) -> Result<AgentDirective, DirectiveError> {
    let json_result = match extract_json(content) {
        Some(Value::Object(map)) => parse_action_object(&map),
        Some(Value::String(inner)) if inner.trim() != content.trim() => {
            return parse_directive(&inner)
        }
        _ => Err(DirectiveError::NoToolCall),
    };

    match json_result {
        Ok(directive) => Ok(directive),
        Err(json_err) => parse_code_call(content).ok_or(json_err),
    }
}

fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(caps) = RE_FENCED.captures(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Some(value);
        }
    }

    // First complete object in the reply; anything after it is ignored.
    for (start, _) in trimmed.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = values.next() {
            return Some(value);
        }
    }

    None
}

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").unwrap());

fn parse_action_object(map: &Map<String, Value>) -> Result<AgentDirective, DirectiveError> {
    let thought = map
        .get("thought")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    // Arguments may sit at the top level or inside "input"/"args".
    let nested = ["input", "args", "arguments"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_object));
    let arg = |names: &[&str]| lookup(map, nested, names);

    let action = map
        .get("action")
        .or_else(|| map.get("tool"))
        .and_then(Value::as_str)
        .ok_or(DirectiveError::MissingAction)?;

    let command = match action.trim().to_ascii_lowercase().as_str() {
        "next_page" | "next" => NavigationCommand::NextPage,
        "previous_page" | "prev_page" | "previous" => NavigationCommand::PreviousPage,
        "go_to_page" | "goto_page" | "go_to" => {
            let page = arg(&["page", "page_number"]).ok_or(DirectiveError::MissingArgument {
                action: "go_to_page",
                field: "page",
            })?;
            NavigationCommand::GoToPage(page_index(page)?)
        }
        "final_answer" | "final" | "answer" => {
            let answer = arg(&["answer", "response", "final_answer"])
                .and_then(answer_text)
                .ok_or(DirectiveError::MissingArgument {
                    action: "final_answer",
                    field: "answer",
                })?;
            return Ok(AgentDirective::Final {
                answer: clean_answer(&answer),
                thought,
            });
        }
        other => return Err(DirectiveError::UnknownAction(other.to_string())),
    };

    Ok(AgentDirective::Navigate { command, thought })
}

fn lookup<'a>(
    map: &'a Map<String, Value>,
    nested: Option<&'a Map<String, Value>>,
    names: &[&str],
) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|n| map.get(*n))
        .or_else(|| nested.and_then(|m| names.iter().find_map(|n| m.get(*n))))
}

/// 1-based page argument → 0-based index.
fn page_index(value: &Value) -> Result<i64, DirectiveError> {
    let one_based = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| DirectiveError::InvalidPageArgument(value.to_string()))?;
    Ok(one_based.saturating_sub(1))
}

fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(answer_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

// ── Code-style fallback ──────────────────────────────────────────────────────

static RE_NEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnext_page\s*\(\s*\)").unwrap());
static RE_PREVIOUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bprevious_page\s*\(\s*\)").unwrap());
static RE_GO_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bgo_to_page\s*\(\s*(?:page(?:_number)?\s*=\s*)?(-?\d+)\s*\)").unwrap()
});
static RE_FINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\bfinal_answer\s*\(\s*(?:answer\s*=\s*)?("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^()]*?)\s*\)"#,
    )
    .unwrap()
});

fn parse_code_call(content: &str) -> Option<AgentDirective> {
    let mut candidates: Vec<(usize, AgentDirective)> = Vec::new();

    if let Some(m) = RE_NEXT.find(content) {
        candidates.push((m.start(), navigate(NavigationCommand::NextPage)));
    }
    if let Some(m) = RE_PREVIOUS.find(content) {
        candidates.push((m.start(), navigate(NavigationCommand::PreviousPage)));
    }
    if let Some(caps) = RE_GO_TO.captures(content) {
        if let (Some(whole), Ok(n)) = (caps.get(0), caps[1].parse::<i64>()) {
            candidates.push((
                whole.start(),
                navigate(NavigationCommand::GoToPage(n.saturating_sub(1))),
            ));
        }
    }
    if let Some(caps) = RE_FINAL.captures(content) {
        let answer = unquote(caps[1].trim());
        if let (Some(whole), false) = (caps.get(0), answer.trim().is_empty()) {
            candidates.push((
                whole.start(),
                AgentDirective::Final {
                    answer: clean_answer(&answer),
                    thought: None,
                },
            ));
        }
    }

    candidates
        .into_iter()
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, directive)| directive)
}

fn navigate(command: NavigationCommand) -> AgentDirective {
    AgentDirective::Navigate {
        command,
        thought: None,
    }
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(s) {
            return decoded;
        }
    }
    if s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
    {
        return s[1..s.len() - 1].replace("\\'", "'").replace("\\\"", "\"");
    }
    s.to_string()
}

// ── Answer cleanup ───────────────────────────────────────────────────────────

static RE_ANSWER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n?(.*?)\n?```$").unwrap());

/// Normalise a final answer: strip fences, wrapping quotes, invisible
/// characters and surrounding whitespace.
pub fn clean_answer(raw: &str) -> String {
    let s = raw.replace("\r\n", "\n").replace('\r', "\n");
    let s = s.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    );
    let trimmed = s.trim();
    let unfenced = match RE_ANSWER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    };

    let mut out = unfenced.as_str();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('`', '`')] {
        if out.chars().count() >= 2 && out.starts_with(open) && out.ends_with(close) {
            out = &out[open.len_utf8()..out.len() - close.len_utf8()];
            break;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav(command: NavigationCommand) -> AgentDirective {
        navigate(command)
    }

    #[test]
    fn plain_json_next_page() {
        let d = parse_directive(r#"{"thought":"title page","action":"next_page"}"#).unwrap();
        assert_eq!(
            d,
            AgentDirective::Navigate {
                command: NavigationCommand::NextPage,
                thought: Some("title page".into())
            }
        );
    }

    #[test]
    fn go_to_page_is_converted_to_zero_based() {
        let d = parse_directive(r#"{"action":"go_to_page","page":10}"#).unwrap();
        assert_eq!(d, nav(NavigationCommand::GoToPage(9)));

        let d = parse_directive(r#"{"action":"go_to_page","page_number":"3"}"#).unwrap();
        assert_eq!(d, nav(NavigationCommand::GoToPage(2)));

        let d = parse_directive(r#"{"action":"go_to_page","input":{"page":2}}"#).unwrap();
        assert_eq!(d, nav(NavigationCommand::GoToPage(1)));
    }

    #[test]
    fn page_zero_parses_to_negative_index() {
        let d = parse_directive(r#"{"action":"go_to_page","page":0}"#).unwrap();
        assert_eq!(d, nav(NavigationCommand::GoToPage(-1)));
    }

    #[test]
    fn fenced_json_with_prose() {
        let reply =
            "Sure.\n```json\n{\"action\": \"final_answer\", \"answer\": \"$5M\"}\n```\nDone.";
        let d = parse_directive(reply).unwrap();
        assert_eq!(
            d,
            AgentDirective::Final {
                answer: "$5M".into(),
                thought: None
            }
        );
    }

    #[test]
    fn json_embedded_in_prose() {
        let reply = r#"I'll move on. {"action": "previous_page"} ok"#;
        assert_eq!(
            parse_directive(reply).unwrap(),
            nav(NavigationCommand::PreviousPage)
        );
    }

    #[test]
    fn first_of_several_objects_wins() {
        let reply = r#"{"action": "next_page"} then {"action": "final_answer", "answer": "x"}"#;
        assert_eq!(
            parse_directive(reply).unwrap(),
            nav(NavigationCommand::NextPage)
        );

        let reply = "Plan: {step one}\n{\"action\": \"go_to_page\", \"page\": 4}\n{\"note\": 1}";
        assert_eq!(
            parse_directive(reply).unwrap(),
            nav(NavigationCommand::GoToPage(3))
        );
    }

    #[test]
    fn numeric_and_list_answers() {
        let d = parse_directive(r#"{"action":"final_answer","answer":1250}"#).unwrap();
        assert!(matches!(d, AgentDirective::Final { ref answer, .. } if answer == "1250"));

        let d = parse_directive(r#"{"action":"final_answer","answer":["Q1","Q4"]}"#).unwrap();
        assert!(matches!(d, AgentDirective::Final { ref answer, .. } if answer == "Q1, Q4"));
    }

    #[test]
    fn code_style_calls() {
        assert_eq!(
            parse_directive("Thought: go on\nnext_page()").unwrap(),
            nav(NavigationCommand::NextPage)
        );
        assert_eq!(
            parse_directive("go_to_page(page_number=15)").unwrap(),
            nav(NavigationCommand::GoToPage(14))
        );
        assert_eq!(
            parse_directive(r#"final_answer("30 days written notice")"#).unwrap(),
            AgentDirective::Final {
                answer: "30 days written notice".into(),
                thought: None
            }
        );
    }

    #[test]
    fn earliest_code_call_wins() {
        let reply = "previous_page()\nfinal_answer(\"x\")";
        assert_eq!(
            parse_directive(reply).unwrap(),
            nav(NavigationCommand::PreviousPage)
        );
    }

    #[test]
    fn unknown_action_is_reported() {
        let err = parse_directive(r#"{"action":"search","query":"x"}"#).unwrap_err();
        assert_eq!(err, DirectiveError::UnknownAction("search".into()));
    }

    #[test]
    fn missing_arguments_are_reported() {
        assert_eq!(
            parse_directive(r#"{"action":"go_to_page"}"#).unwrap_err(),
            DirectiveError::MissingArgument {
                action: "go_to_page",
                field: "page"
            }
        );
        assert!(matches!(
            parse_directive(r#"{"action":"go_to_page","page":"three"}"#).unwrap_err(),
            DirectiveError::InvalidPageArgument(_)
        ));
    }

    #[test]
    fn free_text_is_not_a_directive() {
        assert_eq!(
            parse_directive("I think the answer is on page 2.").unwrap_err(),
            DirectiveError::NoToolCall
        );
    }

    #[test]
    fn clean_answer_strips_wrapping() {
        assert_eq!(clean_answer("  \"$5M\"  "), "$5M");
        assert_eq!(clean_answer("```\n42\n```"), "42");
        assert_eq!(clean_answer("“30 days”"), "30 days");
        assert_eq!(clean_answer("1\u{200B},250"), "1,250");
        assert_eq!(clean_answer("\""), "\"");
    }
}
