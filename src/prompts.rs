//! Prompts for the page-navigation agent and the evaluation judge.
//!
//! Every prompt lives here, so that:
//!
//! 1. **Single source of truth**: the tool protocol the parser in
//!    [`crate::agent::directive`] accepts is described in exactly one place.
//!
//! 2. **Testability**: unit tests can inspect prompts and observation strings
//!    without a live model.

/// System prompt for the navigation agent.
///
/// Describes the three navigation tools plus `final_answer`, and the JSON
/// reply format. Page numbers are 1-based everywhere the model can see them.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are an expert assistant for visual question answering over PDF documents.
You are shown one page of a document at a time, as an image. You can move through the document with tools, and you must answer the user's question from what you see on the pages.

TOOLS
- next_page: show the next page.
- previous_page: show the previous page.
- go_to_page: show a specific page. Takes "page", a 1-based page number.
- final_answer: finish with an answer. Takes "answer", a short string.

REPLY FORMAT
Reply with exactly one JSON object and nothing else:
{"thought": "<your reasoning>", "action": "<tool name>", "page": <number, only for go_to_page>, "answer": "<only for final_answer>"}

EXAMPLES
Task: "Find the total number of employees mentioned in the company report."
{"thought": "Page 1 is the title page with no employee data. I will check the next page.", "action": "next_page"}
Observation: Switched to page 2 of 12.
{"thought": "Page 2 says 'Our workforce has grown to 1,250 full-time employees as of December 2023.'", "action": "final_answer", "answer": "1,250 full-time employees"}

Task: "Find the contract termination clause in this legal document."
{"thought": "Page 1 is the cover page. The table of contents is probably next.", "action": "next_page"}
Observation: Switched to page 2 of 14.
{"thought": "The table of contents lists 'Termination' on page 10.", "action": "go_to_page", "page": 10}
Observation: Switched to page 10 of 14.
{"thought": "Page 10 says 'Either party may terminate this agreement with thirty (30) days written notice.'", "action": "final_answer", "answer": "30 days written notice"}

RULES
1. Always reply with a single JSON object in the format above.
2. Examine every page image carefully before deciding where to go next.
3. Use a table of contents or index when one is visible to jump directly with go_to_page.
4. Only older page images are removed from view; re-open a page if you need to look at it again.
5. Call final_answer as soon as you have found the answer. The page you are on when you answer is reported as the source, so answer while the supporting page is shown.
6. Answer with the exact value from the document (numbers, dates, names), without extra commentary.
7. Don't give up. If the answer is not on the current page, keep navigating.

Now begin!"#;

/// System prompt for the evaluation judge.
///
/// The first line of the reply must be the verdict word; a one-sentence
/// rationale may follow on the next line.
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are an expert evaluator for question-answering systems.

Your task is to compare a predicted answer with the expected answer and determine if they are semantically equivalent.

Consider these factors:
- Exact matches are always correct
- Different formatting of the same information should be considered correct (e.g., "978,35 EUR" vs "978.35 EUR")
- Minor variations in date formats should be considered correct (e.g., "04.10.2018" vs "4.10.2018")
- Semantic equivalence matters more than exact string matching
- Partial answers that contain the key information should be considered correct
- If the predicted answer contains "No answer in page" or similar, it should be considered incorrect unless the expected answer also indicates no answer

Respond with exactly one word on the first line: either "correct" or "incorrect".
On the second line, give a one-sentence rationale."#;

/// Maximum characters of extracted page text quoted in one observation.
pub const MAX_PAGE_TEXT_CHARS: usize = 4000;

/// First user turn: the question plus the opening page.
pub fn task_message(question: &str, total_pages: usize) -> String {
    format!(
        "Task: \"{}\"\n\nThe document has {} page{}. You are on page 1; its image is attached.",
        question.trim(),
        total_pages,
        if total_pages == 1 { "" } else { "s" }
    )
}

/// Observation after a navigation that landed on `page` (0-based).
pub fn switched_observation(page: usize, total: usize, text: Option<&str>) -> String {
    let mut obs = format!("Observation: Switched to page {} of {}.", page + 1, total);
    if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
        obs.push_str("\nExtracted text of this page:\n");
        obs.push_str(&truncate_chars(text, MAX_PAGE_TEXT_CHARS));
    }
    obs
}

/// Observation for a relative move that hit the first or last page.
pub fn boundary_observation(page: usize, total: usize, at_end: bool) -> String {
    if at_end {
        format!(
            "Observation: Already on the last page ({} of {}). There is no next page.",
            page + 1,
            total
        )
    } else {
        format!(
            "Observation: Already on the first page (1 of {}). There is no previous page.",
            total
        )
    }
}

/// Observation for a `go_to_page` outside the document.
pub fn invalid_page_observation(requested_one_based: i64, total: usize, current: usize) -> String {
    format!(
        "Observation: Page {} does not exist. Valid pages are 1 to {}. You are still on page {}.",
        requested_one_based,
        total,
        current + 1
    )
}

/// Observation after a reply that could not be parsed as a tool call.
pub fn parse_error_observation(detail: &str) -> String {
    format!(
        "Observation: Your reply could not be understood ({detail}). \
Reply with one JSON object such as {{\"thought\": \"...\", \"action\": \"next_page\"}} \
or {{\"thought\": \"...\", \"action\": \"final_answer\", \"answer\": \"...\"}}."
    )
}

/// Placeholder for a page observation whose image has left the window.
pub fn image_evicted_placeholder(page: usize) -> String {
    format!("[image of page {} no longer shown]", page + 1)
}

/// User turn for the judge model.
pub fn judge_message(question: &str, expected: &str, predicted: &str) -> String {
    format!(
        "Question: {question}\n\nExpected Answer: {expected}\n\nPredicted Answer: {predicted}\n\n\
Are these answers semantically equivalent?"
    )
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte, _)) => format!("{}…", &s[..byte]),
        None => s.to_string(),
    }
}
