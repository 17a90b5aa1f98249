//! Prompt construction for extraction and synthesis calls.
//!
//! Prompts instruct the model to answer with pure JSON, but nothing
//! downstream relies on that being honored: the stream decoder tolerates
//! prose and fences around the objects regardless.

use crate::models::{CategoryRawText, CategoryResult};

/// System prompt for the four per-category extraction calls.
pub const CATEGORY_SYSTEM_PROMPT: &str = "You are an expert film content analyst. \
You turn crowd-sourced parental-advisory text into precise, structured assessments. \
You never invent events that are not supported by the provided text.";

/// System prompt for the verdict synthesis call.
pub const VERDICT_SYSTEM_PROMPT: &str = "You are an expert parental-guide evaluator. \
You weigh per-category assessments of a film or show and produce one overall \
recommendation for parents.";

/// Build the extraction prompt for one category.
pub fn build_category_prompt(raw: &CategoryRawText) -> String {
    let label = raw.category.label();
    let source_note = if raw.is_degraded {
        "NOTE: the real advisory text could not be fetched; the text below is a \
         fallback placeholder and may be empty or meaningless."
    } else {
        "The text below was scraped from the advisory source site."
    };

    format!(
        "Analyze the following raw parental-advisory text for the \"{label}\" dimension.\n\
         {source_note}\n\
         \n\
         RULES:\n\
         1. Determine `level` (exactly one of: None, Mild, Moderate, Severe) and an \
         integer `score` from 1 (nothing of note) to 10 (extreme).\n\
         2. `quotes` must be exact verbatim excerpts from the raw text that justify \
         the score. Keep quotes precise.\n\
         3. Write a brief `summary` of this dimension.\n\
         4. Set `confidence` to a number from 0.0 to 1.0 for your confidence in the \
         assessment.\n\
         5. If the text is shorter than 10 characters or effectively meaningless, \
         force `level` to \"Unknown\", `score` to 1, `summary` to \"data missing\", \
         and leave `quotes` empty. Do not guess.\n\
         6. Respond with a single JSON object with keys level, score, summary, \
         quotes, confidence. NO markdown, NO explanation, ONLY the JSON object.\n\
         \n\
         RAW TEXT:\n\
         {text}",
        text = raw.text,
    )
}

/// Build the synthesis prompt from the successful category results.
///
/// Category results are embedded as compact JSON keyed by the snake_case
/// category name. Only successful categories appear; the model is told
/// when coverage is partial.
pub fn build_verdict_prompt(results: &[CategoryResult]) -> String {
    let mut seed = serde_json::Map::new();
    for result in results {
        seed.insert(
            result.category.as_str().to_string(),
            serde_json::json!({
                "level": result.level,
                "score": result.score,
                "summary": result.summary,
                "quotes": result.quotes,
            }),
        );
    }
    let seed = serde_json::Value::Object(seed).to_string();

    let coverage_note = if results.len() < crate::models::Category::ALL.len() {
        "\nNOTE: some dimensions failed to extract and are absent; weigh only what is present.\n"
    } else {
        ""
    };

    format!(
        "Below are the assessed dimensions for one film or show.\n\
         {coverage_note}\
         \n\
         {seed}\n\
         \n\
         RULES:\n\
         1. Write `rationale`: a short overall analysis across the dimensions.\n\
         2. Write `recommendation`: one final, brief recommendation for parents.\n\
         3. Write `context_tags`: 3 to 5 short phrases suitable for UI badges \
         (for example \"graphic violence\", \"mild language\", \"family friendly\").\n\
         4. Respond with a single JSON object with keys recommendation, rationale, \
         context_tags. NO markdown, NO explanation, ONLY the JSON object.",
    )
}
