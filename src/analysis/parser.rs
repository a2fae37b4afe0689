//! Response parsing.
//!
//! The model is asked for `{score, detected_elements, reasoning}` JSON but
//! replies with free text. Replies are often wrapped in a markdown code
//! fence and are sometimes truncated or otherwise malformed.

use serde::Deserialize;
use serde_json::Number;

use crate::error::ParseError;
use crate::models::{ModalityAnalysis, Score};

/// Shape the model is asked to reply with.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    score: Number,
    #[serde(default)]
    detected_elements: Vec<String>,
    reasoning: String,
}

/// Remove a surrounding markdown code fence, if any, and trim whitespace.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Decode a model reply into a validated analysis.
pub fn parse_analysis(raw: &str) -> Result<ModalityAnalysis, ParseError> {
    let raw: RawAnalysis = serde_json::from_str(strip_code_fence(raw))?;

    let score = score_from_number(&raw.score)?;

    if raw.reasoning.trim().is_empty() {
        return Err(ParseError::EmptyReasoning);
    }

    Ok(ModalityAnalysis {
        score,
        detected_elements: raw.detected_elements,
        reasoning: raw.reasoning,
    })
}

/// Accept integers in range, and floats only when they are whole numbers.
fn score_from_number(number: &Number) -> Result<Score, ParseError> {
    let value = if let Some(value) = number.as_i64() {
        value
    } else if number.is_u64() {
        return Err(ParseError::ScoreOutOfRange(number.to_string()));
    } else {
        match number.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => {
                if f < i64::MIN as f64 || f > i64::MAX as f64 {
                    return Err(ParseError::ScoreOutOfRange(number.to_string()));
                }
                f as i64
            }
            _ => return Err(ParseError::ScoreNotInteger(number.to_string())),
        }
    };

    Score::new(value).ok_or_else(|| ParseError::ScoreOutOfRange(number.to_string()))
}
