//! Data models for the relevance scorer.
//!
//! This module contains the request/response contract and the
//! intermediate analysis records passed between the parser and
//! the combiner. Everything here lives for a single request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A relevance score, always within `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    /// Lowest possible score.
    pub const MIN: Score = Score(0);
    /// Highest possible score.
    pub const MAX: Score = Score(100);

    /// Build a score, rejecting anything outside `0..=100`.
    pub fn new(value: i64) -> Option<Self> {
        if (0..=100).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Build a score from a weighted sum, flooring and clamping into range.
    pub fn from_weighted(value: f64) -> Self {
        Self(value.floor().clamp(0.0, f64::from(Self::MAX.0)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two independent analysis channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Caption and hashtags.
    Text,
    /// The first attached image.
    Visual,
}

impl Modality {
    /// Reasoning used when the post carries nothing for this modality.
    pub fn placeholder_reasoning(&self) -> &'static str {
        match self {
            Modality::Text => "No text content provided for analysis",
            Modality::Visual => "No images provided for analysis",
        }
    }

    /// Reasoning used when the model reply could not be decoded.
    pub fn parse_failure_reasoning(&self) -> &'static str {
        match self {
            Modality::Text => "Failed to parse analysis response",
            Modality::Visual => "Failed to parse image analysis response",
        }
    }

    /// Reasoning used when the model call itself failed.
    pub fn error_reasoning(&self, cause: &str) -> String {
        match self {
            Modality::Text => format!("Analysis error: {}", cause),
            Modality::Visual => format!("Image analysis error: {}", cause),
        }
    }

    /// Prefix used in the combined reasoning string.
    pub fn label(&self) -> &'static str {
        match self {
            Modality::Text => "Text",
            Modality::Visual => "Visual",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Visual => write!(f, "visual"),
        }
    }
}

/// Content of the social media post being scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostContent {
    /// Post caption text.
    #[serde(default)]
    pub caption: Option<String>,
    /// Hashtags attached to the post, in post order.
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
    /// Image URLs attached to the post, in post order.
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
}

impl PostContent {
    /// Caption, if present and non-empty.
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref().filter(|c| !c.is_empty())
    }

    /// Hashtags, empty when absent.
    pub fn hashtags(&self) -> &[String] {
        self.hashtags.as_deref().unwrap_or(&[])
    }

    /// Image URLs, empty when absent.
    pub fn image_urls(&self) -> &[String] {
        self.image_urls.as_deref().unwrap_or(&[])
    }

    /// Whether there is anything for the text modality to look at.
    pub fn has_text(&self) -> bool {
        self.caption().is_some() || !self.hashtags().is_empty()
    }

    /// Only the first image is analyzed; multi-image posts are not aggregated.
    pub fn first_image_url(&self) -> Option<&str> {
        self.image_urls().first().map(String::as_str)
    }
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Post content to analyze.
    pub content: PostContent,
    /// Topic to score against. Falls back to the configured default.
    #[serde(default)]
    pub topic: Option<String>,
}

impl AnalyzeRequest {
    /// Returns the requested topic, or `default` when missing or blank.
    pub fn topic_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic,
            _ => default,
        }
    }
}

/// Parsed result of a single modality analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalityAnalysis {
    pub score: Score,
    pub detected_elements: Vec<String>,
    /// Never empty; carries a diagnostic when the analysis degraded.
    pub reasoning: String,
}

impl ModalityAnalysis {
    /// Placeholder used when the post has no input for `modality`.
    pub fn empty(modality: Modality) -> Self {
        Self::degraded(modality.placeholder_reasoning())
    }

    /// Zero-score result carrying a diagnostic reasoning.
    pub fn degraded(reasoning: impl Into<String>) -> Self {
        Self {
            score: Score::MIN,
            detected_elements: Vec::new(),
            reasoning: reasoning.into(),
        }
    }

    /// Whether this is the "no content provided" placeholder for `modality`.
    pub fn is_placeholder(&self, modality: Modality) -> bool {
        self.reasoning == modality.placeholder_reasoning()
    }
}

/// Breakdown of how the combined score was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedAnalysis {
    pub text_score: Score,
    pub visual_score: Score,
    pub reasoning: String,
    /// Text elements followed by visual elements, duplicates kept.
    pub detected_elements: Vec<String>,
}

/// Final outcome of scoring a post. Serialized as the `/analyze` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeResult {
    pub relevance_score: Score,
    /// Within `0.0..=1.0`.
    pub confidence: f64,
    pub analysis: DetailedAnalysis,
    pub processing_time_ms: u64,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub openai_status: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: BTreeMap<String, String>,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
