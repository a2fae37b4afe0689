//! Relevance combiner.
//!
//! Runs the text and visual analyses concurrently, recovers per-modality
//! failures into degraded results, and merges both into one bounded score
//! with a confidence estimate.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::parser::parse_analysis;
use super::prompts;
use crate::error::{AnalyzeError, ModalityFailure};
use crate::gateway::ModelGateway;
use crate::models::{AnalyzeResult, DetailedAnalysis, Modality, ModalityAnalysis, PostContent, Score};

/// Weight of the text score in the combined score.
pub const TEXT_WEIGHT: f64 = 0.4;
/// Weight of the visual score in the combined score.
pub const VISUAL_WEIGHT: f64 = 0.6;

const TEXT_CONFIDENCE: f64 = 0.7;
const VISUAL_CONFIDENCE: f64 = 0.8;
const BASE_CONFIDENCE: f64 = 0.3;

const NO_CONTENT_REASONING: &str = "No content available for analysis";

/// Scores posts for topic relevance using a model gateway.
pub struct RelevanceAnalyzer {
    gateway: Arc<dyn ModelGateway>,
}

impl RelevanceAnalyzer {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    /// Analyze a post for relevance to `topic`.
    ///
    /// Modality failures degrade into zero-score results; only a failure of
    /// the orchestration itself is returned as an error.
    pub async fn analyze(
        &self,
        content: &PostContent,
        topic: &str,
    ) -> Result<AnalyzeResult, AnalyzeError> {
        let start_time = Instant::now();

        let text_task = {
            let gateway = Arc::clone(&self.gateway);
            let prompt = content
                .has_text()
                .then(|| prompts::text_prompt(content, topic));
            tokio::spawn(async move {
                match prompt {
                    Some(prompt) => {
                        let outcome = analyze_text(gateway.as_ref(), &prompt).await;
                        collapse(Modality::Text, outcome)
                    }
                    None => ModalityAnalysis::empty(Modality::Text),
                }
            })
        };

        let visual_task = {
            let gateway = Arc::clone(&self.gateway);
            let image_url = content.first_image_url().map(str::to_owned);
            let prompt = prompts::image_prompt(topic);
            if content.image_urls().len() > 1 {
                debug!(
                    "Post has {} images, analyzing only the first",
                    content.image_urls().len()
                );
            }
            tokio::spawn(async move {
                match image_url {
                    Some(url) => {
                        let outcome = analyze_image(gateway.as_ref(), &url, &prompt).await;
                        collapse(Modality::Visual, outcome)
                    }
                    None => ModalityAnalysis::empty(Modality::Visual),
                }
            })
        };

        let (text, visual) = futures::future::try_join(text_task, visual_task)
            .await
            .map_err(|e| {
                error!("Post analysis failed: {}", e);
                AnalyzeError::Orchestration(e.to_string())
            })?;

        let (relevance_score, confidence) = combine_scores(&text, &visual);
        let analysis = build_detailed_analysis(text, visual);
        let processing_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Analysis completed: score={}, confidence={:.2}, time={}ms",
            relevance_score, confidence, processing_time_ms
        );

        Ok(AnalyzeResult {
            relevance_score,
            confidence,
            analysis,
            processing_time_ms,
        })
    }
}

async fn analyze_text(
    gateway: &dyn ModelGateway,
    prompt: &str,
) -> Result<ModalityAnalysis, ModalityFailure> {
    let raw = gateway.analyze_text(prompt).await?;
    parse_reply(Modality::Text, &raw)
}

async fn analyze_image(
    gateway: &dyn ModelGateway,
    image_url: &str,
    prompt: &str,
) -> Result<ModalityAnalysis, ModalityFailure> {
    let raw = gateway.analyze_image(image_url, prompt).await?;
    parse_reply(Modality::Visual, &raw)
}

fn parse_reply(modality: Modality, raw: &str) -> Result<ModalityAnalysis, ModalityFailure> {
    parse_analysis(raw).map_err(|e| {
        let preview: String = raw.chars().take(100).collect();
        warn!(
            "Failed to parse {} analysis response ({}): {}...",
            modality, e, preview
        );
        ModalityFailure::from(e)
    })
}

/// Turn a modality failure into a degraded, zero-score analysis.
fn collapse(
    modality: Modality,
    outcome: Result<ModalityAnalysis, ModalityFailure>,
) -> ModalityAnalysis {
    match outcome {
        Ok(analysis) => analysis,
        Err(ModalityFailure::Parse(_)) => {
            ModalityAnalysis::degraded(modality.parse_failure_reasoning())
        }
        Err(ModalityFailure::Gateway(e)) => {
            error!("{} analysis failed: {}", modality.label(), e);
            ModalityAnalysis::degraded(modality.error_reasoning(&e.to_string()))
        }
    }
}

/// Weighted score and confidence from the two modality results.
///
/// A zero score counts as "no signal" for confidence, whether the modality
/// was absent, failed, or genuinely judged the post irrelevant.
pub fn combine_scores(text: &ModalityAnalysis, visual: &ModalityAnalysis) -> (Score, f64) {
    let weighted = f64::from(text.score.value()) * TEXT_WEIGHT
        + f64::from(visual.score.value()) * VISUAL_WEIGHT;
    let combined = Score::from_weighted(weighted);

    let mut factors = Vec::with_capacity(2);
    if text.score.is_positive() {
        factors.push(TEXT_CONFIDENCE);
    }
    if visual.score.is_positive() {
        factors.push(VISUAL_CONFIDENCE);
    }

    let confidence = if factors.is_empty() {
        BASE_CONFIDENCE
    } else {
        factors.iter().sum::<f64>() / 2.0
    };

    (combined, confidence.min(1.0))
}

/// Merge both analyses into the response breakdown.
pub fn build_detailed_analysis(
    text: ModalityAnalysis,
    visual: ModalityAnalysis,
) -> DetailedAnalysis {
    let mut reasoning_parts = Vec::with_capacity(2);
    if !text.is_placeholder(Modality::Text) {
        reasoning_parts.push(format!("{}: {}", Modality::Text.label(), text.reasoning));
    }
    if !visual.is_placeholder(Modality::Visual) {
        reasoning_parts.push(format!("{}: {}", Modality::Visual.label(), visual.reasoning));
    }

    let reasoning = if reasoning_parts.is_empty() {
        NO_CONTENT_REASONING.to_string()
    } else {
        reasoning_parts.join(" | ")
    };

    let mut detected_elements = text.detected_elements;
    detected_elements.extend(visual.detected_elements);

    DetailedAnalysis {
        text_score: text.score,
        visual_score: visual.score,
        reasoning,
        detected_elements,
    }
}
