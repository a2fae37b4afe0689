//! Prompt builders for the two analysis modalities.

use crate::models::PostContent;

/// Render the caption and hashtags the way the text prompt presents them.
pub fn text_content(content: &PostContent) -> String {
    let mut parts = Vec::new();

    if let Some(caption) = content.caption() {
        parts.push(format!("Caption: {}", caption));
    }
    if !content.hashtags().is_empty() {
        parts.push(format!("Hashtags: {}", content.hashtags().join(", ")));
    }

    parts.join("\n")
}

/// Prompt asking for the relevance of the post text to `topic`.
pub fn text_prompt(content: &PostContent, topic: &str) -> String {
    format!(
        r#"Analyze this social media post text for relevance to the topic: '{topic}'.
- Identify direct mentions, context, and related elements for the topic.
- Consider context, activities, and any product or event mentions related to the topic.
Text to analyze:
{text}
Respond with JSON in this exact format:
{{
    "score": <integer 0-100>,
    "detected_elements": [<list of specific elements found>],
    "reasoning": "<explanation of score>"
}}"#,
        topic = topic,
        text = text_content(content),
    )
}

/// Prompt asking for the relevance of a single image to `topic`.
pub fn image_prompt(topic: &str) -> String {
    format!(
        r#"Analyze this image for relevance to the topic: '{topic}'.
- Identify people, objects, or scenes related to the topic.
- Consider context, activities, and any product or event mentions related to the topic.
Respond with JSON in this exact format:
{{
    "score": <integer 0-100>,
    "detected_elements": [<list of specific visual elements found>],
    "reasoning": "<explanation of what you see and why you gave this score>"
}}"#,
        topic = topic,
    )
}
