//! Relevance analysis.
//!
//! Prompt construction, model reply parsing, and the combiner that
//! turns two modality results into a single relevance score.

pub mod combiner;
pub mod parser;
pub mod prompts;

pub use combiner::RelevanceAnalyzer;
