//! Multi-stage reranker (spec §4.10), ported from the original
//! implementation's `search/reranker.py` (`MultiStageReranker`): five
//! additive scoring metrics blended with the vector similarity score.

use std::collections::BTreeMap;

use docvector_storage::vector::{Payload, ScoredPayload};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

/// Default per-metric weights (spec §4.10), normalised to sum to 1 in
/// [`RerankWeights::normalized`].
#[derive(Debug, Clone, Copy)]
pub struct RerankWeights {
    pub relevance: f32,
    pub code_quality: f32,
    pub formatting: f32,
    pub metadata: f32,
    pub initialization: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            relevance: 0.35,
            code_quality: 0.25,
            formatting: 0.15,
            metadata: 0.10,
            initialization: 0.15,
        }
    }
}

impl RerankWeights {
    fn normalized(self) -> Self {
        let total = self.relevance + self.code_quality + self.formatting + self.metadata + self.initialization;
        if total <= 0.0 {
            return Self::default().normalized();
        }
        Self {
            relevance: self.relevance / total,
            code_quality: self.code_quality / total,
            formatting: self.formatting / total,
            metadata: self.metadata / total,
            initialization: self.initialization / total,
        }
    }
}

/// The 0.7/0.3 reranked/vector blend ratio (spec §4.10), named as a
/// constant per spec §9's "exposed here as a constant and flagged for
/// configurability" resolution.
pub const RERANKED_BLEND: f32 = 0.7;
pub const VECTOR_BLEND: f32 = 0.3;

/// One reranked search result.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub id: uuid::Uuid,
    pub content: String,
    pub vector_score: f32,
    pub relevance_score: f32,
    pub code_quality_score: f32,
    pub formatting_score: f32,
    pub metadata_score: f32,
    pub initialization_score: f32,
    pub final_score: f32,
    pub payload: Payload,
}

/// Reranks `results` for `query`: five per-metric scores — read from the
/// payload when present, else computed on the fly — blended with the
/// original vector score, sorted by descending final score.
pub fn rerank(query: &str, results: Vec<ScoredPayload>, weights: RerankWeights) -> Vec<RankedResult> {
    let weights = weights.normalized();

    let mut ranked: Vec<RankedResult> = results
        .into_iter()
        .map(|result| {
            let content = payload_str(&result.payload, "content").unwrap_or_default();

            let (relevance, code_quality, formatting, metadata, initialization) =
                stored_scores(&result.payload).unwrap_or_else(|| {
                    (
                        compute_relevance_score(query, &content),
                        compute_code_quality_score(&content),
                        compute_formatting_score(&content),
                        compute_metadata_score(&result.payload),
                        compute_initialization_score(&content, query),
                    )
                });

            let blended = relevance * weights.relevance
                + code_quality * weights.code_quality
                + formatting * weights.formatting
                + metadata * weights.metadata
                + initialization * weights.initialization;
            let final_score = RERANKED_BLEND * blended + VECTOR_BLEND * result.score;

            RankedResult {
                id: result.id,
                content,
                vector_score: result.score,
                relevance_score: relevance,
                code_quality_score: code_quality,
                formatting_score: formatting,
                metadata_score: metadata,
                initialization_score: initialization,
                final_score,
                payload: result.payload,
            }
        })
        .collect();

    // Stable sort: when every metric ties, ordering falls back to the
    // original (vector-score) order (spec §8 testable property).
    ranked.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

fn stored_scores(payload: &Payload) -> Option<(f32, f32, f32, f32, f32)> {
    let relevance = payload_f32(payload, "relevance_score")?;
    let code_quality = payload_f32(payload, "code_quality_score")?;
    let formatting = payload_f32(payload, "formatting_score")?;
    let metadata = payload_f32(payload, "metadata_score")?;
    let initialization = payload_f32(payload, "initialization_score")?;
    Some((relevance, code_quality, formatting, metadata, initialization))
}

fn payload_str(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn payload_f32(payload: &Payload, key: &str) -> Option<f32> {
    payload.get(key).and_then(JsonValue::as_f64).map(|v| v as f32)
}

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Exact phrase match +0.4; Jaccard of word sets weighted 0.3; per-term
/// frequency bonus `min(0.1 * count/10, 0.3)` for terms >= 3 chars;
/// capped at 1.0 (spec §4.10).
fn compute_relevance_score(query: &str, content: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();

    let mut score = 0.0f32;
    if content_lower.contains(&query_lower) {
        score += 0.4;
    }

    let query_words: std::collections::HashSet<&str> =
        WORD_PATTERN.find_iter(&query_lower).map(|m| m.as_str()).collect();
    let content_words: std::collections::HashSet<&str> =
        WORD_PATTERN.find_iter(&content_lower).map(|m| m.as_str()).collect();
    if !query_words.is_empty() {
        let overlap = query_words.intersection(&content_words).count() as f32 / query_words.len() as f32;
        score += 0.3 * overlap;
    }

    for term in query_lower.split_whitespace() {
        if term.chars().count() < 3 {
            continue;
        }
        let count = content_lower.matches(term).count();
        if count > 0 {
            score += (0.1 * (count as f32 / 10.0)).min(0.3);
        }
    }

    score.min(1.0)
}

static IMPORT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(?:import|from|require|include|using)\s+").unwrap());
static DECL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:def|function|fn|func|class|public|private)\s+").unwrap());
static COMMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?://|#|/\*|"""|''')"#).unwrap());
static STRUCTURE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{}\[\]()\;]").unwrap());
static CODE_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```|<code>|<pre>").unwrap());
static HEADING_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+\w+").unwrap());
static OPERATOR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[=<>!+\-*/]+").unwrap());
static MAIN_GUARD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"if\s+__name__\s*==\s*['"]__main__['"]"#).unwrap());
static INSTANTIATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"new\s+\w+|=\s*\w+\(").unwrap());
static KEYWORD_DECL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:if|for|while|return|import)\s+").unwrap());
static DECL_LOOSE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:def|function|class|var|let|const)\s+\w+").unwrap());

fn looks_like_code(content: &str) -> bool {
    let indicators: [&Lazy<Regex>; 4] =
        [&STRUCTURE_PATTERN, &DECL_LOOSE_PATTERN, &KEYWORD_DECL_PATTERN, &OPERATOR_PATTERN];
    indicators.iter().filter(|pattern| pattern.is_match(content)).count() >= 2
}

/// Mirrors spec §4.5's `code_quality` heuristic (the reranker's on-the-fly
/// fallback reuses the same signal weights as the code extractor).
fn compute_code_quality_score(content: &str) -> f32 {
    if !CODE_BLOCK_PATTERN.is_match(content) && !looks_like_code(content) {
        return 0.0;
    }

    let mut score = 0.0f32;
    if IMPORT_PATTERN.is_match(content) {
        score += 0.2;
    }
    if DECL_PATTERN.is_match(content) {
        score += 0.2;
    }
    if COMMENT_PATTERN.is_match(content) {
        score += 0.2;
    }
    let line_count = content.lines().count();
    if (5..=50).contains(&line_count) {
        score += 0.2;
    } else if line_count > 50 {
        score += 0.1;
    }
    if STRUCTURE_PATTERN.is_match(content) {
        score += 0.2;
    }
    score.min(1.0)
}

fn compute_formatting_score(content: &str) -> f32 {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut score = 0.0f32;

    if (3..=100).contains(&lines.len()) {
        score += 0.3;
    }
    if HEADING_PATTERN.is_match(content) {
        score += 0.2;
    }
    if content.contains("\n\n") {
        score += 0.2;
    }
    let max_line_length = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    if max_line_length <= 100 {
        score += 0.3;
    } else if max_line_length <= 120 {
        score += 0.2;
    }

    score.min(1.0)
}

fn compute_metadata_score(payload: &Payload) -> f32 {
    let mut score = 0.0f32;
    if payload_str(payload, "title").is_some() {
        score += 0.2;
    }
    if payload_str(payload, "language").is_some() || payload_str(payload, "code_language").is_some() {
        score += 0.2;
    }
    if payload.get("topics").map(|v| !v.as_array().map(Vec::is_empty).unwrap_or(true)).unwrap_or(false) {
        score += 0.3;
    }
    if payload_str(payload, "enrichment").is_some() {
        score += 0.3;
    }
    score.min(1.0)
}

const GETTING_STARTED_TERMS: &[&str] = &[
    "install", "setup", "start", "begin", "initialize", "init", "example", "basic", "simple",
    "quick", "tutorial",
];
const INIT_CONTENT_KEYWORDS: &[&str] =
    &["install", "setup", "initialize", "getting started", "quick start", "example", "usage"];

fn compute_initialization_score(content: &str, query: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();
    let mut score = 0.0f32;

    if GETTING_STARTED_TERMS.iter().any(|term| query_lower.contains(term)) {
        score += 0.2;
    }
    if INIT_CONTENT_KEYWORDS.iter().any(|keyword| content_lower.contains(keyword)) {
        score += 0.2;
    }
    if MAIN_GUARD_PATTERN.is_match(content) {
        score += 0.2;
    }
    if INSTANTIATION_PATTERN.is_match(content) {
        score += 0.2;
    }
    if IMPORT_PATTERN.is_match(content) {
        score += 0.2;
    }

    score.min(1.0)
}

/// Builds a `ScoredPayload` for tests without requiring a live vector index.
#[cfg(test)]
pub(crate) fn fixture_payload(
    content: &str,
    score: f32,
    extra: &[(&str, JsonValue)],
) -> ScoredPayload {
    let mut payload: Payload = BTreeMap::new();
    payload.insert("content".to_string(), JsonValue::String(content.to_string()));
    for (k, v) in extra {
        payload.insert((*k).to_string(), v.clone());
    }
    ScoredPayload { id: uuid::Uuid::new_v4(), score, payload }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_phrase_boosts_relevance() {
        let with_phrase = compute_relevance_score("quick start", "this is a quick start guide");
        let without = compute_relevance_score("quick start", "unrelated content entirely");
        assert!(with_phrase > without);
    }

    #[test]
    fn code_quality_requires_code_signal() {
        assert_eq!(compute_code_quality_score("just some plain prose here"), 0.0);
    }

    #[test]
    fn code_quality_rewards_imports_and_structure() {
        let content = "import os\n\ndef main():\n    # comment\n    print(os.getcwd())\n";
        assert!(compute_code_quality_score(content) > 0.5);
    }

    #[test]
    fn stored_scores_are_preferred_over_recomputation() {
        let payload = fixture_payload(
            "irrelevant body",
            0.5,
            &[
                ("relevance_score", JsonValue::from(0.9)),
                ("code_quality_score", JsonValue::from(0.9)),
                ("formatting_score", JsonValue::from(0.9)),
                ("metadata_score", JsonValue::from(0.9)),
                ("initialization_score", JsonValue::from(0.9)),
            ],
        );
        let ranked = rerank("query", vec![payload], RerankWeights::default());
        assert!((ranked[0].relevance_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn equal_metric_scores_fall_back_to_vector_order() {
        let a = fixture_payload(
            "same",
            0.9,
            &[
                ("relevance_score", JsonValue::from(0.5)),
                ("code_quality_score", JsonValue::from(0.5)),
                ("formatting_score", JsonValue::from(0.5)),
                ("metadata_score", JsonValue::from(0.5)),
                ("initialization_score", JsonValue::from(0.5)),
            ],
        );
        let mut b = fixture_payload(
            "same",
            0.1,
            &[
                ("relevance_score", JsonValue::from(0.5)),
                ("code_quality_score", JsonValue::from(0.5)),
                ("formatting_score", JsonValue::from(0.5)),
                ("metadata_score", JsonValue::from(0.5)),
                ("initialization_score", JsonValue::from(0.5)),
            ],
        );
        b.id = uuid::Uuid::new_v4();
        let ranked = rerank("q", vec![a.clone(), b], RerankWeights::default());
        assert_eq!(ranked[0].id, a.id);
    }

    #[test]
    fn weights_normalize_even_when_caller_passes_unnormalized_values() {
        let weights = RerankWeights {
            relevance: 1.0,
            code_quality: 1.0,
            formatting: 1.0,
            metadata: 1.0,
            initialization: 1.0,
        }
        .normalized();
        let total = weights.relevance
            + weights.code_quality
            + weights.formatting
            + weights.metadata
            + weights.initialization;
        assert!((total - 1.0).abs() < 1e-5);
    }
}
