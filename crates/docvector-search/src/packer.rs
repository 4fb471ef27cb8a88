//! Token-budgeted result packer (spec §4.10), ported from the original
//! implementation's `utils/token_utils.py` (`TokenLimiter`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::reranker::RankedResult;

/// Approximate tokens-per-word ratio used by the estimate-only counter
/// (spec §4.10: "words * 1.3"). An exact backend tokenizer can be plugged
/// in later behind the same `count_tokens` signature.
pub const TOKENS_PER_WORD: f32 = 1.3;

#[derive(Debug, Clone)]
pub struct PackedResult {
    pub id: uuid::Uuid,
    pub content: String,
    pub score: f32,
    pub truncated: bool,
}

pub struct TokenLimiter {
    tokens_per_word: f32,
}

impl Default for TokenLimiter {
    fn default() -> Self {
        Self { tokens_per_word: TOKENS_PER_WORD }
    }
}

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?])\s+").unwrap());

/// Splits on sentence-ending punctuation followed by whitespace, keeping
/// the punctuation attached to the preceding sentence (the `regex` crate
/// has no lookbehind, so this walks matches manually instead of the
/// Python original's `re.split(r'(?<=[.!?])\s+', text)`).
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last_end = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        let punct_end = m.start() + 1;
        sentences.push(text[last_end..punct_end].to_string());
        last_end = m.end();
    }
    if last_end < text.len() {
        sentences.push(text[last_end..].to_string());
    }
    sentences
}

impl TokenLimiter {
    pub fn new(tokens_per_word: f32) -> Self {
        Self { tokens_per_word }
    }

    /// Estimate token count for `text`: word count * ratio.
    pub fn count_tokens(&self, text: &str) -> usize {
        let words = text.split_whitespace().count();
        (words as f32 * self.tokens_per_word) as usize
    }

    /// Truncate `text` to fit `max_tokens`, preferring sentence boundaries
    /// (spec §4.10: "truncate to that budget on a sentence boundary").
    pub fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        if self.count_tokens(text) <= max_tokens {
            return text.to_string();
        }

        let mut truncated = String::new();
        let mut current_tokens = 0usize;
        for sentence in split_sentences(text) {
            let sentence = sentence.as_str();
            let sentence_tokens = self.count_tokens(sentence);
            if current_tokens + sentence_tokens <= max_tokens {
                if !truncated.is_empty() {
                    truncated.push(' ');
                }
                truncated.push_str(sentence);
                current_tokens += sentence_tokens;
            } else {
                break;
            }
        }
        truncated.trim().to_string()
    }

    /// Packs ranked results into `max_tokens`: each fits verbatim while
    /// budget remains; the first result that doesn't fit is truncated (if
    /// more than 50 tokens remain) and marked `truncated`, then packing
    /// stops (spec §4.10 + scenario 7).
    pub fn limit_results_to_tokens(&self, results: &[RankedResult], max_tokens: usize) -> Vec<PackedResult> {
        let mut packed = Vec::new();
        let mut used = 0usize;

        for result in results {
            let tokens = self.count_tokens(&result.content);
            if used + tokens <= max_tokens {
                packed.push(PackedResult {
                    id: result.id,
                    content: result.content.clone(),
                    score: result.final_score,
                    truncated: false,
                });
                used += tokens;
                continue;
            }

            let remaining = max_tokens.saturating_sub(used);
            if remaining > 50 {
                let truncated_content = self.truncate_to_tokens(&result.content, remaining);
                packed.push(PackedResult {
                    id: result.id,
                    content: truncated_content,
                    score: result.final_score,
                    truncated: true,
                });
            }
            break;
        }

        packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reranker::RankedResult;
    use std::collections::BTreeMap;

    fn fixture(content: &str, score: f32) -> RankedResult {
        RankedResult {
            id: uuid::Uuid::new_v4(),
            content: content.to_string(),
            vector_score: score,
            relevance_score: 0.0,
            code_quality_score: 0.0,
            formatting_score: 0.0,
            metadata_score: 0.0,
            initialization_score: 0.0,
            final_score: score,
            payload: BTreeMap::new(),
        }
    }

    #[test]
    fn counts_tokens_by_word_ratio() {
        let limiter = TokenLimiter::default();
        assert_eq!(limiter.count_tokens("one two three four five"), 6);
    }

    #[test]
    fn fits_everything_under_budget_verbatim() {
        let limiter = TokenLimiter::default();
        let results = vec![fixture("short content here", 1.0)];
        let packed = limiter.limit_results_to_tokens(&results, 1000);
        assert_eq!(packed.len(), 1);
        assert!(!packed[0].truncated);
    }

    #[test]
    fn ten_chunks_of_200_tokens_pack_to_two_full_plus_truncated() {
        // ~200 tokens ≈ 153 words at 1.3 tokens/word.
        let body = "word ".repeat(153);
        let results: Vec<RankedResult> = (0..10).map(|i| fixture(&body, 1.0 - i as f32 * 0.01)).collect();

        let limiter = TokenLimiter::default();
        let packed = limiter.limit_results_to_tokens(&results, 450);

        assert_eq!(packed.len(), 3);
        assert!(!packed[0].truncated);
        assert!(!packed[1].truncated);
        assert!(packed[2].truncated);

        let total: usize = packed.iter().map(|p| limiter.count_tokens(&p.content)).sum();
        assert!(total <= 450);
    }

    #[test]
    fn drops_remainder_smaller_than_fifty_tokens() {
        let limiter = TokenLimiter::default();
        let results = vec![fixture(&"word ".repeat(40), 1.0), fixture(&"word ".repeat(5), 1.0)];
        // First chunk uses ~52 tokens, leaving < 50 of a 60-token budget.
        let packed = limiter.limit_results_to_tokens(&results, 60);
        assert_eq!(packed.len(), 1);
    }
}
