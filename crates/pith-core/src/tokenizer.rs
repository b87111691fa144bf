//! Token and word estimation.
//!
//! The whole pipeline budgets text by an estimate of `ceil(chars / 4)`
//! tokens, which is close enough for chunk sizing without a model-specific
//! tokenizer. Word counts are whitespace splits; compression ratios use the
//! same definition on both sides.

/// Estimate the token count of `text` as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    chars.div_ceil(4)
}

/// Count whitespace-separated words.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
