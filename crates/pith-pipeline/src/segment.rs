//! Token-budgeted text chunker for the claims pipeline.
//!
//! Splits cleaned book text into chunks of roughly `min_tokens..max_tokens`
//! estimated tokens, preferring paragraph boundaries, falling back to
//! sentence boundaries for oversized paragraphs, and emitting early on
//! natural break phrases once a chunk is inside the acceptable window.
//! A trailing undersized chunk merges backward when the result stays within
//! `CHUNK_MERGE_SLACK × max_tokens`.

use regex::Regex;

use pith_core::defaults::{
    CHUNK_BREAK_PHRASES, CHUNK_MAX_TOKENS, CHUNK_MERGE_SLACK, CHUNK_MIN_TOKENS,
};
use pith_core::estimate_tokens;

/// Chunker bounds in estimated tokens.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub min_tokens: usize,
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_tokens: CHUNK_MIN_TOKENS,
            max_tokens: CHUNK_MAX_TOKENS,
        }
    }
}

/// One emitted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub token_count: usize,
}

impl TextChunk {
    fn new(text: String) -> Self {
        let token_count = estimate_tokens(&text);
        Self { text, token_count }
    }
}

/// Chunk `text` under the given bounds.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<TextChunk> {
    let units = split_units(text, config.max_tokens);
    if units.is_empty() {
        return Vec::new();
    }

    let slack_limit = (config.max_tokens as f64 * CHUNK_MERGE_SLACK) as usize;
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current = String::new();

    for unit in units {
        let unit_tokens = estimate_tokens(&unit);
        let current_tokens = estimate_tokens(&current);

        if !current.is_empty() && current_tokens + unit_tokens > config.max_tokens {
            if current_tokens >= config.min_tokens {
                chunks.push(TextChunk::new(std::mem::take(&mut current)));
            } else if current_tokens + unit_tokens > slack_limit {
                // Undersized, but appending would blow the hard cap.
                chunks.push(TextChunk::new(std::mem::take(&mut current)));
            }
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&unit);

        let tokens_now = estimate_tokens(&current);
        if tokens_now >= config.min_tokens
            && tokens_now <= config.max_tokens
            && has_break_phrase(&unit)
        {
            chunks.push(TextChunk::new(std::mem::take(&mut current)));
        }
    }

    if !current.is_empty() {
        let tail = TextChunk::new(current);
        if tail.token_count < config.min_tokens {
            if let Some(prev) = chunks.last_mut() {
                let merged = format!("{}\n\n{}", prev.text, tail.text);
                if estimate_tokens(&merged) <= slack_limit {
                    *prev = TextChunk::new(merged);
                } else {
                    chunks.push(tail);
                }
            } else {
                chunks.push(tail);
            }
        } else {
            chunks.push(tail);
        }
    }

    chunks
}

/// Split text into packable units: paragraphs, with oversized paragraphs
/// sentence-split and degenerate run-on sentences hard-split.
fn split_units(text: &str, max_tokens: usize) -> Vec<String> {
    let paragraph_re = Regex::new(r"\n{2,}").expect("static regex");
    let mut units = Vec::new();

    for paragraph in paragraph_re.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if estimate_tokens(paragraph) <= max_tokens {
            units.push(paragraph.to_string());
            continue;
        }
        for sentence in split_sentences(paragraph) {
            if estimate_tokens(&sentence) <= max_tokens {
                units.push(sentence);
            } else {
                units.extend(hard_split(&sentence, max_tokens));
            }
        }
    }

    units
}

/// Split on sentence-ending punctuation followed by whitespace and an
/// uppercase letter. English-biased; other scripts just yield larger units.
fn split_sentences(text: &str) -> Vec<String> {
    let boundary_re = Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("static regex");
    let mut sentences = Vec::new();
    let mut last = 0;

    for mat in boundary_re.find_iter(text) {
        let next_is_upper = text[mat.end()..]
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false);
        if next_is_upper {
            let sentence = text[last..mat.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            last = mat.end();
        }
    }

    let tail = text[last..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Split a boundary-free run of text into pieces of at most `max_tokens`,
/// cutting at whitespace where possible and always at a char boundary.
fn hard_split(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * 4;
    let mut pieces = Vec::new();
    let mut rest = text;

    while estimate_tokens(rest) > max_tokens {
        let mut cut = max_chars.min(rest.len());
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let cut = rest[..cut]
            .rfind(char::is_whitespace)
            .filter(|&i| i > 0)
            .unwrap_or(cut);
        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn has_break_phrase(unit: &str) -> bool {
    let lowered = unit.to_lowercase();
    CHUNK_BREAK_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse_ws(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// A paragraph of roughly `tokens` estimated tokens.
    fn paragraph(tokens: usize, seed: usize) -> String {
        let word = format!("word{} ", seed);
        let mut out = String::new();
        while estimate_tokens(&out) < tokens {
            out.push_str(&word);
        }
        out.trim_end().to_string()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", &ChunkerConfig::default()).is_empty());
        assert!(chunk_text("\n\n\n", &ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn short_text_yields_single_undersized_chunk() {
        let chunks = chunk_text("Paragraph A.\n\nParagraph B.", &ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Paragraph A."));
        assert!(chunks[0].text.contains("Paragraph B."));
    }

    #[test]
    fn chunks_reassemble_to_input_modulo_whitespace() {
        let text = (0..40)
            .map(|i| paragraph(120, i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, &ChunkerConfig::default());
        assert!(chunks.len() > 1);

        let reassembled = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(collapse_ws(&reassembled), collapse_ws(&text));
    }

    #[test]
    fn no_chunk_exceeds_slack_cap() {
        let config = ChunkerConfig::default();
        let cap = (config.max_tokens as f64 * CHUNK_MERGE_SLACK) as usize;

        let text = (0..60)
            .map(|i| paragraph(100 + (i * 37) % 300, i))
            .collect::<Vec<_>>()
            .join("\n\n");
        for chunk in chunk_text(&text, &config) {
            assert!(chunk.token_count <= cap, "chunk of {} tokens", chunk.token_count);
        }
    }

    #[test]
    fn only_the_last_chunk_may_be_undersized() {
        let config = ChunkerConfig::default();
        let text = (0..30)
            .map(|i| paragraph(200, i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, &config);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.token_count >= config.min_tokens,
                "non-final chunk of {} tokens",
                chunk.token_count
            );
        }
    }

    #[test]
    fn trailing_fragment_merges_into_previous_chunk() {
        let config = ChunkerConfig::default();
        // Enough for one full chunk, then a tiny tail paragraph.
        let mut paragraphs: Vec<String> = (0..8).map(|i| paragraph(200, i)).collect();
        paragraphs.push("A short closing note.".to_string());
        let chunks = chunk_text(&paragraphs.join("\n\n"), &config);

        let last = chunks.last().unwrap();
        assert!(last.text.contains("A short closing note."));
        // Merged, not emitted as its own fragment.
        assert!(last.token_count >= config.min_tokens);
    }

    #[test]
    fn break_phrase_emits_early() {
        let config = ChunkerConfig::default();
        let mut paragraphs: Vec<String> = (0..3).map(|i| paragraph(300, i)).collect();
        paragraphs.push("In conclusion, less is more.".to_string());
        paragraphs.extend((10..16).map(|i| paragraph(300, i)));

        let chunks = chunk_text(&paragraphs.join("\n\n"), &config);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].text.contains("In conclusion"));
        // Emitted inside the window, well before the max was forced.
        assert!(chunks[0].token_count < config.max_tokens);
        assert!(chunks[0].token_count >= config.min_tokens);
    }

    #[test]
    fn oversized_paragraph_is_sentence_split() {
        let config = ChunkerConfig {
            min_tokens: 10,
            max_tokens: 50,
        };
        // One paragraph of many sentences, far over max.
        let paragraph = (0..40)
            .map(|i| format!("Sentence number {} has several words in it.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&paragraph, &config);
        assert!(chunks.len() > 1);
        let cap = (config.max_tokens as f64 * CHUNK_MERGE_SLACK) as usize;
        for chunk in &chunks {
            assert!(chunk.token_count <= cap);
        }
    }

    #[test]
    fn sentence_splitter_respects_abbreviation_case() {
        let sentences = split_sentences("It was cheap, i.e. nearly free. Next point here.");
        // "i.e. nearly" does not split (lowercase continuation); ". Next" does.
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].ends_with("free."));
    }

    #[test]
    fn hard_split_bounds_degenerate_runs() {
        let run = "x".repeat(40_000);
        let pieces = hard_split(&run, 1500);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(estimate_tokens(piece) <= 1500);
        }
        let total: usize = pieces.iter().map(|p| p.len()).sum();
        assert_eq!(total, 40_000);
    }
}
