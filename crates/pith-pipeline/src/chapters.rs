//! The chapters pipeline: parallel per-chapter compression, then a single
//! assembly call.
//!
//! Compression is idempotent per chapter (already-compressed chapters are
//! skipped on rerun) and isolates per-chapter failures; assembly only needs
//! at least one compressed chapter to proceed.

use serde::Deserialize;
use tracing::{debug, info, warn};

use pith_core::defaults::{
    CHAPTER_CONCURRENCY, DENSITY_DEFAULT_COMPRESSION, MAX_INSIGHTS_PER_CHAPTER,
    MAX_TOKENS_PER_CALL,
};
use pith_core::{
    count_words, estimate_tokens, parallel_map, Book, Chapter, Error, MapOptions, Result, Store,
};
use pith_inference::{ModelTier, StructuredClient};

use crate::chapters_extract::split_text_parts;
use crate::claims::{OutputStats, ProgressSink};
use crate::prompts;

#[derive(Debug, Deserialize)]
struct CompressReply {
    compressed_content: String,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    compression_notes: Option<String>,
}

/// Compress every chapter. Returns `(compressed, skipped)`.
pub async fn compress_chapters(
    store: &dyn Store,
    llm: &StructuredClient,
    book: &Book,
    progress: ProgressSink,
) -> Result<(usize, usize)> {
    let chapters = store.chapters().list_for_book(book.id).await?;
    if chapters.is_empty() {
        return Err(Error::Empty("No chapters found for this book".to_string()));
    }

    let ratio = book
        .recommended_compression
        .unwrap_or(DENSITY_DEFAULT_COMPRESSION);

    let results = parallel_map(
        &chapters,
        |chapter, index| async move {
            if chapter.compressed_content.is_some() {
                debug!(chapter = %chapter.title, "Already compressed, skipping");
                return Ok(false);
            }
            let (compressed, insights) =
                compress_one(llm, &book.title, chapter, index == 0, ratio).await?;
            let token_count = estimate_tokens(&compressed) as i32;
            store
                .chapters()
                .set_compressed(chapter.id, &compressed, &insights, token_count)
                .await?;
            Ok(true)
        },
        MapOptions::new(CHAPTER_CONCURRENCY).with_progress({
            let progress = progress.clone();
            move |done, total| progress(done, total)
        }),
    )
    .await?;

    let mut compressed = 0usize;
    let mut skipped = 0usize;
    for result in results {
        match result {
            Ok(_) => compressed += 1,
            Err(e) => {
                warn!(book_id = %book.id, index = e.index, error = %e.message, "Chapter skipped");
                skipped += 1;
            }
        }
    }

    if compressed == 0 {
        return Err(Error::Empty(
            "No chapters could be compressed".to_string(),
        ));
    }

    info!(book_id = %book.id, chapter_count = compressed, skipped, "Chapters compressed");
    Ok((compressed, skipped))
}

/// Compress a single chapter, re-splitting it when it exceeds the per-call
/// token cap. Part results are concatenated and their insights deduplicated.
async fn compress_one(
    llm: &StructuredClient,
    book_title: &str,
    chapter: &Chapter,
    is_first: bool,
    ratio: f32,
) -> Result<(String, Vec<String>)> {
    if chapter.original_token_count as usize <= MAX_TOKENS_PER_CALL {
        let reply: CompressReply = llm
            .invoke(
                &prompts::compress_schema(),
                &prompts::compress_prompt(book_title, chapter, is_first, ratio),
                ModelTier::Reasoning,
                None,
            )
            .await?;
        let insights = dedup_insights(reply.key_insights);
        return Ok((reply.compressed_content, insights));
    }

    let parts = split_text_parts(&chapter.original_content, MAX_TOKENS_PER_CALL);
    debug!(chapter = %chapter.title, parts = parts.len(), "Chapter re-split for compression");

    let mut pieces = Vec::with_capacity(parts.len());
    let mut insights = Vec::new();
    for (k, part) in parts.iter().enumerate() {
        let mut sub = chapter.clone();
        sub.title = format!("{} (Part {})", chapter.title, k + 1);
        sub.original_content = part.clone();
        let reply: CompressReply = llm
            .invoke(
                &prompts::compress_schema(),
                &prompts::compress_prompt(book_title, &sub, is_first && k == 0, ratio),
                ModelTier::Reasoning,
                None,
            )
            .await?;
        pieces.push(reply.compressed_content);
        insights.extend(reply.key_insights);
    }

    Ok((pieces.join("\n\n"), dedup_insights(insights)))
}

/// Deduplicate insights case-insensitively, keeping at most
/// `MAX_INSIGHTS_PER_CHAPTER` in first-seen order.
fn dedup_insights(insights: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    insights
        .into_iter()
        .filter(|i| !i.trim().is_empty())
        .filter(|i| seen.insert(i.trim().to_lowercase()))
        .take(MAX_INSIGHTS_PER_CHAPTER)
        .collect()
}

/// Assemble the compressed chapters into the final document and upsert it.
pub async fn assemble_book(
    store: &dyn Store,
    llm: &StructuredClient,
    book: &Book,
) -> Result<OutputStats> {
    let chapters = store.chapters().list_for_book(book.id).await?;
    let compressed: Vec<Chapter> = chapters
        .into_iter()
        .filter(|c| c.compressed_content.is_some())
        .collect();
    if compressed.is_empty() {
        return Err(Error::Empty(
            "No compressed chapters to assemble".to_string(),
        ));
    }

    let markdown = llm
        .invoke_text(
            &prompts::assemble_prompt(&book.title, book.author.as_deref(), &compressed),
            ModelTier::Reasoning,
            None,
        )
        .await?;

    let word_count = count_words(&markdown) as i32;
    let compression_ratio = book
        .original_word_count
        .filter(|&original| original > 0)
        .map(|original| word_count as f32 / original as f32);

    let stats = OutputStats {
        word_count,
        idea_count: compressed.len() as i32,
        compression_ratio,
    };
    store
        .outputs()
        .upsert(
            book.id,
            &markdown,
            stats.word_count,
            stats.idea_count,
            stats.compression_ratio,
        )
        .await?;

    info!(
        book_id = %book.id,
        chapter_count = stats.idea_count,
        word_count = stats.word_count,
        "Book assembled"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insights_dedup_case_insensitively_and_cap() {
        let insights = vec![
            "Focus wins".to_string(),
            "focus wins".to_string(),
            " ".to_string(),
            "Batch shallow work".to_string(),
            "Measure lead inputs".to_string(),
            "Say no by default".to_string(),
            "Plan every minute".to_string(),
            "One more past the cap".to_string(),
        ];
        let deduped = dedup_insights(insights);
        assert_eq!(deduped.len(), MAX_INSIGHTS_PER_CHAPTER);
        assert_eq!(deduped[0], "Focus wins");
        assert!(!deduped.contains(&"focus wins".to_string()));
    }
}
