//! The claims pipeline: five stages from chunks to reconstructed markdown.
//!
//! Each stage persists its results before the next begins, and each is
//! written to survive a rerun over partial prior state: extraction skips a
//! book that already has claims, filtering only touches unlabeled claims,
//! clustering deletes old ideas before inserting, and reconstruction
//! upserts the final output.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use pith_core::defaults::{
    CLAIMS_CONCURRENCY, CLUSTER_MAX_IDEAS, CLUSTER_MIN_IDEAS, FILTER_BATCH_SIZE,
    FILTER_CONCURRENCY,
};
use pith_core::{
    count_words, parallel_batch, parallel_map, Book, Claim, ClaimLabel, ClaimType, ClaimVerdict,
    Error, MapOptions, NewClaim, NewIdea, Result, Store,
};
use pith_inference::{ModelTier, StructuredClient};

use crate::prompts;

/// Completion-order progress callback shared with the orchestrator.
pub type ProgressSink = Arc<dyn Fn(usize, usize) + Send + Sync>;

// =============================================================================
// S1: EXTRACT CLAIMS
// =============================================================================

#[derive(Debug, Deserialize)]
struct ExtractReply {
    claims: Vec<ExtractedClaim>,
}

#[derive(Debug, Deserialize)]
struct ExtractedClaim {
    claim: String,
    #[serde(rename = "type")]
    claim_type: ClaimType,
}

/// Extract claims from every chunk. Returns `(claims_inserted, chunks_skipped)`.
///
/// Skips the whole stage when claims already exist for the book, so a retry
/// after a later-stage failure does not duplicate them.
pub async fn extract_claims(
    store: &dyn Store,
    llm: &StructuredClient,
    book_id: uuid::Uuid,
    progress: ProgressSink,
) -> Result<(usize, usize)> {
    let existing = store.claims().count_for_book(book_id).await?;
    if existing > 0 {
        info!(book_id = %book_id, existing, "Claims already extracted, skipping stage");
        return Ok((existing as usize, 0));
    }

    let chunks = store.chunks().list_for_book(book_id).await?;
    if chunks.is_empty() {
        return Err(Error::Empty("No chunks found for this book".to_string()));
    }

    let total_chunks = chunks.len();
    let results = parallel_map(
        &chunks,
        |chunk, _| async move {
            let reply: ExtractReply = llm
                .invoke(
                    &prompts::claim_extraction_schema(),
                    &prompts::claim_extraction_prompt(&chunk.text),
                    ModelTier::Extraction,
                    None,
                )
                .await?;
            Ok(reply
                .claims
                .into_iter()
                .filter(|c| !c.claim.trim().is_empty())
                .map(|c| NewClaim {
                    chunk_id: chunk.id,
                    text: c.claim,
                    claim_type: c.claim_type,
                })
                .collect::<Vec<_>>())
        },
        MapOptions::new(CLAIMS_CONCURRENCY).with_progress({
            let progress = progress.clone();
            move |done, total| progress(done, total)
        }),
    )
    .await?;

    let mut claims = Vec::new();
    let mut skipped = 0usize;
    for result in results {
        match result {
            Ok(batch) => claims.extend(batch),
            Err(e) => {
                warn!(book_id = %book_id, index = e.index, error = %e.message, "Chunk skipped");
                skipped += 1;
            }
        }
    }

    let inserted = claims.len();
    if inserted > 0 {
        store.claims().insert_many(book_id, claims).await?;
    }
    info!(
        book_id = %book_id,
        claim_count = inserted,
        chunk_count = total_chunks,
        skipped,
        "Claims extracted"
    );
    Ok((inserted, skipped))
}

// =============================================================================
// S2: FILTER CLAIMS
// =============================================================================

#[derive(Debug, Deserialize)]
struct FilterReply {
    evaluations: Vec<Evaluation>,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    claim: String,
    label: ClaimLabel,
    score: f64,
    reason: String,
}

/// Label every unlabeled claim in batches. Returns `(kept, discarded)`.
pub async fn filter_claims(
    store: &dyn Store,
    llm: &StructuredClient,
    book_id: uuid::Uuid,
    progress: ProgressSink,
) -> Result<(usize, usize)> {
    let unlabeled = store.claims().list_unlabeled(book_id).await?;
    if unlabeled.is_empty() {
        debug!(book_id = %book_id, "No unlabeled claims, skipping filter");
        return Ok((0, 0));
    }

    let results = parallel_batch(
        &unlabeled,
        FILTER_BATCH_SIZE,
        |batch, _| async move {
            let refs: Vec<&Claim> = batch.iter().collect();
            let reply: FilterReply = llm
                .invoke(
                    &prompts::claim_filter_schema(),
                    &prompts::claim_filter_prompt(&refs),
                    ModelTier::Filtering,
                    None,
                )
                .await?;

            let mut kept = 0usize;
            let mut discarded = 0usize;
            for evaluation in reply.evaluations {
                // TODO: claims with identical text inside one batch make this
                // back-mapping ambiguous; include a short per-claim id in the
                // prompt and have the model echo it instead of matching on text.
                let Some(claim) = batch.iter().find(|c| c.text == evaluation.claim) else {
                    debug!(book_id = %book_id, "Evaluation did not match any claim text");
                    continue;
                };
                if evaluation.label.is_kept() {
                    kept += 1;
                } else {
                    discarded += 1;
                }
                store
                    .claims()
                    .apply_verdict(
                        claim.id,
                        ClaimVerdict {
                            label: evaluation.label,
                            score: (evaluation.score as f32).clamp(0.0, 1.0),
                            reason: evaluation.reason,
                        },
                    )
                    .await?;
            }
            Ok((kept, discarded))
        },
        MapOptions::new(FILTER_CONCURRENCY).with_progress({
            let progress = progress.clone();
            move |done, total| progress(done, total)
        }),
    )
    .await?;

    let mut kept = 0usize;
    let mut discarded = 0usize;
    for result in results {
        match result {
            Ok((k, d)) => {
                kept += k;
                discarded += d;
            }
            Err(e) => {
                warn!(book_id = %book_id, index = e.index, error = %e.message, "Filter batch skipped");
            }
        }
    }

    info!(book_id = %book_id, kept, discarded, "Claims filtered");
    Ok((kept, discarded))
}

// =============================================================================
// S3: CLUSTER IDEAS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ClusteredIdea {
    pub idea_title: String,
    pub merged_claims: Vec<String>,
    #[allow(dead_code)]
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct ClusterReply {
    ideas: Vec<ClusteredIdea>,
}

/// Cluster kept claims into ideas with one reasoning-tier call.
pub async fn cluster_ideas(
    store: &dyn Store,
    llm: &StructuredClient,
    book_id: uuid::Uuid,
) -> Result<Vec<ClusteredIdea>> {
    let kept = store.claims().list_kept(book_id).await?;
    if kept.is_empty() {
        return Err(Error::Empty(
            "No valuable claims found in this book".to_string(),
        ));
    }

    let reply: ClusterReply = llm
        .invoke(
            &prompts::cluster_schema(),
            &prompts::cluster_prompt(&kept, CLUSTER_MIN_IDEAS, CLUSTER_MAX_IDEAS),
            ModelTier::Reasoning,
            None,
        )
        .await?;

    if reply.ideas.is_empty() {
        return Err(Error::Empty(
            "No valuable claims found in this book".to_string(),
        ));
    }

    info!(book_id = %book_id, idea_count = reply.ideas.len(), "Claims clustered");
    Ok(reply.ideas)
}

// =============================================================================
// S4: EXPAND IDEAS
// =============================================================================

#[derive(Debug, Deserialize)]
struct ExpandReply {
    principle: String,
    behavior_delta: String,
}

/// Expand every cluster into principle + behavior-delta prose, then replace
/// the book's ideas wholesale (delete before insert keeps reruns exact).
pub async fn expand_ideas(
    store: &dyn Store,
    llm: &StructuredClient,
    book_id: uuid::Uuid,
    clusters: Vec<ClusteredIdea>,
    progress: ProgressSink,
) -> Result<usize> {
    let expansions = parallel_map(
        &clusters,
        |cluster, _| async move {
            let reply: ExpandReply = llm
                .invoke(
                    &prompts::expand_schema(),
                    &prompts::expand_prompt(&cluster.idea_title, &cluster.merged_claims),
                    ModelTier::Reasoning,
                    None,
                )
                .await?;
            Ok(reply)
        },
        MapOptions::new(CLAIMS_CONCURRENCY).with_progress({
            let progress = progress.clone();
            move |done, total| progress(done, total)
        }),
    )
    .await?;

    let mut ideas = Vec::with_capacity(clusters.len());
    for (index, (cluster, expansion)) in clusters.iter().zip(expansions).enumerate() {
        let (principle, behavior_delta) = match expansion {
            Ok(reply) => (Some(reply.principle), Some(reply.behavior_delta)),
            Err(e) => {
                warn!(book_id = %book_id, index = e.index, error = %e.message, "Idea expansion skipped");
                (None, None)
            }
        };
        ideas.push(NewIdea {
            order_index: index as i32,
            title: cluster.idea_title.clone(),
            merged_claims: cluster.merged_claims.clone(),
            principle,
            behavior_delta,
            examples: None,
        });
    }

    store.ideas().delete_for_book(book_id).await?;
    let count = ideas.len();
    store.ideas().insert_many(book_id, ideas).await?;
    info!(book_id = %book_id, idea_count = count, "Ideas expanded");
    Ok(count)
}

// =============================================================================
// S5: RECONSTRUCT
// =============================================================================

/// Stats recorded on the final output.
#[derive(Debug, Clone, Copy)]
pub struct OutputStats {
    pub word_count: i32,
    pub idea_count: i32,
    pub compression_ratio: Option<f32>,
}

/// Reconstruct the final markdown from ideas and upsert the output record.
pub async fn reconstruct(
    store: &dyn Store,
    llm: &StructuredClient,
    book: &Book,
) -> Result<OutputStats> {
    let ideas = store.ideas().list_for_book(book.id).await?;
    if ideas.is_empty() {
        return Err(Error::Empty("No ideas to reconstruct".to_string()));
    }

    let markdown = llm
        .invoke_text(
            &prompts::reconstruct_prompt(&book.title, book.author.as_deref(), &ideas),
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
        idea_count: ideas.len() as i32,
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
        idea_count = stats.idea_count,
        word_count = stats.word_count,
        "Book reconstructed"
    );
    Ok(stats)
}
