//! Centralized default constants for the pith system.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// CHUNKING (claims pipeline)
// =============================================================================

/// Minimum tokens per chunk.
pub const CHUNK_MIN_TOKENS: usize = 800;

/// Maximum tokens per chunk before the accumulator emits.
pub const CHUNK_MAX_TOKENS: usize = 1500;

/// A trailing undersized chunk merges backward only if the combined chunk
/// stays within this multiple of the max.
pub const CHUNK_MERGE_SLACK: f64 = 1.2;

/// Phrases that justify emitting a chunk early once it is inside the
/// acceptable token window.
pub const CHUNK_BREAK_PHRASES: &[&str] = &[
    "in conclusion",
    "to summarize",
    "in summary",
    "the key takeaway",
    "moving on",
];

// =============================================================================
// CHAPTER EXTRACTION (chapters pipeline)
// =============================================================================

/// Chapters above this token count are split into "(Part k)" sub-chapters.
pub const MAX_CHAPTER_TOKENS: usize = 6000;

/// Target tokens per artificial chapter when no structure is detected.
pub const ARTIFICIAL_CHAPTER_TOKENS: usize = 3000;

/// Minimum body length (chars) for a TOC-matched chapter to count.
pub const TOC_MIN_BODY_CHARS: usize = 100;

/// Minimum fraction of TOC entries that must match into the body text.
pub const TOC_MIN_MATCH_RATE: f64 = 0.5;

/// Minimum chapters for the TOC and regex methods to succeed.
pub const MIN_DETECTED_CHAPTERS: usize = 3;

/// Pages fed to the TOC detector.
pub const TOC_SCAN_PAGES: usize = 15;

/// Below this many chars of input, the TOC detector skips the LLM call.
pub const TOC_MIN_INPUT_CHARS: usize = 200;

// =============================================================================
// DENSITY ANALYSIS
// =============================================================================

/// Target sample length in chars for density analysis.
pub const DENSITY_SAMPLE_TARGET_CHARS: usize = 6000;

/// Below this sample length the analyzer returns defaults without a call.
pub const DENSITY_MIN_SAMPLE_CHARS: usize = 500;

/// Default density score when analysis is skipped or fails.
pub const DENSITY_DEFAULT_SCORE: f32 = 5.0;

/// Default recommended compression ratio.
pub const DENSITY_DEFAULT_COMPRESSION: f32 = 0.35;

/// Default recommended context size.
pub const DENSITY_DEFAULT_CONTEXT: i32 = 180;

// =============================================================================
// PIPELINE CONCURRENCY
// =============================================================================

/// Concurrent chunk extractions in S1 and cluster expansions in S4.
pub const CLAIMS_CONCURRENCY: usize = 5;

/// Concurrent filter batches in S2.
pub const FILTER_CONCURRENCY: usize = 5;

/// Claims per filter batch in S2.
pub const FILTER_BATCH_SIZE: usize = 20;

/// Concurrent chapter compressions in C1.
pub const CHAPTER_CONCURRENCY: usize = 3;

/// Maximum tokens sent in a single chapter-compression call.
pub const MAX_TOKENS_PER_CALL: usize = 6000;

/// Deduplicated key insights kept per chapter after part-wise compression.
pub const MAX_INSIGHTS_PER_CHAPTER: usize = 5;

/// Target number of final ideas the clustering prompt asks for.
pub const CLUSTER_MIN_IDEAS: usize = 7;
pub const CLUSTER_MAX_IDEAS: usize = 12;

// =============================================================================
// PROGRESS BANDS
// =============================================================================
//
// Per-stage [lo, hi] progress bands. Monotonicity across a run only requires
// that later stages' bands sit at or above earlier ones.

pub const BAND_EXTRACT_CLAIMS: (i32, i32) = (5, 20);
pub const BAND_FILTER_CLAIMS: (i32, i32) = (20, 40);
pub const BAND_CLUSTER_IDEAS: (i32, i32) = (40, 70);
pub const BAND_RECONSTRUCT: (i32, i32) = (70, 100);

pub const BAND_COMPRESS_CHAPTERS: (i32, i32) = (5, 70);
pub const BAND_ASSEMBLE: (i32, i32) = (75, 95);

/// Progress value at terminal success.
pub const PROGRESS_DONE: i32 = 100;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible endpoint.
pub const LLM_DEFAULT_URL: &str = "https://api.openai.com/v1";

/// Request timeout for chat completions in seconds.
pub const LLM_TIMEOUT_SECS: u64 = 300;

/// Default system message for every structured call.
pub const SIGNAL_EXTRACTION_SYSTEM: &str = "You are not a summarizer. You are a signal \
extraction system. If removing something does not reduce understanding, remove it.";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Maximum upload size in bytes (50 MB).
pub const MAX_UPLOAD_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Recommended client polling interval in seconds (documented for the UI).
pub const POLL_INTERVAL_SECS: u64 = 3;

/// Session token lifetime in seconds (24 hours).
pub const SESSION_TOKEN_LIFETIME_SECS: u64 = 86_400;

// =============================================================================
// PDF EXTRACTION
// =============================================================================

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Page threshold for batch PDF extraction.
pub const LARGE_PDF_PAGE_THRESHOLD: usize = 100;

/// Pages per batch for large PDF extraction.
pub const PDF_BATCH_PAGES: usize = 50;
