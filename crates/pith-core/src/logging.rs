//! Structured logging field name constants for pith.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, stage completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (chunks, claims, filter batches) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → pipeline → LLM calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "extract_claims", "invoke", "upsert_output"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Book UUID being operated on.
pub const BOOK_ID: &str = "book_id";

/// User UUID associated with a request.
pub const USER_ID: &str = "user_id";

/// Pipeline stage name ("extract_claims", "compress_chapters", ...).
pub const STAGE: &str = "stage";

/// Pipeline variant ("claims" or "chapters").
pub const PIPELINE: &str = "pipeline";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks processed.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of chapters processed.
pub const CHAPTER_COUNT: &str = "chapter_count";

/// Number of claims produced or filtered.
pub const CLAIM_COUNT: &str = "claim_count";

/// Number of ideas produced.
pub const IDEA_COUNT: &str = "idea_count";

/// Items skipped due to per-item errors.
pub const SKIPPED: &str = "skipped";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model identifier used for a call.
pub const MODEL: &str = "model";

/// Model tier name ("extraction", "filtering", "reasoning").
pub const TIER: &str = "tier";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
