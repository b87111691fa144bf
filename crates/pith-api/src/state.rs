//! Shared application state.

use std::sync::Arc;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    RateLimiter,
};

use pith_db::Database;
use pith_inference::StructuredClient;
use pith_pipeline::Processor;

/// Global rate limiter type (direct quota, no keyed bucketing).
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database repositories.
    pub db: Arc<Database>,
    /// Pipeline processor driving distillation runs.
    pub processor: Arc<Processor>,
    /// Structured LLM client (upload-side preprocessing).
    pub llm: StructuredClient,
    /// HMAC key for verifying session tokens.
    pub session_signing_key: Arc<str>,
    /// Global rate limiter (`None` when disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}
