//! # pith-inference
//!
//! LLM access for the pith pipeline: an OpenAI-compatible chat backend,
//! the three-tier model configuration, and the structured-call client that
//! turns loose model output into schema-conforming values.

pub mod coerce;
pub mod mock;
pub mod openai;
pub mod schema;
pub mod structured;
pub mod tiers;

pub use coerce::{coerce, CoercionMode};
pub use mock::MockChatBackend;
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use schema::{Field, Schema, Shape};
pub use structured::StructuredClient;
pub use tiers::{ModelTier, TierConfig};
