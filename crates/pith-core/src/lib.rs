//! # pith-core
//!
//! Core types, traits, and abstractions for the pith book-distillation
//! service.
//!
//! This crate provides the domain model (books, chunks, chapters, claims,
//! ideas, final outputs), the repository traits the persistence layer
//! implements, the shared error type, and the bounded-concurrency mapper
//! that every pipeline stage fans out through.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod parallel;
pub mod tokenizer;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{UploadEvent, UploadStage};
pub use models::*;
pub use parallel::{parallel_batch, parallel_map, ItemError, MapOptions};
pub use tokenizer::{count_words, estimate_tokens};
pub use traits::*;
