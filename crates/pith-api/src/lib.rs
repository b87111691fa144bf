//! # pith-api
//!
//! HTTP surface for the pith book-distillation service: the upload SSE
//! stream, pipeline trigger, polling, output fetch, delete, and listing,
//! behind session-token auth.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod pdf;
pub mod state;

pub use config::ApiConfig;
pub use state::AppState;
