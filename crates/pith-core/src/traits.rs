//! Core traits for pith abstractions.
//!
//! These traits define the seams between the pipeline and its collaborators:
//! the document store (one repository per entity, aggregated by `Store`) and
//! the chat-completion endpoint (`ChatBackend`).
//!
//! Book mutators called after processing has started return `Result<bool>`
//! where `Ok(false)` means the record no longer exists. Deleting a book is
//! the only cancellation signal, so the orchestrator treats a vanished
//! record as "stop quietly", never as an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// BOOK REPOSITORY
// =============================================================================

/// Request for creating a new book record.
#[derive(Debug, Clone)]
pub struct CreateBookRequest {
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub original_filename: String,
    pub page_count: Option<i32>,
    pub original_word_count: Option<i32>,
    pub pipeline: PipelineVariant,
    pub total_chunks: Option<i32>,
    pub total_chapters: Option<i32>,
    pub density_score: Option<f32>,
    pub recommended_compression: Option<f32>,
    pub extraction_method: Option<ExtractionMethod>,
}

/// Repository for book records.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Insert a new book in status `uploaded`.
    async fn insert(&self, req: CreateBookRequest) -> Result<Uuid>;

    /// Fetch a book, erroring with `BookNotFound` when absent.
    async fn fetch(&self, id: Uuid) -> Result<Book>;

    /// Fetch a book, `None` when absent.
    async fn try_fetch(&self, id: Uuid) -> Result<Option<Book>>;

    /// List a user's books, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Book>>;

    /// Set status, human-readable step, and progress in one write.
    /// `Ok(false)` when the record no longer exists.
    async fn update_status(
        &self,
        id: Uuid,
        status: BookStatus,
        current_step: Option<&str>,
        progress: i32,
    ) -> Result<bool>;

    /// Update progress and step within the current status.
    async fn update_progress(&self, id: Uuid, progress: i32, current_step: Option<&str>)
        -> Result<bool>;

    /// Mark the start of a processing run: set `processing_started_at`,
    /// clear `error` and `processing_completed_at`.
    async fn mark_processing_started(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Terminal success: status `completed`, progress 100, completion stamp.
    async fn mark_completed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Terminal failure: status `failed`, captured message, completion stamp.
    async fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Delete a book; all child records cascade.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// CHUNK REPOSITORY
// =============================================================================

/// A chunk to insert during intake.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub order_index: i32,
    pub text: String,
    pub token_count: i32,
}

/// Repository for book chunks (claims pipeline).
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Bulk insert chunks for a book.
    async fn insert_many(&self, book_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>>;

    /// All chunks for a book, ordered by index.
    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Chunk>>;
}

// =============================================================================
// CHAPTER REPOSITORY
// =============================================================================

/// A chapter to insert during intake.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub order_index: i32,
    pub title: String,
    pub level: i16,
    pub original_content: String,
    pub original_token_count: i32,
}

/// Repository for book chapters (chapters pipeline).
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// Bulk insert chapters for a book.
    async fn insert_many(&self, book_id: Uuid, chapters: Vec<NewChapter>) -> Result<Vec<Uuid>>;

    /// All chapters for a book, ordered by index.
    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Chapter>>;

    /// Store a chapter's compression result.
    async fn set_compressed(
        &self,
        id: Uuid,
        compressed_content: &str,
        key_insights: &[String],
        compressed_token_count: i32,
    ) -> Result<()>;
}

// =============================================================================
// CLAIM REPOSITORY
// =============================================================================

/// A claim to insert after extraction.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub chunk_id: Uuid,
    pub text: String,
    pub claim_type: ClaimType,
}

/// Filter verdict to apply to a claim.
#[derive(Debug, Clone)]
pub struct ClaimVerdict {
    pub label: ClaimLabel,
    pub score: f32,
    pub reason: String,
}

/// Repository for extracted claims.
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// Bulk insert claims for a book.
    async fn insert_many(&self, book_id: Uuid, claims: Vec<NewClaim>) -> Result<Vec<Uuid>>;

    /// Number of claims stored for a book (labeled or not).
    async fn count_for_book(&self, book_id: Uuid) -> Result<i64>;

    /// Claims with no label yet.
    async fn list_unlabeled(&self, book_id: Uuid) -> Result<Vec<Claim>>;

    /// Kept claims (core/supporting), sorted by score descending.
    async fn list_kept(&self, book_id: Uuid) -> Result<Vec<Claim>>;

    /// Apply a filter verdict to one claim.
    async fn apply_verdict(&self, id: Uuid, verdict: ClaimVerdict) -> Result<()>;
}

// =============================================================================
// IDEA REPOSITORY
// =============================================================================

/// An idea to insert after clustering and expansion.
#[derive(Debug, Clone)]
pub struct NewIdea {
    pub order_index: i32,
    pub title: String,
    pub merged_claims: Vec<String>,
    pub principle: Option<String>,
    pub behavior_delta: Option<String>,
    pub examples: Option<Vec<IdeaExample>>,
}

/// Repository for idea clusters.
#[async_trait]
pub trait IdeaRepository: Send + Sync {
    /// Delete all ideas for a book (clustering replaces, never appends).
    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64>;

    /// Bulk insert ideas for a book.
    async fn insert_many(&self, book_id: Uuid, ideas: Vec<NewIdea>) -> Result<Vec<Uuid>>;

    /// All ideas for a book, ordered by index.
    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Idea>>;
}

// =============================================================================
// OUTPUT REPOSITORY
// =============================================================================

/// Repository for reconstructed final outputs (one per book).
#[async_trait]
pub trait OutputRepository: Send + Sync {
    /// Insert or replace the output for a book.
    async fn upsert(
        &self,
        book_id: Uuid,
        markdown: &str,
        word_count: i32,
        idea_count: i32,
        compression_ratio: Option<f32>,
    ) -> Result<Uuid>;

    /// Fetch the output for a book, `None` until reconstruction completes.
    async fn fetch_for_book(&self, book_id: Uuid) -> Result<Option<FinalOutput>>;
}

// =============================================================================
// USER REPOSITORY
// =============================================================================

/// Request for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub credential_hash: Option<String>,
    pub external_id: Option<String>,
    pub avatar_url: Option<String>,
}

/// Repository for user identities.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, req: CreateUserRequest) -> Result<Uuid>;
    async fn fetch(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

// =============================================================================
// STORE AGGREGATE
// =============================================================================

/// The document store: one repository handle per entity class.
///
/// The pipeline is written against this trait so integration tests can run
/// on an in-memory implementation while production uses PostgreSQL.
pub trait Store: Send + Sync {
    fn books(&self) -> &dyn BookRepository;
    fn chunks(&self) -> &dyn ChunkRepository;
    fn chapters(&self) -> &dyn ChapterRepository;
    fn claims(&self) -> &dyn ClaimRepository;
    fn ideas(&self) -> &dyn IdeaRepository;
    fn outputs(&self) -> &dyn OutputRepository;
    fn users(&self) -> &dyn UserRepository;
}

// =============================================================================
// CHAT BACKEND
// =============================================================================

/// A chat-completion endpoint. The structured client layers schema hints,
/// JSON extraction, and coercion on top of this seam.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one system + user message pair to the given model and return
    /// the assistant reply verbatim. An empty `system` omits the message.
    async fn chat(&self, model: &str, system: &str, prompt: &str) -> Result<String>;

    /// Probe endpoint reachability.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
