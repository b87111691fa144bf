//! In-memory `Store` implementation and helpers for pipeline integration
//! tests. Mirrors the PostgreSQL layer's semantics closely enough for the
//! orchestrator: cascade delete, monotone progress clamping, and
//! `Ok(false)` from book mutators once the record is gone. Every book write
//! is recorded so tests can assert what a poller would have observed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pith_core::*;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    books: HashMap<Uuid, Book>,
    chunks: Vec<Chunk>,
    chapters: Vec<Chapter>,
    claims: Vec<Claim>,
    ideas: Vec<Idea>,
    outputs: HashMap<Uuid, FinalOutput>,
    history: Vec<(BookStatus, i32)>,
}

/// In-memory document store.
#[derive(Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<State>>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `(status, progress)` pair written for any book, in write order.
    pub fn history(&self) -> Vec<(BookStatus, i32)> {
        self.state.lock().unwrap().history.clone()
    }

    /// Distinct statuses in observation order.
    pub fn observed_statuses(&self) -> Vec<BookStatus> {
        let mut out: Vec<BookStatus> = Vec::new();
        for (status, _) in self.history() {
            if out.last() != Some(&status) {
                out.push(status);
            }
        }
        out
    }

    pub fn claim_count(&self) -> usize {
        self.state.lock().unwrap().claims.len()
    }

    pub fn idea_count(&self) -> usize {
        self.state.lock().unwrap().ideas.len()
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[async_trait]
impl BookRepository for MemStore {
    async fn insert(&self, req: CreateBookRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let book = Book {
            id,
            user_id: req.user_id,
            title: req.title,
            author: req.author,
            original_filename: req.original_filename,
            page_count: req.page_count,
            original_word_count: req.original_word_count,
            status: BookStatus::Uploaded,
            pipeline: req.pipeline,
            current_step: None,
            progress: 0,
            error: None,
            processing_started_at: None,
            processing_completed_at: None,
            total_chunks: req.total_chunks,
            total_chapters: req.total_chapters,
            density_score: req.density_score,
            recommended_compression: req.recommended_compression,
            extraction_method: req.extraction_method,
            created_at: now(),
            updated_at: now(),
        };
        let mut state = self.state.lock().unwrap();
        state.history.push((BookStatus::Uploaded, 0));
        state.books.insert(id, book);
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Book> {
        self.try_fetch(id).await?.ok_or(Error::BookNotFound(id))
    }

    async fn try_fetch(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(self.state.lock().unwrap().books.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Book>> {
        let state = self.state.lock().unwrap();
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookStatus,
        current_step: Option<&str>,
        progress: i32,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(false);
        };
        book.status = status;
        book.current_step = current_step.map(String::from);
        book.progress = progress;
        book.updated_at = now();
        state.history.push((status, progress));
        Ok(true)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        progress: i32,
        current_step: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(false);
        };
        // Same clamp as the SQL layer: progress never regresses.
        book.progress = book.progress.max(progress);
        if let Some(step) = current_step {
            book.current_step = Some(step.to_string());
        }
        book.updated_at = now();
        let record = (book.status, book.progress);
        state.history.push(record);
        Ok(true)
    }

    async fn mark_processing_started(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(false);
        };
        book.processing_started_at = Some(at);
        book.processing_completed_at = None;
        book.error = None;
        Ok(true)
    }

    async fn mark_completed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(false);
        };
        book.status = BookStatus::Completed;
        book.progress = 100;
        book.current_step = Some("completed".to_string());
        book.processing_completed_at = Some(at);
        state.history.push((BookStatus::Completed, 100));
        Ok(true)
    }

    async fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(false);
        };
        book.status = BookStatus::Failed;
        book.error = Some(error.to_string());
        book.processing_completed_at = Some(at);
        let record = (BookStatus::Failed, book.progress);
        state.history.push(record);
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.books.remove(&id);
        state.chunks.retain(|c| c.book_id != id);
        state.chapters.retain(|c| c.book_id != id);
        state.claims.retain(|c| c.book_id != id);
        state.ideas.retain(|i| i.book_id != id);
        state.outputs.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ChunkRepository for MemStore {
    async fn insert_many(&self, book_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for chunk in chunks {
            let id = Uuid::now_v7();
            state.chunks.push(Chunk {
                id,
                book_id,
                order_index: chunk.order_index,
                text: chunk.text,
                token_count: chunk.token_count,
                created_at: now(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Chunk>> {
        let state = self.state.lock().unwrap();
        let mut chunks: Vec<Chunk> = state
            .chunks
            .iter()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.order_index);
        Ok(chunks)
    }
}

#[async_trait]
impl ChapterRepository for MemStore {
    async fn insert_many(&self, book_id: Uuid, chapters: Vec<NewChapter>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for chapter in chapters {
            let id = Uuid::now_v7();
            state.chapters.push(Chapter {
                id,
                book_id,
                order_index: chapter.order_index,
                title: chapter.title,
                level: chapter.level,
                original_content: chapter.original_content,
                original_token_count: chapter.original_token_count,
                compressed_content: None,
                key_insights: None,
                compressed_token_count: None,
                created_at: now(),
                updated_at: now(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Chapter>> {
        let state = self.state.lock().unwrap();
        let mut chapters: Vec<Chapter> = state
            .chapters
            .iter()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.order_index);
        Ok(chapters)
    }

    async fn set_compressed(
        &self,
        id: Uuid,
        compressed_content: &str,
        key_insights: &[String],
        compressed_token_count: i32,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(chapter) = state.chapters.iter_mut().find(|c| c.id == id) {
            chapter.compressed_content = Some(compressed_content.to_string());
            chapter.key_insights = Some(key_insights.to_vec());
            chapter.compressed_token_count = Some(compressed_token_count);
            chapter.updated_at = now();
        }
        Ok(())
    }
}

#[async_trait]
impl ClaimRepository for MemStore {
    async fn insert_many(&self, book_id: Uuid, claims: Vec<NewClaim>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for claim in claims {
            let id = Uuid::now_v7();
            state.claims.push(Claim {
                id,
                book_id,
                chunk_id: claim.chunk_id,
                text: claim.text,
                claim_type: claim.claim_type,
                label: None,
                score: None,
                reason: None,
                created_at: now(),
                updated_at: now(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn count_for_book(&self, book_id: Uuid) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.claims.iter().filter(|c| c.book_id == book_id).count() as i64)
    }

    async fn list_unlabeled(&self, book_id: Uuid) -> Result<Vec<Claim>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .claims
            .iter()
            .filter(|c| c.book_id == book_id && c.label.is_none())
            .cloned()
            .collect())
    }

    async fn list_kept(&self, book_id: Uuid) -> Result<Vec<Claim>> {
        let state = self.state.lock().unwrap();
        let mut kept: Vec<Claim> = state
            .claims
            .iter()
            .filter(|c| c.book_id == book_id && c.is_kept())
            .cloned()
            .collect();
        kept.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }

    async fn apply_verdict(&self, id: Uuid, verdict: ClaimVerdict) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(claim) = state.claims.iter_mut().find(|c| c.id == id) {
            claim.label = Some(verdict.label);
            claim.score = Some(verdict.score);
            claim.reason = Some(verdict.reason);
            claim.updated_at = now();
        }
        Ok(())
    }
}

#[async_trait]
impl IdeaRepository for MemStore {
    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.ideas.len();
        state.ideas.retain(|i| i.book_id != book_id);
        Ok((before - state.ideas.len()) as u64)
    }

    async fn insert_many(&self, book_id: Uuid, ideas: Vec<NewIdea>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for idea in ideas {
            let id = Uuid::now_v7();
            state.ideas.push(Idea {
                id,
                book_id,
                order_index: idea.order_index,
                title: idea.title,
                merged_claims: idea.merged_claims,
                principle: idea.principle,
                behavior_delta: idea.behavior_delta,
                examples: idea.examples,
                created_at: now(),
                updated_at: now(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Idea>> {
        let state = self.state.lock().unwrap();
        let mut ideas: Vec<Idea> = state
            .ideas
            .iter()
            .filter(|i| i.book_id == book_id)
            .cloned()
            .collect();
        ideas.sort_by_key(|i| i.order_index);
        Ok(ideas)
    }
}

#[async_trait]
impl OutputRepository for MemStore {
    async fn upsert(
        &self,
        book_id: Uuid,
        markdown: &str,
        word_count: i32,
        idea_count: i32,
        compression_ratio: Option<f32>,
    ) -> Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        let id = state
            .outputs
            .get(&book_id)
            .map(|o| o.id)
            .unwrap_or_else(Uuid::now_v7);
        state.outputs.insert(
            book_id,
            FinalOutput {
                id,
                book_id,
                markdown: markdown.to_string(),
                word_count,
                idea_count,
                compression_ratio,
                created_at: now(),
                updated_at: now(),
            },
        );
        Ok(id)
    }

    async fn fetch_for_book(&self, book_id: Uuid) -> Result<Option<FinalOutput>> {
        Ok(self.state.lock().unwrap().outputs.get(&book_id).cloned())
    }
}

#[async_trait]
impl UserRepository for MemStore {
    async fn insert(&self, req: CreateUserRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let user = User {
            id,
            email: req.email,
            display_name: req.display_name,
            credential_hash: req.credential_hash,
            external_id: req.external_id,
            avatar_url: req.avatar_url,
            created_at: now(),
            updated_at: now(),
        };
        self.state.lock().unwrap().users.insert(id, user);
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

impl Store for MemStore {
    fn books(&self) -> &dyn BookRepository {
        self
    }

    fn chunks(&self) -> &dyn ChunkRepository {
        self
    }

    fn chapters(&self) -> &dyn ChapterRepository {
        self
    }

    fn claims(&self) -> &dyn ClaimRepository {
        self
    }

    fn ideas(&self) -> &dyn IdeaRepository {
        self
    }

    fn outputs(&self) -> &dyn OutputRepository {
        self
    }

    fn users(&self) -> &dyn UserRepository {
        self
    }
}

// =============================================================================
// SEEDING HELPERS
// =============================================================================

pub async fn seed_user(store: &MemStore) -> Uuid {
    store
        .users()
        .insert(CreateUserRequest {
            email: "reader@example.com".to_string(),
            display_name: "Reader".to_string(),
            credential_hash: None,
            external_id: None,
            avatar_url: None,
        })
        .await
        .unwrap()
}

pub async fn seed_book(store: &MemStore, pipeline: PipelineVariant) -> Uuid {
    let user_id = seed_user(store).await;
    store
        .books()
        .insert(CreateBookRequest {
            user_id,
            title: "Deep Focus".to_string(),
            author: Some("A. Writer".to_string()),
            original_filename: "deep-focus.pdf".to_string(),
            page_count: Some(200),
            original_word_count: Some(60_000),
            pipeline,
            total_chunks: None,
            total_chapters: None,
            density_score: None,
            recommended_compression: None,
            extraction_method: None,
        })
        .await
        .unwrap()
}

/// Poll until the book reaches a terminal status.
pub async fn wait_terminal(store: &MemStore, book_id: Uuid) -> Book {
    for _ in 0..500 {
        let book = store.books().fetch(book_id).await.unwrap();
        if book.status.is_terminal() {
            return book;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("book never reached a terminal status");
}
