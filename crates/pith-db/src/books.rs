//! Book repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pith_core::{
    Book, BookRepository, BookStatus, CreateBookRequest, Error, ExtractionMethod, PipelineVariant,
    Result,
};

/// PostgreSQL implementation of `BookRepository`.
pub struct PgBookRepository {
    pool: Pool<Postgres>,
}

impl PgBookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a book row into a Book struct.
    fn parse_row(row: sqlx::postgres::PgRow) -> Book {
        let status: String = row.get("status");
        let pipeline: String = row.get("pipeline");
        let extraction_method: Option<String> = row.get("extraction_method");
        Book {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            author: row.get("author"),
            original_filename: row.get("original_filename"),
            page_count: row.get("page_count"),
            original_word_count: row.get("original_word_count"),
            status: BookStatus::parse(&status).unwrap_or(BookStatus::Uploaded),
            pipeline: PipelineVariant::parse(&pipeline).unwrap_or(PipelineVariant::Claims),
            current_step: row.get("current_step"),
            progress: row.get("progress"),
            error: row.get("error"),
            processing_started_at: row.get("processing_started_at"),
            processing_completed_at: row.get("processing_completed_at"),
            total_chunks: row.get("total_chunks"),
            total_chapters: row.get("total_chapters"),
            density_score: row.get("density_score"),
            recommended_compression: row.get("recommended_compression"),
            extraction_method: extraction_method.as_deref().and_then(ExtractionMethod::parse),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const SELECT_BOOK: &str = "SELECT id, user_id, title, author, original_filename, page_count, \
     original_word_count, status, pipeline, current_step, progress, error, \
     processing_started_at, processing_completed_at, total_chunks, total_chapters, \
     density_score, recommended_compression, extraction_method, created_at, updated_at \
     FROM books";

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn insert(&self, req: CreateBookRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO books (id, user_id, title, author, original_filename, page_count, \
             original_word_count, status, pipeline, progress, total_chunks, total_chapters, \
             density_score, recommended_compression, extraction_method, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'uploaded', $8, 0, $9, $10, $11, $12, $13, $14, $14)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(&req.title)
        .bind(&req.author)
        .bind(&req.original_filename)
        .bind(req.page_count)
        .bind(req.original_word_count)
        .bind(req.pipeline.as_str())
        .bind(req.total_chunks)
        .bind(req.total_chapters)
        .bind(req.density_score)
        .bind(req.recommended_compression)
        .bind(req.extraction_method.map(|m| m.as_str()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Book> {
        self.try_fetch(id).await?.ok_or(Error::BookNotFound(id))
    }

    async fn try_fetch(&self, id: Uuid) -> Result<Option<Book>> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_BOOK))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::parse_row))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Book>> {
        let rows = sqlx::query(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_BOOK
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookStatus,
        current_step: Option<&str>,
        progress: i32,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET status = $2, current_step = $3, progress = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(current_step)
        .bind(progress)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        progress: i32,
        current_step: Option<&str>,
    ) -> Result<bool> {
        // Fire-and-forget per-item callbacks may land out of order, so the
        // stored progress only ever moves forward.
        let result = sqlx::query(
            "UPDATE books SET progress = GREATEST(progress, $2), \
             current_step = COALESCE($3, current_step), updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(progress)
        .bind(current_step)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_processing_started(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET processing_started_at = $2, processing_completed_at = NULL, \
             error = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_completed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET status = 'completed', progress = 100, current_step = 'completed', \
             processing_completed_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET status = 'failed', error = $2, processing_completed_at = $3, \
             updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
