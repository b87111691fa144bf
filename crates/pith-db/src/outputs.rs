//! Final output repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pith_core::{FinalOutput, OutputRepository, Result};

/// PostgreSQL implementation of `OutputRepository`.
pub struct PgOutputRepository {
    pool: Pool<Postgres>,
}

impl PgOutputRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> FinalOutput {
        FinalOutput {
            id: row.get("id"),
            book_id: row.get("book_id"),
            markdown: row.get("markdown"),
            word_count: row.get("word_count"),
            idea_count: row.get("idea_count"),
            compression_ratio: row.get("compression_ratio"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl OutputRepository for PgOutputRepository {
    async fn upsert(
        &self,
        book_id: Uuid,
        markdown: &str,
        word_count: i32,
        idea_count: i32,
        compression_ratio: Option<f32>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        // book_id is unique; a rerun replaces the previous output in place.
        let stored_id: Uuid = sqlx::query_scalar(
            "INSERT INTO final_outputs (id, book_id, markdown, word_count, idea_count, \
             compression_ratio, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (book_id) DO UPDATE SET markdown = EXCLUDED.markdown, \
             word_count = EXCLUDED.word_count, idea_count = EXCLUDED.idea_count, \
             compression_ratio = EXCLUDED.compression_ratio, updated_at = EXCLUDED.updated_at \
             RETURNING id",
        )
        .bind(id)
        .bind(book_id)
        .bind(markdown)
        .bind(word_count)
        .bind(idea_count)
        .bind(compression_ratio)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored_id)
    }

    async fn fetch_for_book(&self, book_id: Uuid) -> Result<Option<FinalOutput>> {
        let row = sqlx::query(
            "SELECT id, book_id, markdown, word_count, idea_count, compression_ratio, \
             created_at, updated_at FROM final_outputs WHERE book_id = $1",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Self::parse_row))
    }
}
