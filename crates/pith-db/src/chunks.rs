//! Chunk repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pith_core::{Chunk, ChunkRepository, NewChunk, Result};

/// PostgreSQL implementation of `ChunkRepository`.
pub struct PgChunkRepository {
    pool: Pool<Postgres>,
}

impl PgChunkRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Chunk {
        Chunk {
            id: row.get("id"),
            book_id: row.get("book_id"),
            order_index: row.get("order_index"),
            text: row.get("text"),
            token_count: row.get("token_count"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    async fn insert_many(&self, book_id: Uuid, chunks: Vec<NewChunk>) -> Result<Vec<Uuid>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let id = Uuid::now_v7();
            sqlx::query(
                "INSERT INTO chunks (id, book_id, order_index, text, token_count, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(id)
            .bind(book_id)
            .bind(chunk.order_index)
            .bind(&chunk.text)
            .bind(chunk.token_count)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, book_id, order_index, text, token_count, created_at \
             FROM chunks WHERE book_id = $1 ORDER BY order_index",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
