//! Chapter repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pith_core::{Chapter, ChapterRepository, NewChapter, Result};

/// PostgreSQL implementation of `ChapterRepository`.
pub struct PgChapterRepository {
    pool: Pool<Postgres>,
}

impl PgChapterRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Chapter {
        let key_insights: Option<serde_json::Value> = row.get("key_insights");
        Chapter {
            id: row.get("id"),
            book_id: row.get("book_id"),
            order_index: row.get("order_index"),
            title: row.get("title"),
            level: row.get("level"),
            original_content: row.get("original_content"),
            original_token_count: row.get("original_token_count"),
            compressed_content: row.get("compressed_content"),
            key_insights: key_insights.and_then(|v| serde_json::from_value(v).ok()),
            compressed_token_count: row.get("compressed_token_count"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ChapterRepository for PgChapterRepository {
    async fn insert_many(&self, book_id: Uuid, chapters: Vec<NewChapter>) -> Result<Vec<Uuid>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(chapters.len());

        for chapter in chapters {
            let id = Uuid::now_v7();
            sqlx::query(
                "INSERT INTO chapters (id, book_id, order_index, title, level, original_content, \
                 original_token_count, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)",
            )
            .bind(id)
            .bind(book_id)
            .bind(chapter.order_index)
            .bind(&chapter.title)
            .bind(chapter.level)
            .bind(&chapter.original_content)
            .bind(chapter.original_token_count)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(
            "SELECT id, book_id, order_index, title, level, original_content, \
             original_token_count, compressed_content, key_insights, compressed_token_count, \
             created_at, updated_at \
             FROM chapters WHERE book_id = $1 ORDER BY order_index",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn set_compressed(
        &self,
        id: Uuid,
        compressed_content: &str,
        key_insights: &[String],
        compressed_token_count: i32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE chapters SET compressed_content = $2, key_insights = $3, \
             compressed_token_count = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(compressed_content)
        .bind(serde_json::to_value(key_insights)?)
        .bind(compressed_token_count)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
