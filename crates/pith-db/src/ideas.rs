//! Idea repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pith_core::{Idea, IdeaRepository, NewIdea, Result};

/// PostgreSQL implementation of `IdeaRepository`.
pub struct PgIdeaRepository {
    pool: Pool<Postgres>,
}

impl PgIdeaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Idea {
        let merged_claims: serde_json::Value = row.get("merged_claims");
        let examples: Option<serde_json::Value> = row.get("examples");
        Idea {
            id: row.get("id"),
            book_id: row.get("book_id"),
            order_index: row.get("order_index"),
            title: row.get("title"),
            merged_claims: serde_json::from_value(merged_claims).unwrap_or_default(),
            principle: row.get("principle"),
            behavior_delta: row.get("behavior_delta"),
            examples: examples.and_then(|v| serde_json::from_value(v).ok()),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl IdeaRepository for PgIdeaRepository {
    async fn delete_for_book(&self, book_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ideas WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_many(&self, book_id: Uuid, ideas: Vec<NewIdea>) -> Result<Vec<Uuid>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(ideas.len());

        for idea in ideas {
            let id = Uuid::now_v7();
            let examples = idea
                .examples
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?;
            sqlx::query(
                "INSERT INTO ideas (id, book_id, order_index, title, merged_claims, principle, \
                 behavior_delta, examples, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)",
            )
            .bind(id)
            .bind(book_id)
            .bind(idea.order_index)
            .bind(&idea.title)
            .bind(serde_json::to_value(&idea.merged_claims)?)
            .bind(&idea.principle)
            .bind(&idea.behavior_delta)
            .bind(examples)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn list_for_book(&self, book_id: Uuid) -> Result<Vec<Idea>> {
        let rows = sqlx::query(
            "SELECT id, book_id, order_index, title, merged_claims, principle, behavior_delta, \
             examples, created_at, updated_at \
             FROM ideas WHERE book_id = $1 ORDER BY order_index",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
