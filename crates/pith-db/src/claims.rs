//! Claim repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use pith_core::{Claim, ClaimLabel, ClaimRepository, ClaimType, ClaimVerdict, NewClaim, Result};

/// PostgreSQL implementation of `ClaimRepository`.
pub struct PgClaimRepository {
    pool: Pool<Postgres>,
}

impl PgClaimRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Claim {
        let claim_type: String = row.get("claim_type");
        let label: Option<String> = row.get("label");
        Claim {
            id: row.get("id"),
            book_id: row.get("book_id"),
            chunk_id: row.get("chunk_id"),
            text: row.get("text"),
            claim_type: ClaimType::parse(&claim_type).unwrap_or(ClaimType::Principle),
            label: label.as_deref().and_then(ClaimLabel::parse),
            score: row.get("score"),
            reason: row.get("reason"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const SELECT_CLAIM: &str = "SELECT id, book_id, chunk_id, text, claim_type, label, score, \
     reason, created_at, updated_at FROM claims";

#[async_trait]
impl ClaimRepository for PgClaimRepository {
    async fn insert_many(&self, book_id: Uuid, claims: Vec<NewClaim>) -> Result<Vec<Uuid>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(claims.len());

        for claim in claims {
            let id = Uuid::now_v7();
            sqlx::query(
                "INSERT INTO claims (id, book_id, chunk_id, text, claim_type, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $6)",
            )
            .bind(id)
            .bind(book_id)
            .bind(claim.chunk_id)
            .bind(&claim.text)
            .bind(claim.claim_type.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn count_for_book(&self, book_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claims WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_unlabeled(&self, book_id: Uuid) -> Result<Vec<Claim>> {
        let rows = sqlx::query(&format!(
            "{} WHERE book_id = $1 AND label IS NULL ORDER BY created_at",
            SELECT_CLAIM
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn list_kept(&self, book_id: Uuid) -> Result<Vec<Claim>> {
        let rows = sqlx::query(&format!(
            "{} WHERE book_id = $1 AND label IN ('core_insight', 'supporting_insight') \
             ORDER BY score DESC NULLS LAST",
            SELECT_CLAIM
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn apply_verdict(&self, id: Uuid, verdict: ClaimVerdict) -> Result<()> {
        sqlx::query(
            "UPDATE claims SET label = $2, score = $3, reason = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(verdict.label.as_str())
        .bind(verdict.score)
        .bind(&verdict.reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
