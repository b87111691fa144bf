//! # pith-db
//!
//! PostgreSQL persistence layer for the pith book-distillation service.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for all core entities
//! - The `Database` aggregate implementing `pith_core::Store`
//!
//! ## Example
//!
//! ```rust,ignore
//! use pith_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/pith").await?;
//!     db.migrate().await?;
//!     let books = db.books.list_for_user(user_id).await?;
//!     Ok(())
//! }
//! ```

pub mod books;
pub mod chapters;
pub mod chunks;
pub mod claims;
pub mod ideas;
pub mod outputs;
pub mod pool;
pub mod users;

// Re-export core types
pub use pith_core::*;

pub use books::PgBookRepository;
pub use chapters::PgChapterRepository;
pub use chunks::PgChunkRepository;
pub use claims::PgClaimRepository;
pub use ideas::PgIdeaRepository;
pub use outputs::PgOutputRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use users::PgUserRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub users: PgUserRepository,
    pub books: PgBookRepository,
    pub chunks: PgChunkRepository,
    pub chapters: PgChapterRepository,
    pub claims: PgClaimRepository,
    pub ideas: PgIdeaRepository,
    pub outputs: PgOutputRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            books: PgBookRepository::new(pool.clone()),
            chunks: PgChunkRepository::new(pool.clone()),
            chapters: PgChapterRepository::new(pool.clone()),
            claims: PgClaimRepository::new(pool.clone()),
            ideas: PgIdeaRepository::new(pool.clone()),
            outputs: PgOutputRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl Store for Database {
    fn books(&self) -> &dyn BookRepository {
        &self.books
    }

    fn chunks(&self) -> &dyn ChunkRepository {
        &self.chunks
    }

    fn chapters(&self) -> &dyn ChapterRepository {
        &self.chapters
    }

    fn claims(&self) -> &dyn ClaimRepository {
        &self.claims
    }

    fn ideas(&self) -> &dyn IdeaRepository {
        &self.ideas
    }

    fn outputs(&self) -> &dyn OutputRepository {
        &self.outputs
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }
}
