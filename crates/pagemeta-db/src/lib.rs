//! # pagemeta-db
//!
//! Storage layer for pagemeta.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL entry and visit repositories
//! - In-memory repositories with the same contracts
//! - Per-key locking for concurrent writers of one page path
//!
//! ## Example
//!
//! ```rust,ignore
//! use pagemeta_db::{Database, EntryRepository, MetadataEntry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/pagemeta").await?;
//!     db.migrate().await?;
//!     db.entries.save_entry(MetadataEntry::new("/site/blog/hello")).await?;
//!     Ok(())
//! }
//! ```
pub mod entries;
pub mod locks;
pub mod memory;
pub mod pool;
pub mod visits;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use pagemeta_core::*;

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use entries::PgEntryRepository;
pub use locks::KeyLocks;
pub use memory::{MemoryEntryRepository, MemoryVisitRepository};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use visits::PgVisitRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Metadata entries and their properties.
    pub entries: PgEntryRepository,
    /// Hour-bucketed page visits.
    pub visits: PgVisitRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            entries: PgEntryRepository::new(pool.clone()),
            visits: PgVisitRepository::new(pool.clone()),
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
