//! # rolo-db
//!
//! PostgreSQL storage for rolodex.
//!
//! This crate provides:
//! - Connection pool management
//! - Contact and pending-review repositories
//! - SQL compilation of validated natural-language queries
//! - In-memory stores with the same contracts, for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use rolo_db::Database;
//!
//! let db = Database::connect("postgres://localhost/rolo").await?;
//! let contacts = db.contacts.list_by_owner("user_1").await?;
//! ```

pub mod contacts;
pub mod memory;
pub mod pool;
pub mod query_filter;
pub mod reviews;

// Re-export core types
pub use rolo_core::*;

pub use contacts::PgContactRepository;
pub use memory::{MemoryContactStore, MemoryReviewStore};
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use query_filter::{ContactQueryBuilder, QueryParam, CONTACT_COLUMNS};
pub use reviews::PgPendingReviewRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub contacts: PgContactRepository,
    pub reviews: PgPendingReviewRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            contacts: PgContactRepository::new(pool.clone()),
            reviews: PgPendingReviewRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the given URL and pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect with default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    /// Connect using `DATABASE_URL` and pool settings from the environment.
    pub async fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| rolo_core::defaults::DATABASE_URL.to_string());
        Self::connect_with_config(&url, PoolConfig::from_env()).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
