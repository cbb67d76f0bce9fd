use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge, histogram};
use futures::future::BoxFuture;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QuerySelect, Select, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
///
/// SQLite in-memory databases are pinned to a single connection so every
/// query sees the same schema.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let in_memory_sqlite = config.url.starts_with("sqlite::memory:");
    let (max, min) = if in_memory_sqlite {
        (1, 1)
    } else {
        (config.max_connections, config.min_connections)
    };

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max)
        .min_connections(min)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);
    if !in_memory_sqlite {
        opt.idle_timeout(config.idle_timeout);
    }

    gauge!("windowworks_db.max_connections", max as f64);
    info!("Connecting to database with max_connections={}", max);

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        counter!("windowworks_db.connection_failures", 1);
        ServiceError::DatabaseError(e)
    })?;

    info!(backend = ?db_pool.get_database_backend(), "Database connection pool established successfully");
    Ok(db_pool)
}

/// Establishes a pool with default tuning.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Runs the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed successfully in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = std::time::Instant::now();
    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            histogram!("windowworks_db.connection_latency", elapsed);
        }
        Err(e) => {
            error!("Database connection check failed after {:?}: {}", elapsed, e);
            counter!("windowworks_db.connection_failures", 1);
        }
    }

    result
}

/// Whether row locks (`SELECT ... FOR UPDATE`) are supported by the backend.
pub fn supports_row_locks(backend: DbBackend) -> bool {
    matches!(backend, DbBackend::Postgres | DbBackend::MySql)
}

/// Adds `FOR UPDATE` to `select` when the backend supports it. SQLite
/// serializes writers, so the plain select is kept there.
pub fn for_update<E: EntityTrait>(select: Select<E>, backend: DbBackend) -> Select<E> {
    if supports_row_locks(backend) {
        select.lock_exclusive()
    } else {
        select
    }
}

/// Runs `f` inside a transaction. Commits on `Ok`; an `Err` drops the
/// transaction, which rolls it back.
///
/// ```rust,ignore
/// let order = with_transaction(&db, move |txn| {
///     Box::pin(async move {
///         let number = next_number(txn, DocumentScope::Order, 2025).await?;
///         insert_order(txn, number).await
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<T, F>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>>,
{
    let txn = db.begin().await.map_err(|e| {
        error!("Failed to begin transaction: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    let value = f(&txn).await?;

    txn.commit().await.map_err(|e| {
        error!("Failed to commit transaction: {}", e);
        ServiceError::DatabaseError(e)
    })?;
    Ok(value)
}
