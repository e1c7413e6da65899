use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{
    sqlx::sqlite::SqliteJournalMode, ConnectOptions, ConnectionTrait, Database,
    DatabaseBackend, DatabaseConnection, DatabaseTransaction, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
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

/// Opens the pool described by `config`.
///
/// # Errors
/// `ServiceError::DatabaseError` when the first connection cannot be made.
pub async fn connect(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);
    if config.url.starts_with("sqlite:") {
        // Writers queue on the database lock instead of failing with SQLITE_BUSY
        let busy_timeout = config.acquire_timeout;
        opt.map_sqlx_sqlite_opts(move |o| {
            o.journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(busy_timeout)
        });
    }

    gauge!("refill_station_db.max_connections", config.max_connections as f64);
    debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Opening database pool"
    );

    let pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "Could not open database pool");
        counter!("refill_station_db.connection_failures", 1);
        ServiceError::DatabaseError(e)
    })?;

    info!(backend = ?pool.get_database_backend(), "Database pool ready");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    connect(&DbConfig::from(cfg)).await
}

/// Statement that takes SQLite's write lock without changing anything.
const SQLITE_WRITE_LOCK: &str = "UPDATE seaql_migrations SET version = version WHERE 0";

/// Opens a write transaction on `pool`, logging and mapping a failure to
/// start one.
///
/// On SQLite the write lock is taken up front, as `BEGIN IMMEDIATE` does, so
/// concurrent writers queue instead of failing with `SQLITE_BUSY`.
pub async fn begin(pool: &DbPool, operation: &str) -> Result<DatabaseTransaction, ServiceError> {
    counter!("refill_station_db.transaction.started", 1);
    let txn = pool.begin().await.map_err(|e| {
        error!(error = %e, operation, "Failed to start transaction");
        ServiceError::DatabaseError(e)
    })?;
    if txn.get_database_backend() == DatabaseBackend::Sqlite {
        txn.execute_unprepared(SQLITE_WRITE_LOCK).await.map_err(|e| {
            error!(error = %e, operation, "Failed to take the database write lock");
            ServiceError::DatabaseError(e)
        })?;
    }
    Ok(txn)
}

/// Commits `txn`, logging and mapping a failure.
pub async fn commit(txn: DatabaseTransaction, operation: &str) -> Result<(), ServiceError> {
    txn.commit().await.map_err(|e| {
        error!(error = %e, operation, "Failed to commit transaction");
        counter!("refill_station_db.transaction.rolled_back", 1);
        ServiceError::DatabaseError(e)
    })?;
    counter!("refill_station_db.transaction.committed", 1);
    Ok(())
}

/// Applies pending schema migrations. Already-applied ones are skipped.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(|e| {
            error!(error = %e, elapsed = ?started.elapsed(), "Migrations failed");
            ServiceError::MigrationError(e.to_string())
        })?;
    info!(elapsed = ?started.elapsed(), "Migrations applied");
    Ok(())
}

/// Round-trips to the database, recording latency.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match pool.ping().await {
        Ok(()) => {
            gauge!(
                "refill_station_db.connection_latency",
                started.elapsed().as_millis() as f64
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Database ping failed");
            counter!("refill_station_db.connection_failures", 1);
            Err(ServiceError::DatabaseError(e))
        }
    }
}
