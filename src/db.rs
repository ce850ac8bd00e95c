use crate::config::AppConfig;
use crate::errors::{AppError, ServiceError};
use crate::models::{LineCredentials, LineDbKey};
use metrics::{counter, gauge, histogram};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, QueryResult, Statement,
    StatementBuilder,
};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Clone)]
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
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

// URLs embed credentials, so they stay out of Debug output.
impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Establishes a connection pool to the database
///
/// # Errors
/// Returns an `AppError` if the connection cannot be established
pub async fn establish_connection(database_url: &str) -> Result<DbPool, AppError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns an `AppError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, AppError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("label_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        counter!("label_db.connection_failures", 1);
        ServiceError::ConnectionError(e.to_string())
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
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

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, AppError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Runs the label database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), AppError> {
    debug!("Checking database connection");
    let start = Instant::now();

    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!("label_db.connection_latency", elapsed.as_millis() as f64);
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("label_db.connection_failures", 1);
        }
    }

    result
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), AppError> {
    info!("Closing database connection pool");

    pool.close().await.map_err(ServiceError::DatabaseError)
}

/// Renders a query builder statement for the pool's backend
pub fn build_statement<S: StatementBuilder>(pool: &DbPool, statement: &S) -> Statement {
    pool.get_database_backend().build(statement)
}

/// Wraps raw SQL text for the pool's backend
pub fn raw_statement(pool: &DbPool, sql: impl Into<String>) -> Statement {
    Statement::from_string(pool.get_database_backend(), sql.into())
}

/// Runs a query and returns its first row, if any
pub async fn fetch_first_row(
    pool: &DbPool,
    statement: Statement,
) -> Result<Option<QueryResult>, ServiceError> {
    let start = Instant::now();
    debug!("Executing SQL query: {}", statement.sql);

    let result = pool.query_one(statement).await.map_err(|e| {
        error!("Database error executing query: {}", e);
        counter!("label_db.query.error", 1);
        ServiceError::db_error(e)
    })?;

    let elapsed = start.elapsed();
    histogram!("label_db.query.duration", elapsed);
    debug!("SQL query completed in {:?}", elapsed);

    Ok(result)
}

/// Runs a query and returns every row
pub async fn fetch_all_rows(
    pool: &DbPool,
    statement: Statement,
) -> Result<Vec<QueryResult>, ServiceError> {
    let start = Instant::now();
    debug!("Executing SQL query: {}", statement.sql);

    let rows = pool.query_all(statement).await.map_err(|e| {
        error!("Database error executing query: {}", e);
        counter!("label_db.query.error", 1);
        ServiceError::db_error(e)
    })?;

    let elapsed = start.elapsed();
    histogram!("label_db.query.duration", elapsed);
    debug!(rows = rows.len(), "SQL query completed in {:?}", elapsed);

    Ok(rows)
}

/// Holds at most one production line database connection.
///
/// A new pool is opened only when the requested server/database pair differs
/// from the cached one; the previous pool is closed first.
pub struct LineConnectionCache {
    url_template: String,
    pool_config: DbConfig,
    current: Option<(LineDbKey, DbPool)>,
}

impl LineConnectionCache {
    pub fn new(url_template: impl Into<String>, pool_config: DbConfig) -> Self {
        Self {
            url_template: url_template.into(),
            pool_config,
            current: None,
        }
    }

    /// The connected line database, if any
    pub fn current(&self) -> Option<&DbPool> {
        self.current.as_ref().map(|(_, pool)| pool)
    }

    pub fn current_key(&self) -> Option<&LineDbKey> {
        self.current.as_ref().map(|(key, _)| key)
    }

    pub async fn connect_to(
        &mut self,
        credentials: &LineCredentials,
    ) -> Result<&DbPool, ServiceError> {
        let key = credentials.key();

        let cached = matches!(&self.current, Some((current, _)) if *current == key);
        if cached {
            debug!(server = %key.server, database = %key.database, "Reusing line database connection");
            counter!("label_db.line_connection.reused", 1);
        } else {
            if let Some((previous, pool)) = self.current.take() {
                info!(
                    server = %previous.server,
                    database = %previous.database,
                    "Closing previous line database connection"
                );
                if let Err(e) = close_pool(pool).await {
                    warn!(error = %e, "Failed to close previous line database connection");
                }
            }

            let config = DbConfig {
                url: credentials.connection_url(&self.url_template),
                ..self.pool_config.clone()
            };

            info!(server = %key.server, database = %key.database, "Connecting to line database");
            let pool = establish_connection_with_config(&config)
                .await
                .map_err(|e| {
                    ServiceError::ConnectionError(format!(
                        "Cannot reach line database {} on {}: {}",
                        key.database, key.server, e
                    ))
                })?;
            counter!("label_db.line_connection.switched", 1);
            self.current = Some((key, pool));
        }

        self.current().ok_or_else(|| {
            ServiceError::InvalidOperation("Line database connection is not available".to_string())
        })
    }

    /// Closes the cached connection, if any
    pub async fn close(&mut self) -> Result<(), ServiceError> {
        match self.current.take() {
            Some((_, pool)) => close_pool(pool).await,
            None => Ok(()),
        }
    }
}
