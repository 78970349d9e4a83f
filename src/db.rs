use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    DbErr, ExecResult, QueryResult, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
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

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(ServiceError::from)?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies all pending migrations
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), ServiceError> {
    crate::migrator::Migrator::up(db, None)
        .await
        .map_err(ServiceError::from)?;
    info!("Database migrations applied");
    Ok(())
}

/// True when the error is the store's uniqueness-constraint signal.
/// Code-generation retries key off this, never off read-then-write checks.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

/// Whether the backing store supports multi-statement transactions.
///
/// Resolved once at startup and injected into every service through
/// [`UnitOfWork`]; never re-probed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnCapability {
    /// Full atomic-transaction mode: abort rolls back every write.
    Transactional,
    /// Degraded best-effort mode: writes are applied in order against the
    /// plain connection; commit and abort are no-ops.
    PassThrough,
}

/// Explicit unit-of-work handle over the shared pool.
#[derive(Clone)]
pub struct UnitOfWork {
    db: Arc<DatabaseConnection>,
    capability: TxnCapability,
}

impl UnitOfWork {
    pub fn new(db: Arc<DatabaseConnection>, capability: TxnCapability) -> Self {
        Self { db, capability }
    }

    /// Probes the store once for transaction support. `force_degraded`
    /// pins the pass-through mode regardless of the probe result.
    pub async fn detect(db: Arc<DatabaseConnection>, force_degraded: bool) -> Self {
        if force_degraded {
            warn!("transaction support disabled by configuration; running in degraded mode");
            return Self::new(db, TxnCapability::PassThrough);
        }
        let capability = match db.begin().await {
            Ok(probe) => {
                if let Err(e) = probe.rollback().await {
                    warn!(error = %e, "failed to roll back capability probe");
                }
                TxnCapability::Transactional
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "store does not support multi-statement transactions; running in degraded mode"
                );
                TxnCapability::PassThrough
            }
        };
        info!(?capability, "resolved store transaction capability");
        Self::new(db, capability)
    }

    pub fn capability(&self) -> TxnCapability {
        self.capability
    }

    /// Plain connection for reads outside a unit of work.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn pool(&self) -> Arc<DatabaseConnection> {
        self.db.clone()
    }

    /// Opens a unit of work. In degraded mode this hands back the plain
    /// connection and the commit/abort calls become no-ops.
    pub async fn begin(&self) -> Result<LedgerTxn, DbErr> {
        match self.capability {
            TxnCapability::Transactional => Ok(LedgerTxn::Transactional(self.db.begin().await?)),
            TxnCapability::PassThrough => Ok(LedgerTxn::PassThrough(self.db.clone())),
        }
    }
}

/// A single atomic (or best-effort) unit of work.
///
/// Implements [`ConnectionTrait`] by delegation so entity operations run
/// unchanged against either mode.
pub enum LedgerTxn {
    Transactional(DatabaseTransaction),
    PassThrough(Arc<DatabaseConnection>),
}

impl LedgerTxn {
    pub async fn commit(self) -> Result<(), DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => txn.commit().await,
            LedgerTxn::PassThrough(_) => Ok(()),
        }
    }

    pub async fn abort(self) -> Result<(), DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => txn.rollback().await,
            LedgerTxn::PassThrough(_) => Ok(()),
        }
    }

    /// Nested scope for operations that may fail without poisoning the
    /// enclosing transaction (a savepoint when transactional).
    pub async fn savepoint(&self) -> Result<LedgerTxn, DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => Ok(LedgerTxn::Transactional(txn.begin().await?)),
            LedgerTxn::PassThrough(db) => Ok(LedgerTxn::PassThrough(db.clone())),
        }
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self, LedgerTxn::Transactional(_))
    }
}

#[async_trait::async_trait]
impl ConnectionTrait for LedgerTxn {
    fn get_database_backend(&self) -> DbBackend {
        match self {
            LedgerTxn::Transactional(txn) => txn.get_database_backend(),
            LedgerTxn::PassThrough(db) => db.get_database_backend(),
        }
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => txn.execute(stmt).await,
            LedgerTxn::PassThrough(db) => db.execute(stmt).await,
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => txn.execute_unprepared(sql).await,
            LedgerTxn::PassThrough(db) => db.execute_unprepared(sql).await,
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => txn.query_one(stmt).await,
            LedgerTxn::PassThrough(db) => db.query_one(stmt).await,
        }
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        match self {
            LedgerTxn::Transactional(txn) => txn.query_all(stmt).await,
            LedgerTxn::PassThrough(db) => db.query_all(stmt).await,
        }
    }
}
