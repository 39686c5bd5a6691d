//! PostgreSQL implementation of the [`Database`] port.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, PgConnection, PgPool, Row};
use tracing::{debug, info, warn};

use super::{Database, DbError, DbResult};
use crate::config::{ConnectionSource, DatabaseSettings};

/// [`Database`] backed by a sqlx PostgreSQL pool.
///
/// Every operation borrows one pooled connection for its duration and
/// returns it on drop, so no connection or transaction outlives the call.
pub struct PgDatabase {
    pool: PgPool,
    identity: String,
}

impl PgDatabase {
    /// Connect to the database described by `source`.
    pub async fn connect(source: &ConnectionSource, settings: &DatabaseSettings) -> DbResult<Self> {
        let options = connect_options(source)?;
        let identity = identity_of(&options);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        info!(%identity, "connected to database");
        Ok(Self { pool, identity })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, identity: impl Into<String>) -> Self {
        Self {
            pool,
            identity: identity.into(),
        }
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn fetch_pairs(&self, sql: &str, table: &str) -> DbResult<Vec<(String, String)>> {
        let rows = sqlx::query(sql).bind(table).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> DbResult<(String, String)> {
                Ok((row.try_get(0)?, row.try_get(1)?))
            })
            .collect()
    }

    async fn prepare(&self, statement: &str) -> DbResult<()> {
        let script = PrepareScript::new();

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let (prepared, deallocated) = script.run(&mut tx, statement).await;
        let outcome = PrepareOutcome {
            prepared,
            deallocated,
            rolled_back: tx.rollback().await,
        };

        if outcome.disposition() == Disposition::Close {
            // The statement may still exist on this session.
            warn!(
                statement = %script.name,
                deallocate = ?outcome.deallocated,
                rollback = ?outcome.rolled_back,
                "prepare cleanup failed, closing connection"
            );
            if let Err(err) = conn.detach().close().await {
                warn!(statement = %script.name, error = %err, "failed to close connection");
            }
        }

        outcome.into_result().map_err(|err| {
            debug!(error = %err, "statement rejected by server");
            err
        })
    }

    async fn explain_analyze(&self, statement: &str) -> DbResult<Vec<String>> {
        let sql = explain_sql(statement);

        let mut tx = self.pool.begin().await?;
        let rows = fetch_lines(&mut tx, &sql).await;
        // Rolled back so data-modifying statements leave no trace.
        tx.rollback().await?;

        Ok(rows?)
    }
}

/// Run one statement over the extended protocol, which refuses text
/// holding more than one command.
async fn execute_one(conn: &mut PgConnection, sql: &str) -> Result<(), sqlx::Error> {
    sqlx::query(sql)
        .persistent(false)
        .execute(&mut *conn)
        .await
        .map(|_| ())
}

async fn fetch_lines(conn: &mut PgConnection, sql: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(sql)
        .persistent(false)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(|row| row.try_get::<String, _>(0)).collect()
}

/// The `PREPARE`/`DEALLOCATE` pair used to check one statement.
struct PrepareScript {
    name: String,
}

impl PrepareScript {
    fn new() -> Self {
        Self::named(format!("precinct_{}", uuid::Uuid::new_v4().simple()))
    }

    fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn prepare_sql(&self, statement: &str) -> String {
        format!("PREPARE {} AS {}", self.name, trim_statement(statement))
    }

    fn deallocate_sql(&self) -> String {
        format!("DEALLOCATE {}", self.name)
    }

    /// Prepare, then deallocate only if the prepare succeeded.
    async fn run(
        &self,
        conn: &mut PgConnection,
        statement: &str,
    ) -> (Result<(), sqlx::Error>, Result<(), sqlx::Error>) {
        let prepared = execute_one(conn, &self.prepare_sql(statement)).await;
        let deallocated = match prepared {
            Ok(()) => execute_one(conn, &self.deallocate_sql()).await,
            Err(_) => Ok(()),
        };
        (prepared, deallocated)
    }
}

/// What happens to a connection once a prepare check is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Return,
    Close,
}

/// Results of each step of a prepare check.
struct PrepareOutcome {
    prepared: Result<(), sqlx::Error>,
    deallocated: Result<(), sqlx::Error>,
    rolled_back: Result<(), sqlx::Error>,
}

impl PrepareOutcome {
    /// A session whose cleanup failed may still hold the statement or an
    /// open transaction, so it is never returned to the pool.
    fn disposition(&self) -> Disposition {
        if self.deallocated.is_err() || self.rolled_back.is_err() {
            Disposition::Close
        } else {
            Disposition::Return
        }
    }

    /// The first failing step decides the error.
    fn into_result(self) -> DbResult<()> {
        self.prepared
            .and(self.deallocated)
            .and(self.rolled_back)
            .map_err(DbError::from)
    }
}

/// Strip trailing whitespace and semicolons so the text can be embedded.
fn trim_statement(statement: &str) -> &str {
    statement.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn explain_sql(statement: &str) -> String {
    format!("EXPLAIN ANALYZE {}", trim_statement(statement))
}

fn connect_options(source: &ConnectionSource) -> DbResult<PgConnectOptions> {
    match source {
        ConnectionSource::Uri(uri) => Ok(PgConnectOptions::from_str(uri)?),
        ConnectionSource::Params(config) => {
            let mut options = PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .database(&config.database);
            if let Some(password) = &config.password {
                options = options.password(password);
            }
            if let Some(mode) = &config.sslmode {
                options = options.ssl_mode(PgSslMode::from_str(mode)?);
            }
            Ok(options)
        }
    }
}

fn identity_of(options: &PgConnectOptions) -> String {
    format!(
        "{}@{}:{}/{}",
        options.get_username(),
        options.get_host(),
        options.get_port(),
        options.get_database().unwrap_or_default()
    )
}
