//! Retry-wrapped access to the relational store.
//!
//! Repositories never touch the pool directly. They call
//! [`DataStore::query`], which runs the statement through the shared
//! [`retry_if`] combinator and collapses exhausted infrastructure faults
//! into a single [`CoreError::Infrastructure`].

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};

use jobtrail_core::error::CoreError;
use jobtrail_core::retry::{retry_if, RetryError, RetryPolicy};

use crate::value::{Row, RowSet, SqlValue};
use crate::DbPool;

// ---------------------------------------------------------------------------
// Executor seam
// ---------------------------------------------------------------------------

/// Failure of a single statement execution.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Connection or execution fault; worth another attempt.
    #[error("transient database failure: {0}")]
    Transient(String),

    /// The store rejected the data (SQLSTATE class 23).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Bad statement, rejected data or credentials, or undecodable result;
    /// retrying cannot help.
    #[error("malformed query or result: {0}")]
    Malformed(String),
}

impl QueryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a server error by its SQLSTATE class.
    ///
    /// 23 is a constraint violation. 22 (data exception), 28 (invalid
    /// authorization) and 42 (syntax or access rule) are never fixed by
    /// retrying. Anything else is treated as transient.
    fn from_sqlstate(code: &str, message: String) -> Self {
        match code.get(..2) {
            Some("23") => Self::Constraint(message),
            Some("22") | Some("28") | Some("42") => Self::Malformed(message),
            _ => Self::Transient(message),
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                Self::from_sqlstate(&code, db_err.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => Self::Malformed(err.to_string()),
            _ => Self::Transient(err.to_string()),
        }
    }
}

/// Executes one parameterized statement against a relational store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet, QueryError>;
}

// ---------------------------------------------------------------------------
// Postgres executor
// ---------------------------------------------------------------------------

/// [`QueryExecutor`] backed by a shared sqlx Postgres pool.
#[derive(Clone)]
pub struct PgExecutor {
    pool: DbPool,
}

impl PgExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet, QueryError> {
        let query = params.iter().fold(sqlx::query(sql), bind_param);

        if returns_rows(sql) {
            let rows = query.fetch_all(&self.pool).await?;
            let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
            Ok(RowSet::from_rows(rows))
        } else {
            let result = query.execute(&self.pool).await?;
            Ok(RowSet::affected(result.rows_affected()))
        }
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

/// Whether a statement yields rows (`SELECT`, `WITH`, or `... RETURNING`).
fn returns_rows(sql: &str) -> bool {
    let mut words = sql.split_whitespace().map(str::to_ascii_uppercase);
    match words.next().as_deref() {
        Some("SELECT") | Some("WITH") => true,
        Some(_) => words.any(|w| w == "RETURNING"),
        None => false,
    }
}

fn decode_row(row: &PgRow) -> Result<Row, QueryError> {
    let mut out = Row::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let name = column.name();

        if row.try_get_raw(idx)?.is_null() {
            out.push(name, SqlValue::Null);
            continue;
        }

        let value = match column.type_info().name() {
            "INT2" => SqlValue::Int(row.try_get::<i16, _>(idx)?.into()),
            "INT4" => SqlValue::Int(row.try_get::<i32, _>(idx)?.into()),
            "INT8" => SqlValue::Int(row.try_get::<i64, _>(idx)?),
            "BOOL" => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                SqlValue::Text(row.try_get::<String, _>(idx)?)
            }
            "UUID" => SqlValue::Text(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
            "TIMESTAMPTZ" => SqlValue::Timestamp(row.try_get(idx)?),
            other => {
                return Err(QueryError::Malformed(format!(
                    "unsupported column type {other} for '{name}'"
                )))
            }
        };
        out.push(name, value);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Statement used by [`DataStore::ping`].
pub const PING: &str = "SELECT 1";

/// The relational-store gateway shared by every repository.
///
/// Cheap to clone; the executor is behind an `Arc`.
#[derive(Clone)]
pub struct DataStore {
    executor: Arc<dyn QueryExecutor>,
    policy: RetryPolicy,
}

impl DataStore {
    pub fn new(executor: Arc<dyn QueryExecutor>, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    /// Gateway over a Postgres pool.
    pub fn postgres(pool: DbPool, policy: RetryPolicy) -> Self {
        Self::new(Arc::new(PgExecutor::new(pool)), policy)
    }

    /// Single unretried round trip, for health probes.
    pub async fn ping(&self) -> bool {
        match self.executor.execute(PING, &[]).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "Database ping failed");
                false
            }
        }
    }

    /// Run one parameterized statement.
    ///
    /// Zero rows is a normal result. Transient faults are retried under the
    /// gateway's policy; once the budget is spent the cause is logged and the
    /// caller receives `CoreError::Infrastructure { resource: "database" }`.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet, CoreError> {
        let executor = self.executor.as_ref();

        retry_if(
            &self.policy,
            "database query",
            move || executor.execute(sql, params),
            QueryError::is_transient,
        )
        .await
        .map_err(|err| match err {
            RetryError::Exhausted { attempts, error } => {
                tracing::error!(attempts, error = %error, "Database unavailable after retries");
                CoreError::Infrastructure {
                    resource: "database",
                }
            }
            RetryError::Permanent {
                error: QueryError::Constraint(msg),
                ..
            } => {
                tracing::warn!(error = %msg, "Database constraint violation");
                CoreError::Conflict("Record conflicts with an existing entry".into())
            }
            RetryError::Permanent { error, .. } => {
                tracing::error!(error = %error, "Database query rejected");
                CoreError::Internal("Database query failed".into())
            }
        })
    }
}
