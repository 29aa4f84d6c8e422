//! Query execution helpers
//!
//! Binds collected parameters in order and races every statement against
//! the caller's cancellation token so a disconnected client or a shutdown
//! stops occupying pooled connections.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tokio_util::sync::CancellationToken;

use super::types::{QueryError, SqlArgument};

/// Bind arguments positionally, matching the `$n` indices they were
/// assigned during compilation
pub fn bind_arguments<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [SqlArgument],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            SqlArgument::Text(s) => query.bind(s),
            SqlArgument::Int(i) => query.bind(i),
            SqlArgument::Float(f) => query.bind(f),
            SqlArgument::Bool(b) => query.bind(b),
            SqlArgument::Timestamp(t) => query.bind(t),
            SqlArgument::TextArray(v) => query.bind(v),
            SqlArgument::IntArray(v) => query.bind(v),
        };
    }
    query
}

/// Run a data query and collect all rows
pub async fn fetch_all(
    pool: &PgPool,
    cancel: &CancellationToken,
    sql: &str,
    args: &[SqlArgument],
) -> Result<Vec<PgRow>, QueryError> {
    tracing::trace!(sql, params = args.len(), "Executing list query");
    let query = bind_arguments(sqlx::query(sql), args);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(QueryError::Cancelled),
        rows = query.fetch_all(pool) => Ok(rows?),
    }
}

/// Run a count query returning a single bigint
pub async fn fetch_count(
    pool: &PgPool,
    cancel: &CancellationToken,
    sql: &str,
    args: &[SqlArgument],
) -> Result<u64, QueryError> {
    tracing::trace!(sql, params = args.len(), "Executing count query");
    let query = bind_arguments(sqlx::query(sql), args);
    let row = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(QueryError::Cancelled),
        row = query.fetch_one(pool) => row?,
    };
    let total: i64 = row.try_get(0)?;
    Ok(total.max(0) as u64)
}
