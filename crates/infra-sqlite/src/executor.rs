// Statement execution on a pooled connection
//
// Every statement is checked against its declared parameters before it is sent,
// bounded by the statement timeout, and flagged in flight while it runs so a
// cancelled caller never returns a half-used connection to the pool.

use std::time::Duration;

use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use tracing::{trace, warn};

use crate::connection::SqlitePooledConnection;
use blogstore_core::error::{AppError, Result};
use blogstore_core::mapper::{format_timestamp, Row, SqlValue};
use blogstore_core::statement::{Params, Statement};

/// Result of a data-changing statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Done {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

pub struct Executor<'c> {
    conn: &'c mut SqlitePooledConnection,
    timeout: Duration,
}

impl<'c> Executor<'c> {
    pub fn new(conn: &'c mut SqlitePooledConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    pub async fn fetch_all(&mut self, stmt: &Statement, params: &Params) -> Result<Vec<Row>> {
        stmt.check(params)?;
        trace!(sql = stmt.sql(), "fetch_all");

        self.conn.set_in_flight(true);
        let outcome =
            tokio::time::timeout(self.timeout, bind(stmt.sql(), params).fetch_all(&mut **self.conn))
                .await;
        self.conn.set_in_flight(false);

        let rows = self.settle(outcome, stmt.sql())?;
        rows.iter().map(convert_row).collect()
    }

    pub async fn fetch_optional(&mut self, stmt: &Statement, params: &Params) -> Result<Option<Row>> {
        stmt.check(params)?;
        trace!(sql = stmt.sql(), "fetch_optional");

        self.conn.set_in_flight(true);
        let outcome = tokio::time::timeout(
            self.timeout,
            bind(stmt.sql(), params).fetch_optional(&mut **self.conn),
        )
        .await;
        self.conn.set_in_flight(false);

        match self.settle(outcome, stmt.sql())? {
            Some(row) => Ok(Some(convert_row(&row)?)),
            None => Ok(None),
        }
    }

    /// First column of the single row, as an integer (COUNT, EXISTS, ...)
    pub async fn fetch_i64(&mut self, stmt: &Statement, params: &Params) -> Result<i64> {
        let row = self
            .fetch_optional(stmt, params)
            .await?
            .ok_or_else(|| AppError::Database(format!("no row returned: {}", stmt.sql())))?;

        match row.value(0) {
            Some(SqlValue::Integer(v)) => Ok(*v),
            other => Err(AppError::Database(format!(
                "expected integer result, got {:?}",
                other
            ))),
        }
    }

    pub async fn execute(&mut self, stmt: &Statement, params: &Params) -> Result<Done> {
        stmt.check(params)?;
        trace!(sql = stmt.sql(), "execute");

        self.conn.set_in_flight(true);
        let outcome =
            tokio::time::timeout(self.timeout, bind(stmt.sql(), params).execute(&mut **self.conn))
                .await;
        self.conn.set_in_flight(false);

        let result = self.settle(outcome, stmt.sql())?;
        Ok(Done {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Parameterless control statement (BEGIN, COMMIT, ROLLBACK)
    pub async fn control(&mut self, sql: &'static str) -> Result<()> {
        trace!(sql, "control");

        self.conn.set_in_flight(true);
        let outcome =
            tokio::time::timeout(self.timeout, sqlx::query(sql).execute(&mut **self.conn)).await;
        self.conn.set_in_flight(false);

        self.settle(outcome, sql).map(|_| ())
    }

    pub fn connection_mut(&mut self) -> &mut SqlitePooledConnection {
        self.conn
    }

    fn settle<T>(
        &mut self,
        outcome: std::result::Result<std::result::Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
        sql: &str,
    ) -> Result<T> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if is_connection_fault(&err) {
                    warn!(connection_id = self.conn.id(), error = %err, "connection fault, discarding");
                    self.conn.mark_broken();
                }
                Err(map_sqlx_error(err))
            }
            Err(_) => {
                // The statement may still be running inside the driver
                self.conn.mark_broken();
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(connection_id = self.conn.id(), timeout_ms, sql, "statement timed out");
                Err(AppError::StatementTimeout { timeout_ms })
            }
        }
    }
}

fn bind<'q>(
    sql: &'q str,
    params: &'q Params,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Timestamp(ts) => query.bind(format_timestamp(ts)),
        })
}

/// Copy a driver row into the mapper's row form, by runtime storage class
fn convert_row(row: &SqliteRow) -> Result<Row> {
    let mut out = Row::new();

    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index).map_err(map_sqlx_error)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => {
                    SqlValue::Integer(row.try_get_unchecked::<i64, _>(index).map_err(map_sqlx_error)?)
                }
                "REAL" => SqlValue::Real(row.try_get_unchecked::<f64, _>(index).map_err(map_sqlx_error)?),
                "TEXT" => {
                    SqlValue::Text(row.try_get_unchecked::<String, _>(index).map_err(map_sqlx_error)?)
                }
                other => {
                    return Err(AppError::Database(format!(
                        "unsupported storage class {} in column {}",
                        other,
                        column.name()
                    )))
                }
            }
        };
        out.push(column.name(), value);
    }

    Ok(out)
}

/// Failures after which the connection itself cannot be trusted
fn is_connection_fault(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

// Helper to convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            use sqlx::error::ErrorKind;

            match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    return AppError::ConstraintViolation(db_err.message().to_string())
                }
                _ => {}
            }

            // SQLite result codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
                Some("5") | Some("6") | Some("261") | Some("517") | Some("262") => {
                    AppError::ConnectionUnavailable(format!(
                        "database locked: {}",
                        db_err.message()
                    ))
                }
                Some(code) => AppError::Database(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Database(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => AppError::ConnectionUnavailable(err.to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}
