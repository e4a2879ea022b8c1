use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::database::{
    DatabaseConfig, DatabaseConnection, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
};

/// Virtual machine instructions between deadline checks while a query runs
const PROGRESS_HANDLER_STEPS: i32 = 1000;

/// SQLite implementation of the database connection interface.
///
/// Wraps exactly one native connection. The handle is released by `close`,
/// or by drop if `close` was never reached.
pub struct SqliteConnection {
    conn: Mutex<Option<sqlx::SqliteConnection>>,
    query_timeout: Duration,
}

impl SqliteConnection {
    /// Open a connection from a configuration
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let options = build_connect_options(config)?;

        let mut conn = options
            .connect()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        for (name, value) in &config.pragmas {
            let pragma = format!("PRAGMA {} = {}", name, value);
            if let Err(e) = sqlx::raw_sql(&pragma).execute(&mut conn).await {
                // The handle is already open; release it before surfacing the failure.
                if let Err(close_err) = conn.close().await {
                    warn!("Failed to close SQLite connection after setup error: {}", close_err);
                }
                return Err(e.into());
            }
        }

        debug!(database = %config.database, "Opened SQLite connection");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            query_timeout: config.query_timeout(),
        })
    }

    /// Whether the native handle has already been released
    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }
}

fn build_connect_options(config: &DatabaseConfig) -> DatabaseResult<SqliteConnectOptions> {
    let options = if config.database == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?
    } else {
        SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(config.create_if_missing)
    };

    let journal_mode = if config.journal_mode_wal {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };

    Ok(options
        .journal_mode(journal_mode)
        .foreign_keys(config.foreign_keys)
        .busy_timeout(Duration::from_secs(config.busy_timeout_seconds)))
}

/// Render every non-NULL column as text according to its storage class
fn row_to_text(row: &SqliteRow) -> DatabaseResult<DatabaseRow> {
    let mut values = HashMap::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let storage = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                continue;
            }
            raw.type_info().name().to_string()
        };
        let text = match storage.as_str() {
            "INTEGER" => row.try_get_unchecked::<i64, _>(index)?.to_string(),
            "REAL" => row.try_get_unchecked::<f64, _>(index)?.to_string(),
            "BLOB" => {
                String::from_utf8_lossy(&row.try_get_unchecked::<Vec<u8>, _>(index)?).into_owned()
            }
            _ => row.try_get_unchecked::<String, _>(index)?,
        };
        values.insert(column.name().to_string(), text);
    }
    Ok(DatabaseRow::new(values))
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .unwrap_or(1);
                let message = db_err.message().to_string();
                DatabaseError::Driver {
                    code,
                    message: (!message.is_empty()).then_some(message),
                }
            }
            err @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                DatabaseError::Serialization(err.to_string())
            }
            err @ (sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnIndexOutOfBounds { .. }) => {
                DatabaseError::Query(err.to_string())
            }
            other => DatabaseError::Connection(other.to_string()),
        }
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn execute(&self, sql: &str) -> DatabaseResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DatabaseError::Closed)?;

        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> DatabaseResult<Vec<DatabaseRow>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DatabaseError::Closed)?;

        // SQLite interrupts the statement itself once the deadline passes
        let deadline = Instant::now() + self.query_timeout;
        conn.lock_handle()
            .await?
            .set_progress_handler(PROGRESS_HANDLER_STEPS, move || Instant::now() < deadline);

        let outcome =
            tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&mut *conn)).await;

        conn.lock_handle().await?.remove_progress_handler();

        let rows = match outcome {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => {
                let err = DatabaseError::from(err);
                return Err(if err.is_interrupt() && Instant::now() >= deadline {
                    DatabaseError::Timeout(self.query_timeout)
                } else {
                    err
                });
            }
            Err(_) => return Err(DatabaseError::Timeout(self.query_timeout)),
        };

        rows.iter().map(row_to_text).collect()
    }

    async fn close(&self) -> DatabaseResult<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await?;
            debug!("Closed SQLite connection");
        }
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }
}
