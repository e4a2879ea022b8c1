use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display};
use std::time::Duration;
use thiserror::Error;

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection could not be opened or configured
    #[error("connection error: {0}")]
    Connection(String),

    /// Statement failed inside the database engine
    #[error("{}", driver_message(*.code, .message.as_deref()))]
    Driver { code: i32, message: Option<String> },

    /// Result collection exceeded its bound
    #[error("database request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection has already been released
    #[error("connection is closed")]
    Closed,

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A result did not have the shape the caller asked for
    #[error("query error: {0}")]
    Query(String),

    /// A value could not be converted to the requested type
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_INTERRUPT: i32 = 9;
const SQLITE_CONSTRAINT: i32 = 19;

impl DatabaseError {
    /// Native result code, if the error came from the database engine
    pub fn code(&self) -> Option<i32> {
        match self {
            DatabaseError::Driver { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// "database is locked" or "database table is locked"
    pub fn is_busy(&self) -> bool {
        matches!(
            self.code().map(primary_code),
            Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.code().map(primary_code) == Some(SQLITE_CONSTRAINT)
    }

    /// The statement was stopped by an interrupt before it completed
    pub fn is_interrupt(&self) -> bool {
        self.code().map(primary_code) == Some(SQLITE_INTERRUPT)
    }
}

/// Extended result codes carry the primary code in their low byte.
fn primary_code(code: i32) -> i32 {
    code & 0xff
}

fn driver_message(code: i32, message: Option<&str>) -> String {
    match message {
        Some(message) if !message.is_empty() => format!("SQLite error code {}: {}", code, message),
        _ => format!("SQLite error code {} ({})", code, describe_result_code(code)),
    }
}

/// Generic text for a SQLite result code, used when the driver supplies no message.
pub fn describe_result_code(code: i32) -> &'static str {
    match primary_code(code) {
        0 => "not an error",
        1 => "SQL logic error",
        2 => "internal logic error",
        3 => "access permission denied",
        4 => "query aborted",
        5 => "database is locked",
        6 => "database table is locked",
        7 => "out of memory",
        8 => "attempt to write a readonly database",
        9 => "interrupted",
        10 => "disk I/O error",
        11 => "database disk image is malformed",
        12 => "unknown operation",
        13 => "database or disk is full",
        14 => "unable to open database file",
        15 => "locking protocol",
        17 => "database schema has changed",
        18 => "string or blob too big",
        19 => "constraint failed",
        20 => "datatype mismatch",
        21 => "bad parameter or other API misuse",
        23 => "authorization denied",
        25 => "column index out of range",
        26 => "file is not a database",
        27 => "notification message",
        28 => "warning message",
        100 => "another row available",
        101 => "no more rows available",
        _ => "unknown error",
    }
}

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// SQLite database
    Sqlite,
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Database configuration for establishing the engine's connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// File path, or ":memory:" for a private in-memory database
    pub database: String,

    /// Create the database file when it does not exist yet
    #[serde(default = "default_true")]
    pub create_if_missing: bool,

    /// Switch the journal to write-ahead logging at open
    #[serde(default = "default_true")]
    pub journal_mode_wal: bool,

    /// Enforce foreign keys at open
    #[serde(default = "default_true")]
    pub foreign_keys: bool,

    /// Bound on collecting query results
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,

    /// How long SQLite itself waits on a locked database before reporting BUSY
    #[serde(default)]
    pub busy_timeout_seconds: u64,

    /// Extra `PRAGMA name = value` statements applied right after open
    #[serde(default)]
    pub pragmas: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}
fn default_query_timeout() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database: ":memory:".to_string(),
            create_if_missing: default_true(),
            journal_mode_wal: default_true(),
            foreign_keys: default_true(),
            query_timeout_seconds: default_query_timeout(),
            busy_timeout_seconds: 0,
            pragmas: BTreeMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a database file at `path` with default settings
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: path.into(),
            ..Default::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}

/// One result row: column name to text value. NULL columns are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseRow {
    values: HashMap<String, String>,
}

impl DatabaseRow {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Get a column value by name
    pub fn get_string(&self, column: &str) -> DatabaseResult<String> {
        self.values
            .get(column)
            .cloned()
            .ok_or_else(|| DatabaseError::Query(format!("column {} not present in row", column)))
    }

    /// Get a column value by name, or None if the column is missing or NULL
    pub fn try_get_string(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn get_i64(&self, column: &str) -> DatabaseResult<i64> {
        let value = self.get_string(column)?;
        value.parse().map_err(|_| {
            DatabaseError::Serialization(format!(
                "column {} holds non-integer value {:?}",
                column, value
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for DatabaseRow {
    fn from(values: HashMap<String, String>) -> Self {
        Self::new(values)
    }
}

/// Thin driver interface the schema engine calls into.
///
/// Implementations own a single native handle. Statements are run one at a
/// time, in the order they are issued.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Execute a statement that returns no rows
    async fn execute(&self, sql: &str) -> DatabaseResult<()>;

    /// Execute a statement and collect every result row
    async fn query(&self, sql: &str) -> DatabaseResult<Vec<DatabaseRow>>;

    /// Release the native handle. Further calls are no-ops.
    async fn close(&self) -> DatabaseResult<()>;

    /// Get the underlying database type
    fn database_type(&self) -> DatabaseType;
}

#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;
