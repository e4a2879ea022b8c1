//! Append-only record of the schema versions applied to a database.

use crate::database::{DatabaseConnection, DatabaseError};
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use tracing::debug;

/// Table used when the host does not name one
pub const DEFAULT_VERSION_TABLE: &str = "schema_migrations";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One applied schema version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: u32,
    pub recorded_at: NaiveDateTime,
}

/// Reads and appends rows of the version table.
///
/// The current version is the most recently inserted row, by rowid, so
/// identical or skewed timestamps never change the answer.
#[derive(Debug, Clone)]
pub struct VersionStore {
    table: String,
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_TABLE)
    }
}

impl VersionStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table.replace('"', "\"\""))
    }

    /// Create the version table
    pub async fn initialize(&self, conn: &dyn DatabaseConnection) -> Result<()> {
        let sql = format!(
            "CREATE TABLE {}(version INTEGER NOT NULL, timestamp NUMERIC NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            self.quoted_table()
        );
        debug!(sql = %sql, "Executing statement");
        conn.execute(&sql).await?;
        Ok(())
    }

    /// Append one version row
    pub async fn record(&self, conn: &dyn DatabaseConnection, version: u32) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}(version) VALUES({})",
            self.quoted_table(),
            version
        );
        debug!(sql = %sql, "Executing statement");
        conn.execute(&sql).await?;
        Ok(())
    }

    /// Whether the version table has been created
    pub async fn exists(&self, conn: &dyn DatabaseConnection) -> Result<bool> {
        let sql = format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '{}'",
            self.table.replace('\'', "''")
        );
        Ok(!conn.query(&sql).await?.is_empty())
    }

    /// Version of the most recently appended row.
    ///
    /// Fails with `NoVersionRecorded` if the table is missing or empty.
    pub async fn current(&self, conn: &dyn DatabaseConnection) -> Result<u32> {
        if !self.exists(conn).await? {
            return Err(Error::NoVersionRecorded);
        }

        let sql = format!(
            "SELECT version FROM {} ORDER BY rowid DESC LIMIT 1",
            self.quoted_table()
        );
        let rows = conn.query(&sql).await?;
        let row = rows.first().ok_or(Error::NoVersionRecorded)?;
        match row.try_get_string("version") {
            Some(text) => parse_version(text),
            None => Err(Error::UnknownSchemaVersion("NULL".to_string())),
        }
    }

    /// Every recorded version in insertion order. Empty if the table is missing.
    pub async fn history(&self, conn: &dyn DatabaseConnection) -> Result<Vec<VersionRecord>> {
        if !self.exists(conn).await? {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT version, timestamp FROM {} ORDER BY rowid",
            self.quoted_table()
        );
        let rows = conn.query(&sql).await?;
        rows.iter()
            .map(|row| -> Result<VersionRecord> {
                let version = parse_version(&row.get_string("version")?)?;
                let timestamp = row.get_string("timestamp")?;
                let recorded_at = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
                    .map_err(|e| {
                        DatabaseError::Serialization(format!(
                            "unreadable timestamp {:?}: {}",
                            timestamp, e
                        ))
                    })?;
                Ok(VersionRecord {
                    version,
                    recorded_at,
                })
            })
            .collect()
    }
}

fn parse_version(text: &str) -> Result<u32> {
    text.parse::<u32>()
        .ok()
        .filter(|version| *version > 0)
        .ok_or_else(|| Error::UnknownSchemaVersion(text.to_string()))
}
