//! DDL synthesis: entity definitions to `CREATE TABLE` statements.

mod dialect;
mod generator;
mod sqlite_dialect;

pub use dialect::SqlDialect;
pub use generator::{join_table_name, TableGenerator, JOIN_CHILD_COLUMN, JOIN_PARENT_COLUMN};
pub use sqlite_dialect::SqliteDialect;
