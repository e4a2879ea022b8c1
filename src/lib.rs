//! Versioned entity-relationship models synthesized into SQLite schemas,
//! migrated in place as the model evolves.

pub mod config;
pub mod database;
pub mod error;
mod logging;
#[cfg(test)]
mod logging_tests;
pub mod migration;
pub mod model;
pub mod schema;
pub mod version_store;

// Database re-exports
pub use database::{
    DatabaseConfig, DatabaseConnection, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
};
#[cfg(feature = "sqlite")]
pub use database::SqliteConnection;

// Model re-exports
pub use model::mapping::{EntityMapping, InferredMapping, MappingInference, MappingKind, MappingModel};
pub use model::provider::{
    versioned_model_name, DirectoryModelProvider, InMemoryModelProvider, ModelProvider,
    ModelVersion,
};
pub use model::{
    Attribute, AttributeType, Cardinality, DeleteRule, Entity, JoinKeys, Model, Property,
    Relationship,
};

pub use config::{EngineConfig, ModelSourceConfig};
pub use error::{ConfigError, Error, Result};
pub use logging::init_logging;
pub use migration::{EnsureOutcome, Migrator, SchemaEngine};
pub use schema::{SqlDialect, SqliteDialect, TableGenerator};
pub use version_store::{VersionRecord, VersionStore};

/// Prelude module, exposing the most commonly used items.
pub mod prelude {
    pub use crate::{
        Attribute, AttributeType, DatabaseConnection, DeleteRule, EngineConfig, EnsureOutcome,
        Entity, Error, Model, ModelProvider, ModelVersion, Relationship, Result, SchemaEngine,
        init_logging,
    };
}
