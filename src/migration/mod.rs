//! Applying entity mappings and orchestrating create/migrate/ensure.

mod engine;
mod migrator;

pub use engine::{EnsureOutcome, SchemaEngine};
pub use migrator::Migrator;
