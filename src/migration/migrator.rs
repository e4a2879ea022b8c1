use crate::database::DatabaseConnection;
use crate::error::{Error, Result};
use crate::model::mapping::{EntityMapping, MappingKind, MappingModel};
use crate::model::{Entity, Model};
use crate::schema::{join_table_name, TableGenerator};
use tracing::{debug, warn};

/// Execute one statement, logging it first
pub(crate) async fn execute_logged(conn: &dyn DatabaseConnection, sql: &str) -> Result<()> {
    debug!(sql = %sql, "Executing statement");
    conn.execute(sql).await?;
    Ok(())
}

/// Applies entity mappings to a live schema.
///
/// Entries run strictly in the order given and each entity's statements
/// finish before the next entity starts. There is no enclosing
/// transaction: if an entry fails, the entries before it stay applied.
#[derive(Default)]
pub struct Migrator {
    generator: TableGenerator,
}

impl Migrator {
    pub fn new(generator: TableGenerator) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &TableGenerator {
        &self.generator
    }

    /// Apply every mapping entry moving `source` to `destination`.
    ///
    /// Statements for every entry are built before the first one runs, so a
    /// malformed entry (an empty entity, an unknown name) fails the whole
    /// plan without touching the schema. Only custom and undefined entries
    /// fail in place, after the entries ahead of them have been applied.
    pub async fn apply(
        &self,
        conn: &dyn DatabaseConnection,
        mapping: &MappingModel,
        source: &Model,
        destination: &Model,
    ) -> Result<()> {
        let steps = mapping
            .entity_mappings
            .iter()
            .map(|entry| self.plan_entry(entry, source, destination))
            .collect::<Result<Vec<_>>>()?;

        for (index, (entry, step)) in mapping.entity_mappings.iter().zip(steps).enumerate() {
            if let Err(err) = self.run_step(conn, entry, step).await {
                warn!(
                    entity = entry.entity_name(),
                    kind = %entry.kind,
                    applied = index,
                    remaining = mapping.len() - index,
                    error = %err,
                    "Migration aborted"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    async fn run_step(
        &self,
        conn: &dyn DatabaseConnection,
        entry: &EntityMapping,
        step: Step,
    ) -> Result<()> {
        match step {
            Step::Run(statements) => {
                if statements.is_empty() {
                    debug!(entity = entry.entity_name(), "Entity unchanged");
                }
                for sql in &statements {
                    execute_logged(conn, sql).await?;
                }
                Ok(())
            }
            Step::Unsupported => Err(Error::UnsupportedMigration {
                kind: entry.kind,
                entity: entry.entity_name().to_string(),
            }),
        }
    }

    fn plan_entry(&self, entry: &EntityMapping, source: &Model, destination: &Model) -> Result<Step> {
        let statements = match entry.kind {
            MappingKind::Add => {
                let name = required_name(entry, entry.destination_entity.as_deref())?;
                self.generator.synthesize(lookup(destination, name)?)?
            }
            MappingKind::Remove => {
                let name = required_name(entry, entry.source_entity.as_deref())?;
                let mut statements: Vec<String> = source
                    .entity_named(name)
                    .map(|entity| self.generator.join_table_names(entity))
                    .unwrap_or_default()
                    .iter()
                    .map(|join_table| self.generator.drop_table(join_table))
                    .collect();
                statements.push(self.generator.drop_table(name));
                statements
            }
            MappingKind::Copy => Vec::new(),
            MappingKind::Transform => {
                let from = required_name(entry, entry.source_entity.as_deref())?;
                let to = required_name(entry, entry.destination_entity.as_deref())?;
                if from == to {
                    Vec::new()
                } else {
                    // Join tables are named after their owner and follow it
                    let mut statements = vec![self.generator.rename_table(from, to)];
                    if let Some(entity) = source.entity_named(from) {
                        for relationship in entity.relationships().filter(|r| r.is_to_many()) {
                            statements.push(self.generator.rename_table(
                                &join_table_name(from, &relationship.name),
                                &join_table_name(to, &relationship.name),
                            ));
                        }
                    }
                    statements
                }
            }
            MappingKind::Custom | MappingKind::Undefined => return Ok(Step::Unsupported),
        };
        Ok(Step::Run(statements))
    }
}

/// Statements prepared for one mapping entry
enum Step {
    Run(Vec<String>),
    Unsupported,
}

fn required_name<'a>(entry: &EntityMapping, name: Option<&'a str>) -> Result<&'a str> {
    name.ok_or_else(|| {
        Error::InvalidModel(format!(
            "{} mapping for entity \"{}\" is missing an entity name",
            entry.kind,
            entry.entity_name()
        ))
    })
}

fn lookup<'a>(model: &'a Model, name: &str) -> Result<&'a Entity> {
    model.entity_named(name).ok_or_else(|| {
        Error::InvalidModel(format!(
            "entity \"{}\" not found in model \"{}\" version {}",
            name, model.name, model.version
        ))
    })
}
