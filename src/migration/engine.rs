#[cfg(feature = "sqlite")]
use crate::config::EngineConfig;
use crate::database::DatabaseConnection;
#[cfg(feature = "sqlite")]
use crate::error::ConfigError;
use crate::error::{Error, Result};
use crate::migration::migrator::{execute_logged, Migrator};
use crate::model::mapping::{InferredMapping, MappingInference, MappingModel};
use crate::model::provider::{ModelProvider, ModelVersion};
use crate::model::Model;
use crate::version_store::{VersionRecord, VersionStore};
use tracing::info;

/// What `ensure` had to do to reach the requested version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// No version was recorded; the full schema was synthesized
    Created { version: u32 },
    /// Already at the requested version; nothing was executed
    UpToDate { version: u32 },
    Migrated { from: u32, to: u32 },
}

impl EnsureOutcome {
    /// Version recorded after the call
    pub fn version(&self) -> u32 {
        match *self {
            EnsureOutcome::Created { version } | EnsureOutcome::UpToDate { version } => version,
            EnsureOutcome::Migrated { to, .. } => to,
        }
    }
}

/// Brings a database schema to a model version and keeps track of it.
///
/// The engine owns its connection for its whole life. Operations are meant
/// to run one at a time; nothing here guards against concurrent schema
/// changes from elsewhere.
pub struct SchemaEngine {
    connection: Box<dyn DatabaseConnection>,
    provider: Box<dyn ModelProvider>,
    inference: Box<dyn MappingInference>,
    migrator: Migrator,
    versions: VersionStore,
}

impl SchemaEngine {
    pub fn new(connection: Box<dyn DatabaseConnection>, provider: Box<dyn ModelProvider>) -> Self {
        Self {
            connection,
            provider,
            inference: Box::new(InferredMapping),
            migrator: Migrator::default(),
            versions: VersionStore::default(),
        }
    }

    /// Replace the model-comparison collaborator used by `migrate` and `ensure`
    pub fn with_mapping_inference(mut self, inference: Box<dyn MappingInference>) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_version_table(mut self, table: impl Into<String>) -> Self {
        self.versions = VersionStore::new(table);
        self
    }

    /// Open a SQLite database described by `config`
    #[cfg(feature = "sqlite")]
    pub async fn open(config: &EngineConfig, provider: Box<dyn ModelProvider>) -> Result<Self> {
        config.validate()?;
        let connection = crate::database::SqliteConnection::connect(&config.database).await?;
        info!(
            backend = %connection.database_type(),
            database = %config.database.database,
            version_table = %config.version_table,
            "Schema engine opened"
        );
        Ok(Self::new(Box::new(connection), provider).with_version_table(&config.version_table))
    }

    /// Open a SQLite database and the model bundle both described by `config`
    #[cfg(feature = "sqlite")]
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let source = config
            .model
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("no model source configured".to_string()))?;
        Self::open(config, Box::new(source.provider())).await
    }

    pub fn connection(&self) -> &dyn DatabaseConnection {
        &*self.connection
    }

    pub fn version_store(&self) -> &VersionStore {
        &self.versions
    }

    /// Synthesize the whole schema of a model version and record it.
    ///
    /// Every entity is synthesized before the first statement runs, so an
    /// invalid entity leaves the database untouched.
    pub async fn create(&self, version: ModelVersion) -> Result<u32> {
        let model = self.provider.load(version)?;
        self.create_from(&model).await
    }

    async fn create_from(&self, model: &Model) -> Result<u32> {
        let mut statements = Vec::new();
        for entity in &model.entities {
            statements.extend(self.migrator.generator().synthesize(entity)?);
        }

        let conn = self.connection();
        for sql in &statements {
            execute_logged(conn, sql).await?;
        }
        if !self.versions.exists(conn).await? {
            self.versions.initialize(conn).await?;
        }
        self.versions.record(conn, model.version).await?;

        info!(
            model = %model.name,
            version = model.version,
            entities = model.entities.len(),
            statements = statements.len(),
            dialect = self.migrator.generator().dialect().name(),
            "Created schema"
        );
        Ok(model.version)
    }

    /// Migrate from the recorded version to `target` using the inferred mapping.
    ///
    /// Returns the `(from, to)` versions. Nothing runs if already at `target`.
    pub async fn migrate(&self, target: ModelVersion) -> Result<(u32, u32)> {
        let destination = self.provider.load(target)?;
        let current = self.versions.current(self.connection()).await?;
        self.migrate_from(current, &destination, None).await
    }

    /// Migrate from the recorded version to `target` applying a caller-supplied mapping
    pub async fn migrate_with_mapping(
        &self,
        mapping: &MappingModel,
        target: ModelVersion,
    ) -> Result<(u32, u32)> {
        let destination = self.provider.load(target)?;
        let current = self.versions.current(self.connection()).await?;
        self.migrate_from(current, &destination, Some(mapping)).await
    }

    async fn migrate_from(
        &self,
        current: u32,
        destination: &Model,
        mapping: Option<&MappingModel>,
    ) -> Result<(u32, u32)> {
        if current == destination.version {
            info!(version = current, "Schema already at requested version");
            return Ok((current, current));
        }

        let source = self.provider.load(ModelVersion::Exact(current))?;
        let inferred;
        let mapping = match mapping {
            Some(mapping) => mapping,
            None => {
                inferred = self.inference.infer(&source, destination)?;
                &inferred
            }
        };

        let conn = self.connection();
        self.migrator.apply(conn, mapping, &source, destination).await?;
        self.versions.record(conn, destination.version).await?;

        info!(
            model = %destination.name,
            from = current,
            to = destination.version,
            entities = mapping.len(),
            dialect = self.migrator.generator().dialect().name(),
            "Migrated schema"
        );
        Ok((current, destination.version))
    }

    /// Reach `target`, creating the schema on first run and migrating otherwise
    pub async fn ensure(&self, target: ModelVersion) -> Result<EnsureOutcome> {
        let destination = self.provider.load(target)?;
        match self.versions.current(self.connection()).await {
            Err(Error::NoVersionRecorded) => {
                let version = self.create_from(&destination).await?;
                Ok(EnsureOutcome::Created { version })
            }
            Ok(current) if current == destination.version => {
                info!(version = current, "Schema up to date");
                Ok(EnsureOutcome::UpToDate { version: current })
            }
            Ok(current) => {
                let (from, to) = self.migrate_from(current, &destination, None).await?;
                Ok(EnsureOutcome::Migrated { from, to })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn current_version(&self) -> Result<u32> {
        self.versions.current(self.connection()).await
    }

    pub async fn history(&self) -> Result<Vec<VersionRecord>> {
        self.versions.history(self.connection()).await
    }

    /// Release the database connection
    pub async fn close(self) -> Result<()> {
        self.connection.close().await?;
        info!("Schema engine closed");
        Ok(())
    }
}
