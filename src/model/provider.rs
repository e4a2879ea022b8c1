//! Model providers: where versioned models come from.

use crate::error::{Error, Result};
use crate::model::Model;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which model version to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVersion {
    #[default]
    Latest,
    Exact(u32),
}

impl ModelVersion {
    pub fn expected(self) -> Option<u32> {
        match self {
            ModelVersion::Latest => None,
            ModelVersion::Exact(version) => Some(version),
        }
    }
}

impl From<u32> for ModelVersion {
    fn from(version: u32) -> Self {
        ModelVersion::Exact(version)
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVersion::Latest => f.write_str("latest"),
            ModelVersion::Exact(version) => write!(f, "{}", version),
        }
    }
}

/// Loads a named, versioned model
pub trait ModelProvider: Send + Sync {
    fn load(&self, version: ModelVersion) -> Result<Model>;
}

/// File stem of a model version inside its bundle: the base name for
/// version 1, `"<base> <version>"` afterwards.
pub fn versioned_model_name(base: &str, version: u32) -> String {
    if version == 1 {
        base.to_string()
    } else {
        format!("{} {}", base, version)
    }
}

/// Parse a bundle file stem back into a version number
fn parse_versioned_name(base: &str, stem: &str) -> Option<u32> {
    if stem == base {
        return Some(1);
    }
    stem.strip_prefix(base)?
        .strip_prefix(' ')?
        .parse::<u32>()
        .ok()
        .filter(|version| *version > 1)
}

/// Reject models whose declared version is not the one asked for
fn check_version(model: &Model, requested: ModelVersion) -> Result<()> {
    match requested {
        ModelVersion::Exact(expected) if model.version != expected => Err(Error::InvalidVersion {
            found: Some(model.version),
            expected: Some(expected),
        }),
        _ => Ok(()),
    }
}

const MODEL_EXTENSIONS: [&str; 4] = ["json", "toml", "yaml", "yml"];

/// Loads models from a bundle directory `<root>/<name>.datamodel/`.
///
/// Each version is one file named by [`versioned_model_name`] with a
/// `json`, `toml`, `yaml` or `yml` extension. `Latest` is the highest
/// version present in the bundle.
#[derive(Debug, Clone)]
pub struct DirectoryModelProvider {
    root: PathBuf,
    name: String,
}

impl DirectoryModelProvider {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.root.join(format!("{}.datamodel", self.name))
    }

    fn bundle(&self) -> Result<PathBuf> {
        let bundle = self.bundle_path();
        if !bundle.is_dir() {
            return Err(Error::ResourceNotFound {
                name: format!("{}.datamodel", self.name),
                location: self.root.display().to_string(),
            });
        }
        Ok(bundle)
    }

    /// Every version file present in the bundle, keyed by version
    pub fn available_versions(&self) -> Result<BTreeMap<u32, PathBuf>> {
        let bundle = self.bundle()?;
        let mut versions = BTreeMap::new();
        for entry in fs::read_dir(&bundle)? {
            let path = entry?.path();
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MODEL_EXTENSIONS.contains(&ext));
            if !supported {
                continue;
            }
            let version = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| parse_versioned_name(&self.name, stem));
            if let Some(version) = version {
                versions.insert(version, path);
            }
        }
        Ok(versions)
    }

    fn locate(&self, version: ModelVersion) -> Result<PathBuf> {
        let versions = self.available_versions()?;
        let found = match version {
            ModelVersion::Latest => versions.into_values().next_back(),
            ModelVersion::Exact(version) => versions.get(&version).cloned(),
        };
        found.ok_or_else(|| {
            let stem = match version {
                ModelVersion::Latest => self.name.clone(),
                ModelVersion::Exact(version) => versioned_model_name(&self.name, version),
            };
            Error::model_load(
                self.bundle_path().join(stem).display().to_string(),
                "no model file for this version",
            )
        })
    }
}

/// Parse a model file according to its extension
pub fn parse_model_file(path: &Path) -> Result<Model> {
    let location = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|e| Error::model_load(&location, e))?;
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "json" => serde_json::from_str(&contents).map_err(|e| Error::model_load(&location, e)),
        "toml" => toml::from_str(&contents).map_err(|e| Error::model_load(&location, e)),
        "yaml" | "yml" => {
            serde_yaml::from_str(&contents).map_err(|e| Error::model_load(&location, e))
        }
        other => Err(Error::model_load(
            location,
            format!("unsupported model format {:?}", other),
        )),
    }
}

impl ModelProvider for DirectoryModelProvider {
    fn load(&self, version: ModelVersion) -> Result<Model> {
        let path = self.locate(version)?;
        let model = parse_model_file(&path)?;
        check_version(&model, version)?;
        model.validate()?;
        debug!(model = %model.name, version = model.version, path = %path.display(), "Loaded data model");
        Ok(model)
    }
}

/// Serves models registered in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryModelProvider {
    models: BTreeMap<u32, Model>,
}

impl InMemoryModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any model with the same version
    pub fn with_model(mut self, model: Model) -> Self {
        self.insert(model);
        self
    }

    pub fn insert(&mut self, model: Model) {
        self.models.insert(model.version, model);
    }
}

impl ModelProvider for InMemoryModelProvider {
    fn load(&self, version: ModelVersion) -> Result<Model> {
        let model = match version {
            ModelVersion::Latest => self.models.values().next_back(),
            ModelVersion::Exact(version) => self.models.get(&version),
        }
        .cloned()
        .ok_or(Error::InvalidVersion {
            found: None,
            expected: version.expected(),
        })?;
        check_version(&model, version)?;
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, AttributeType, Entity};

    fn sample(version: u32) -> Model {
        Model::new("Catalog", version).entity(
            Entity::new("Item").property(Attribute::new("title", AttributeType::String)),
        )
    }

    fn write_bundle(root: &Path, files: &[(&str, String)]) {
        let bundle = root.join("Catalog.datamodel");
        fs::create_dir_all(&bundle).unwrap();
        for (name, contents) in files {
            fs::write(bundle.join(name), contents).unwrap();
        }
    }

    #[test]
    fn test_versioned_model_name() {
        assert_eq!(versioned_model_name("Catalog", 1), "Catalog");
        assert_eq!(versioned_model_name("Catalog", 2), "Catalog 2");
        assert_eq!(versioned_model_name("Catalog", 12), "Catalog 12");

        assert_eq!(parse_versioned_name("Catalog", "Catalog"), Some(1));
        assert_eq!(parse_versioned_name("Catalog", "Catalog 12"), Some(12));
        assert_eq!(parse_versioned_name("Catalog", "Catalog 1"), None);
        assert_eq!(parse_versioned_name("Catalog", "Catalog2"), None);
        assert_eq!(parse_versioned_name("Catalog", "Other 2"), None);
    }

    #[test]
    fn test_directory_provider_loads_each_format() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(
            dir.path(),
            &[
                ("Catalog.json", serde_json::to_string(&sample(1)).unwrap()),
                ("Catalog 2.toml", toml::to_string(&sample(2)).unwrap()),
                ("Catalog 3.yaml", serde_yaml::to_string(&sample(3)).unwrap()),
                ("notes.txt", "ignored".to_string()),
            ],
        );
        let provider = DirectoryModelProvider::new(dir.path(), "Catalog");

        assert_eq!(provider.load(ModelVersion::Exact(1)).unwrap(), sample(1));
        assert_eq!(provider.load(ModelVersion::Exact(2)).unwrap(), sample(2));
        assert_eq!(provider.load(ModelVersion::Latest).unwrap().version, 3);
        assert_eq!(
            provider.available_versions().unwrap().keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_directory_provider_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryModelProvider::new(dir.path(), "Catalog");
        assert!(matches!(
            provider.load(ModelVersion::Latest),
            Err(Error::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_directory_provider_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        // File named for version 2 declares version 5
        write_bundle(
            dir.path(),
            &[("Catalog 2.json", serde_json::to_string(&sample(5)).unwrap())],
        );
        let provider = DirectoryModelProvider::new(dir.path(), "Catalog");
        match provider.load(ModelVersion::Exact(2)) {
            Err(Error::InvalidVersion { found, expected }) => {
                assert_eq!(found, Some(5));
                assert_eq!(expected, Some(2));
            }
            other => panic!("expected InvalidVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_provider_unparseable_and_missing_version() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path(), &[("Catalog.json", "{ not json".to_string())]);
        let provider = DirectoryModelProvider::new(dir.path(), "Catalog");

        assert!(matches!(
            provider.load(ModelVersion::Exact(1)),
            Err(Error::ModelLoad { .. })
        ));
        assert!(matches!(
            provider.load(ModelVersion::Exact(4)),
            Err(Error::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_in_memory_provider() {
        let provider = InMemoryModelProvider::new()
            .with_model(sample(1))
            .with_model(sample(2));

        assert_eq!(provider.load(ModelVersion::Latest).unwrap().version, 2);
        assert_eq!(provider.load(1.into()).unwrap().version, 1);
        assert!(matches!(
            provider.load(ModelVersion::Exact(7)),
            Err(Error::InvalidVersion {
                found: None,
                expected: Some(7)
            })
        ));
        assert!(matches!(
            InMemoryModelProvider::new().load(ModelVersion::Latest),
            Err(Error::InvalidVersion { .. })
        ));
    }
}
