//! Entity mappings between two model versions.

use crate::error::Result;
use crate::model::Model;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// How one entity moves from the source model to the destination model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// Destination entity has no source counterpart
    Add,
    /// Source entity has no destination counterpart
    Remove,
    /// Same name, same structure
    Copy,
    /// Renamed and/or restructured
    Transform,
    Custom,
    Undefined,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MappingKind::Add => "add",
            MappingKind::Remove => "remove",
            MappingKind::Copy => "copy",
            MappingKind::Transform => "transform",
            MappingKind::Custom => "custom",
            MappingKind::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub kind: MappingKind,
    pub source_entity: Option<String>,
    pub destination_entity: Option<String>,
}

impl EntityMapping {
    pub fn add(destination: impl Into<String>) -> Self {
        Self {
            kind: MappingKind::Add,
            source_entity: None,
            destination_entity: Some(destination.into()),
        }
    }

    pub fn remove(source: impl Into<String>) -> Self {
        Self {
            kind: MappingKind::Remove,
            source_entity: Some(source.into()),
            destination_entity: None,
        }
    }

    pub fn copy(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: MappingKind::Copy,
            source_entity: Some(name.clone()),
            destination_entity: Some(name),
        }
    }

    pub fn transform(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            kind: MappingKind::Transform,
            source_entity: Some(source.into()),
            destination_entity: Some(destination.into()),
        }
    }

    /// Name used when reporting on this mapping: the source name, else the destination name
    pub fn entity_name(&self) -> &str {
        self.source_entity
            .as_deref()
            .or(self.destination_entity.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Ordered entity mappings between two model versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingModel {
    pub entity_mappings: Vec<EntityMapping>,
}

impl MappingModel {
    pub fn new(entity_mappings: Vec<EntityMapping>) -> Self {
        Self { entity_mappings }
    }

    pub fn len(&self) -> usize {
        self.entity_mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_mappings.is_empty()
    }
}

/// Model-comparison collaborator: yields the entity mapping between two models.
///
/// Implementations are responsible for ordering entries so that dependencies
/// are respected; the executor applies them exactly in the order given.
pub trait MappingInference: Send + Sync {
    fn infer(&self, source: &Model, destination: &Model) -> Result<MappingModel>;
}

/// Entity-level mapping inference.
///
/// A destination entity is paired with the source entity named by its
/// renaming identifier, or by its own name. Property-level differences only
/// decide between `copy` and `transform`; they are never broken down further.
///
/// Entries come out as removals, then kept entities, then additions. Among
/// kept entities a rename runs after the rename that frees its target name,
/// so chains such as `C -> C2` with `B -> C` apply cleanly. Rename cycles
/// (`A -> B` with `B -> A`) cannot be expressed as plain renames and are
/// left in destination order, where the first rename fails on the name clash.
#[derive(Debug, Default, Clone, Copy)]
pub struct InferredMapping;

impl MappingInference for InferredMapping {
    fn infer(&self, source: &Model, destination: &Model) -> Result<MappingModel> {
        let mut paired = HashSet::new();
        let mut kept = Vec::new();
        let mut added = Vec::new();

        for entity in &destination.entities {
            let previous_name = entity
                .renaming_identifier
                .as_deref()
                .unwrap_or(&entity.name);
            match source.entity_named(previous_name) {
                Some(previous) if paired.insert(previous.name.as_str()) => {
                    if previous.name == entity.name && previous.same_structure(entity) {
                        kept.push(EntityMapping::copy(&entity.name));
                    } else {
                        kept.push(EntityMapping::transform(&previous.name, &entity.name));
                    }
                }
                _ => added.push(EntityMapping::add(&entity.name)),
            }
        }

        // Removals first, so renames and additions never collide with a stale table
        let mut entity_mappings: Vec<EntityMapping> = source
            .entities
            .iter()
            .filter(|entity| !paired.contains(entity.name.as_str()))
            .map(|entity| EntityMapping::remove(&entity.name))
            .collect();
        entity_mappings.extend(order_renames(kept));
        entity_mappings.extend(added);

        Ok(MappingModel::new(entity_mappings))
    }
}

/// Order kept entries so no rename targets a name another entry still has to vacate
fn order_renames(mut pending: Vec<EntityMapping>) -> Vec<EntityMapping> {
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|entry| {
            let target = entry.destination_entity.as_deref();
            !pending.iter().any(|other| {
                other.source_entity.as_deref() == target
                    && other.source_entity != other.destination_entity
            })
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                // cycle
                ordered.append(&mut pending);
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, AttributeType, Entity};

    fn entity(name: &str) -> Entity {
        Entity::new(name).property(Attribute::new("value", AttributeType::String))
    }

    #[test]
    fn test_infer_covers_every_kind() {
        let source = Model::new("Shop", 1)
            .entity(entity("A"))
            .entity(entity("C"))
            .entity(entity("D"));
        let destination = Model::new("Shop", 2)
            .entity(entity("B"))
            .entity(entity("C2").renamed_from("C"))
            .entity(entity("D"));

        let mapping = InferredMapping.infer(&source, &destination).unwrap();
        assert_eq!(
            mapping.entity_mappings,
            vec![
                EntityMapping::remove("A"),
                EntityMapping::transform("C", "C2"),
                EntityMapping::copy("D"),
                EntityMapping::add("B"),
            ]
        );
    }

    #[test]
    fn test_changed_structure_is_transform_under_same_name() {
        let source = Model::new("Shop", 1).entity(entity("Item"));
        let destination = Model::new("Shop", 2)
            .entity(entity("Item").property(Attribute::new("price", AttributeType::Double)));

        let mapping = InferredMapping.infer(&source, &destination).unwrap();
        assert_eq!(
            mapping.entity_mappings,
            vec![EntityMapping::transform("Item", "Item")]
        );
    }

    #[test]
    fn test_identical_models_only_copy() {
        let model = Model::new("Shop", 1).entity(entity("A")).entity(entity("B"));
        let mapping = InferredMapping.infer(&model, &model).unwrap();
        assert!(mapping
            .entity_mappings
            .iter()
            .all(|m| m.kind == MappingKind::Copy));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_source_entity_paired_once() {
        // Two destination entities both claim to come from "A"
        let source = Model::new("Shop", 1).entity(entity("A"));
        let destination = Model::new("Shop", 2)
            .entity(entity("X").renamed_from("A"))
            .entity(entity("Y").renamed_from("A"));

        let mapping = InferredMapping.infer(&source, &destination).unwrap();
        assert_eq!(
            mapping.entity_mappings,
            vec![EntityMapping::transform("A", "X"), EntityMapping::add("Y")]
        );
    }

    #[test]
    fn test_chained_rename_frees_name_first() {
        let source = Model::new("Shop", 1).entity(entity("B")).entity(entity("C"));
        let destination = Model::new("Shop", 2)
            .entity(entity("C").renamed_from("B"))
            .entity(entity("C2").renamed_from("C"));

        let mapping = InferredMapping.infer(&source, &destination).unwrap();
        assert_eq!(
            mapping.entity_mappings,
            vec![
                EntityMapping::transform("C", "C2"),
                EntityMapping::transform("B", "C"),
            ]
        );
    }

    #[test]
    fn test_rename_cycle_keeps_destination_order() {
        let source = Model::new("Shop", 1).entity(entity("A")).entity(entity("B"));
        let destination = Model::new("Shop", 2)
            .entity(entity("B").renamed_from("A"))
            .entity(entity("A").renamed_from("B"));

        let mapping = InferredMapping.infer(&source, &destination).unwrap();
        assert_eq!(
            mapping.entity_mappings,
            vec![
                EntityMapping::transform("A", "B"),
                EntityMapping::transform("B", "A"),
            ]
        );
    }

    #[test]
    fn test_entity_name_prefers_source() {
        assert_eq!(EntityMapping::transform("Old", "New").entity_name(), "Old");
        assert_eq!(EntityMapping::add("New").entity_name(), "New");
        assert_eq!(MappingKind::Undefined.to_string(), "undefined");
    }
}
