//! Versioned entity-relationship model.
//!
//! A [`Model`] is an immutable, named collection of [`Entity`] definitions
//! carrying a positive integer version. Entities hold an ordered list of
//! [`Property`] values, each either an [`Attribute`] (a scalar column) or a
//! [`Relationship`] to another entity, plus uniqueness constraint groups: the
//! first group is the primary key, every later group a `UNIQUE` constraint.

pub mod mapping;
pub mod provider;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Scalar attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Integer16,
    Integer32,
    Integer64,
    ObjectId,
    String,
    Uri,
    Uuid,
    BinaryData,
    Double,
    Float,
    Decimal,
    Date,
    Boolean,
    Transformable,
    Undefined,
}

impl AttributeType {
    pub const ALL: [AttributeType; 15] = [
        AttributeType::Integer16,
        AttributeType::Integer32,
        AttributeType::Integer64,
        AttributeType::ObjectId,
        AttributeType::String,
        AttributeType::Uri,
        AttributeType::Uuid,
        AttributeType::BinaryData,
        AttributeType::Double,
        AttributeType::Float,
        AttributeType::Decimal,
        AttributeType::Date,
        AttributeType::Boolean,
        AttributeType::Transformable,
        AttributeType::Undefined,
    ];
}

/// A scalar property stored as one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub optional: bool,
    /// Literal embedded verbatim into the column's `DEFAULT` clause
    #[serde(default)]
    pub default_value: Option<String>,
}

impl Attribute {
    /// A required attribute without a default
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: false,
            default_value: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteRule {
    Restrict,
    Nullify,
    Cascade,
    #[default]
    NoAction,
}

/// Explicit key columns used for a join instead of the implicit rowid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKeys {
    /// Referenced column in the destination entity
    pub parent_key: String,
    /// Referencing column in the owning entity
    pub child_key: String,
}

impl JoinKeys {
    pub fn new(parent_key: impl Into<String>, child_key: impl Into<String>) -> Self {
        Self {
            parent_key: parent_key.into(),
            child_key: child_key.into(),
        }
    }
}

/// A reference from the owning entity to a destination entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    /// Destination entity name
    pub destination: String,
    pub cardinality: Cardinality,
    /// Only meaningful for to-one relationships
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub delete_rule: DeleteRule,
    #[serde(default)]
    pub join_keys: Option<JoinKeys>,
}

impl Relationship {
    pub fn to_one(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            cardinality: Cardinality::ToOne,
            optional: false,
            delete_rule: DeleteRule::NoAction,
            join_keys: None,
        }
    }

    pub fn to_many(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::ToMany,
            ..Self::to_one(name, destination)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn on_delete(mut self, rule: DeleteRule) -> Self {
        self.delete_rule = rule;
        self
    }

    pub fn with_keys(mut self, parent_key: impl Into<String>, child_key: impl Into<String>) -> Self {
        self.join_keys = Some(JoinKeys::new(parent_key, child_key));
        self
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Property {
    Attribute(Attribute),
    Relationship(Relationship),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Attribute(attribute) => &attribute.name,
            Property::Relationship(relationship) => &relationship.name,
        }
    }
}

impl From<Attribute> for Property {
    fn from(attribute: Attribute) -> Self {
        Property::Attribute(attribute)
    }
}

impl From<Relationship> for Property {
    fn from(relationship: Relationship) -> Self {
        Property::Relationship(relationship)
    }
}

/// One entity; becomes one table plus a join table per to-many relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Name this entity carried in the previous model version, if it was renamed
    #[serde(default)]
    pub renaming_identifier: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    /// First group is the primary key, later groups are unique constraints
    #[serde(default)]
    pub uniqueness_constraints: Vec<Vec<String>>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            renaming_identifier: None,
            properties: Vec::new(),
            uniqueness_constraints: Vec::new(),
        }
    }

    pub fn property(mut self, property: impl Into<Property>) -> Self {
        self.properties.push(property.into());
        self
    }

    pub fn unique<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.uniqueness_constraints
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn renamed_from(mut self, previous_name: impl Into<String>) -> Self {
        self.renaming_identifier = Some(previous_name.into());
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.properties.iter().filter_map(|property| match property {
            Property::Attribute(attribute) => Some(attribute),
            Property::Relationship(_) => None,
        })
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.properties.iter().filter_map(|property| match property {
            Property::Relationship(relationship) => Some(relationship),
            Property::Attribute(_) => None,
        })
    }

    /// Structural equality ignoring the entity's name and renaming identifier
    pub fn same_structure(&self, other: &Entity) -> bool {
        self.properties == other.properties
            && self.uniqueness_constraints == other.uniqueness_constraints
    }
}

/// A named, versioned, immutable collection of entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Model {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            entities: Vec::new(),
        }
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Look up an entity by name
    pub fn entity_named(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Check the invariants every loaded model must hold.
    ///
    /// Empty entities are not rejected here: the synthesizer reports them as
    /// `EmptyEntity` when a table is about to be built.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(Error::InvalidModel(format!(
                "model \"{}\" must have a positive version",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            if entity.name.is_empty() {
                return Err(Error::InvalidModel(format!(
                    "model \"{}\" contains an unnamed entity",
                    self.name
                )));
            }
            if !names.insert(entity.name.as_str()) {
                return Err(Error::InvalidModel(format!(
                    "entity \"{}\" is declared more than once",
                    entity.name
                )));
            }
            if entity.uniqueness_constraints.iter().any(Vec::is_empty) {
                return Err(Error::InvalidModel(format!(
                    "entity \"{}\" declares an empty uniqueness constraint",
                    entity.name
                )));
            }
        }
        Ok(())
    }
}
