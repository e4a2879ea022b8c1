use crate::error::{Error, Result};
use crate::model::{Attribute, Entity, Property, Relationship};
use crate::schema::{SqlDialect, SqliteDialect};

/// Column in a join table referencing the owning entity
pub const JOIN_CHILD_COLUMN: &str = "child";
/// Column in a join table referencing the relationship's destination
pub const JOIN_PARENT_COLUMN: &str = "parent";

/// Name of the join table backing a to-many relationship
pub fn join_table_name(owner: &str, relationship: &str) -> String {
    format!("{}_{}", owner, relationship)
}

/// Turns entity definitions into `CREATE TABLE` statements
pub struct TableGenerator {
    dialect: Box<dyn SqlDialect>,
}

impl Default for TableGenerator {
    fn default() -> Self {
        Self::new(Box::new(SqliteDialect))
    }
}

impl TableGenerator {
    /// Create a new TableGenerator with the given dialect
    pub fn new(dialect: Box<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    /// Get the dialect used by this generator
    pub fn dialect(&self) -> &dyn SqlDialect {
        &*self.dialect
    }

    /// Statements creating the entity's table followed by its join tables.
    ///
    /// The main table always comes first since join tables reference it.
    /// Fails with `EmptyEntity` if the entity has no properties, or none of
    /// them become a column of the main table.
    pub fn synthesize(&self, entity: &Entity) -> Result<Vec<String>> {
        if entity.properties.is_empty() {
            return Err(Error::EmptyEntity(entity.name.clone()));
        }

        let mut columns = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut join_tables = Vec::new();

        for property in &entity.properties {
            match property {
                Property::Attribute(attribute) => columns.push(self.attribute_column(attribute)),
                Property::Relationship(relationship) if relationship.is_to_many() => {
                    join_tables.push(self.join_table(entity, relationship));
                }
                Property::Relationship(relationship) => match &relationship.join_keys {
                    Some(keys) => foreign_keys.push(format!(
                        "FOREIGN KEY({}) REFERENCES {}({}){}",
                        self.dialect.quote_identifier(&keys.child_key),
                        self.dialect.quote_identifier(&relationship.destination),
                        self.dialect.quote_identifier(&keys.parent_key),
                        self.dialect.on_delete_clause(relationship.delete_rule)
                    )),
                    None => columns.push(self.reference_column(relationship)),
                },
            }
        }

        // SQLite cannot create a table without columns
        if columns.is_empty() {
            return Err(Error::EmptyEntity(entity.name.clone()));
        }

        let key_constraints = entity
            .uniqueness_constraints
            .iter()
            .enumerate()
            .map(|(index, group)| {
                let keyword = if index == 0 { "PRIMARY KEY" } else { "UNIQUE" };
                format!("{}({})", keyword, self.column_list(group))
            });

        let clauses: Vec<String> = columns
            .into_iter()
            .chain(foreign_keys)
            .chain(key_constraints)
            .collect();

        let mut create = format!(
            "CREATE TABLE {}({})",
            self.dialect.quote_identifier(&entity.name),
            clauses.join(", ")
        );
        if !entity.uniqueness_constraints.is_empty() {
            create.push_str(self.dialect.keyless_storage_suffix());
        }

        let mut statements = Vec::with_capacity(1 + join_tables.len());
        statements.push(create);
        statements.extend(join_tables);
        Ok(statements)
    }

    /// Names of the join tables owned by an entity, in declaration order
    pub fn join_table_names(&self, entity: &Entity) -> Vec<String> {
        entity
            .relationships()
            .filter(|relationship| relationship.is_to_many())
            .map(|relationship| join_table_name(&entity.name, &relationship.name))
            .collect()
    }

    pub fn drop_table(&self, table_name: &str) -> String {
        self.dialect.drop_table_sql(table_name)
    }

    pub fn rename_table(&self, old_table_name: &str, new_table_name: &str) -> String {
        self.dialect.rename_table_sql(old_table_name, new_table_name)
    }

    fn attribute_column(&self, attribute: &Attribute) -> String {
        let mut parts = vec![self.dialect.quote_identifier(&attribute.name)];
        if let Some(affinity) = self.dialect.column_affinity(attribute.attribute_type) {
            parts.push(affinity.to_string());
        }
        if !attribute.optional {
            parts.push("NOT NULL".to_string());
        }
        // Inserted verbatim; callers supply well-formed literals
        if let Some(default_value) = &attribute.default_value {
            parts.push(format!("DEFAULT {}", default_value));
        }
        parts.join(" ")
    }

    fn reference_column(&self, relationship: &Relationship) -> String {
        let not_null = if relationship.optional { "" } else { " NOT NULL" };
        format!(
            "{}{} REFERENCES {}({}){}",
            self.dialect.quote_identifier(&relationship.name),
            not_null,
            self.dialect.quote_identifier(&relationship.destination),
            self.dialect.quote_identifier(self.dialect.implicit_key()),
            self.dialect.on_delete_clause(relationship.delete_rule)
        )
    }

    fn join_table(&self, owner: &Entity, relationship: &Relationship) -> String {
        let implicit = self.dialect.implicit_key();
        let (parent_key, child_key) = match &relationship.join_keys {
            Some(keys) => (keys.parent_key.as_str(), keys.child_key.as_str()),
            None => (implicit, implicit),
        };
        let on_delete = self.dialect.on_delete_clause(relationship.delete_rule);

        format!(
            "CREATE TABLE {}({} NOT NULL REFERENCES {}({}){}, {} NOT NULL REFERENCES {}({}){}, PRIMARY KEY({}, {})){}",
            self.dialect
                .quote_identifier(&join_table_name(&owner.name, &relationship.name)),
            self.dialect.quote_identifier(JOIN_CHILD_COLUMN),
            self.dialect.quote_identifier(&owner.name),
            self.dialect.quote_identifier(child_key),
            on_delete,
            self.dialect.quote_identifier(JOIN_PARENT_COLUMN),
            self.dialect.quote_identifier(&relationship.destination),
            self.dialect.quote_identifier(parent_key),
            on_delete,
            self.dialect.quote_identifier(JOIN_CHILD_COLUMN),
            self.dialect.quote_identifier(JOIN_PARENT_COLUMN),
            self.dialect.keyless_storage_suffix()
        )
    }

    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|column| self.dialect.quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeType, DeleteRule};

    fn generator() -> TableGenerator {
        TableGenerator::default()
    }

    #[test]
    fn test_attribute_columns() {
        let entity = Entity::new("Person")
            .property(Attribute::new("name", AttributeType::String))
            .property(Attribute::new("age", AttributeType::Integer16).optional())
            .property(Attribute::new("active", AttributeType::Boolean).with_default("1"))
            .property(Attribute::new("extra", AttributeType::Transformable).optional());

        let statements = generator().synthesize(&entity).unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE \"Person\"(\"name\" TEXT NOT NULL, \"age\" INTEGER, \
                 \"active\" NUMERIC NOT NULL DEFAULT 1, \"extra\")"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_every_type_maps_to_its_affinity() {
        let generator = generator();
        for attribute_type in AttributeType::ALL {
            let entity = Entity::new("T").property(Attribute::new("c", attribute_type).optional());
            let statement = generator.synthesize(&entity).unwrap().remove(0);
            let expected = match generator.dialect().column_affinity(attribute_type) {
                Some(affinity) => format!("CREATE TABLE \"T\"(\"c\" {})", affinity),
                None => "CREATE TABLE \"T\"(\"c\")".to_string(),
            };
            assert_eq!(statement, expected);
        }
    }

    #[test]
    fn test_empty_entity_rejected() {
        let err = generator().synthesize(&Entity::new("Ghost")).unwrap_err();
        assert!(matches!(err, Error::EmptyEntity(name) if name == "Ghost"));

        // Only to-many relationships leaves the main table without columns
        let entity = Entity::new("Tag").property(Relationship::to_many("posts", "Post"));
        assert!(matches!(
            generator().synthesize(&entity),
            Err(Error::EmptyEntity(_))
        ));
    }

    #[test]
    fn test_to_one_inline_reference() {
        let entity = Entity::new("Employee")
            .property(Attribute::new("name", AttributeType::String))
            .property(Relationship::to_one("company", "Company").on_delete(DeleteRule::Cascade))
            .property(
                Relationship::to_one("mentor", "Employee")
                    .optional()
                    .on_delete(DeleteRule::Nullify),
            );

        let statements = generator().synthesize(&entity).unwrap();
        assert_eq!(
            statements[0],
            "CREATE TABLE \"Employee\"(\"name\" TEXT NOT NULL, \
             \"company\" NOT NULL REFERENCES \"Company\"(\"rowid\") ON DELETE CASCADE, \
             \"mentor\" REFERENCES \"Employee\"(\"rowid\") ON DELETE SET NULL)"
        );
    }

    #[test]
    fn test_to_one_override_becomes_table_constraint() {
        let entity = Entity::new("Employee")
            .property(Attribute::new("id", AttributeType::Integer64))
            .property(Attribute::new("company_id", AttributeType::Integer64))
            .property(
                Relationship::to_one("company", "Company")
                    .on_delete(DeleteRule::Restrict)
                    .with_keys("id", "company_id"),
            )
            .unique(["id"]);

        let statements = generator().synthesize(&entity).unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE \"Employee\"(\"id\" INTEGER NOT NULL, \"company_id\" INTEGER NOT NULL, \
                 FOREIGN KEY(\"company_id\") REFERENCES \"Company\"(\"id\") ON DELETE RESTRICT, \
                 PRIMARY KEY(\"id\")) WITHOUT ROWID"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_uniqueness_groups() {
        let entity = Entity::new("Account")
            .property(Attribute::new("id", AttributeType::Integer64))
            .property(Attribute::new("region", AttributeType::String))
            .property(Attribute::new("email", AttributeType::String))
            .unique(["id", "region"])
            .unique(["email"]);

        let statement = generator().synthesize(&entity).unwrap().remove(0);
        assert_eq!(statement.matches("PRIMARY KEY").count(), 1);
        assert_eq!(statement.matches("UNIQUE").count(), 1);
        assert!(statement.ends_with(
            "PRIMARY KEY(\"id\", \"region\"), UNIQUE(\"email\")) WITHOUT ROWID"
        ));
    }

    #[test]
    fn test_to_many_join_table() {
        let entity = Entity::new("Author")
            .property(Attribute::new("id", AttributeType::Integer64))
            .property(
                Relationship::to_many("books", "Book")
                    .on_delete(DeleteRule::Cascade)
                    .with_keys("isbn", "id"),
            )
            .property(Relationship::to_many("fans", "Reader"))
            .unique(["id"]);

        let generator = generator();
        let statements = generator.synthesize(&entity).unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE \"Author\"("));
        assert_eq!(
            statements[1],
            "CREATE TABLE \"Author_books\"(\
             \"child\" NOT NULL REFERENCES \"Author\"(\"id\") ON DELETE CASCADE, \
             \"parent\" NOT NULL REFERENCES \"Book\"(\"isbn\") ON DELETE CASCADE, \
             PRIMARY KEY(\"child\", \"parent\")) WITHOUT ROWID"
        );
        assert_eq!(
            statements[2],
            "CREATE TABLE \"Author_fans\"(\
             \"child\" NOT NULL REFERENCES \"Author\"(\"rowid\"), \
             \"parent\" NOT NULL REFERENCES \"Reader\"(\"rowid\"), \
             PRIMARY KEY(\"child\", \"parent\")) WITHOUT ROWID"
        );
        assert_eq!(
            generator.join_table_names(&entity),
            vec!["Author_books".to_string(), "Author_fans".to_string()]
        );
    }
}
