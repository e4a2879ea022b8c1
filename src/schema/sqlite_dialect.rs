use crate::model::{AttributeType, DeleteRule};
use crate::schema::SqlDialect;

/// SQLite dialect
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_affinity(&self, attribute_type: AttributeType) -> Option<&'static str> {
        match attribute_type {
            AttributeType::Integer16
            | AttributeType::Integer32
            | AttributeType::Integer64
            | AttributeType::ObjectId => Some("INTEGER"),
            AttributeType::String | AttributeType::Uri | AttributeType::Uuid => Some("TEXT"),
            AttributeType::BinaryData => Some("BLOB"),
            AttributeType::Double | AttributeType::Float => Some("REAL"),
            AttributeType::Decimal | AttributeType::Date | AttributeType::Boolean => {
                Some("NUMERIC")
            }
            AttributeType::Transformable | AttributeType::Undefined => None,
        }
    }

    fn delete_action(&self, rule: DeleteRule) -> Option<&'static str> {
        match rule {
            DeleteRule::Restrict => Some("RESTRICT"),
            DeleteRule::Nullify => Some("SET NULL"),
            DeleteRule::Cascade => Some("CASCADE"),
            DeleteRule::NoAction => None,
        }
    }

    fn implicit_key(&self) -> &'static str {
        "rowid"
    }

    fn keyless_storage_suffix(&self) -> &'static str {
        " WITHOUT ROWID"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_table() {
        let dialect = SqliteDialect::new();
        let expected = [
            (AttributeType::Integer16, Some("INTEGER")),
            (AttributeType::Integer32, Some("INTEGER")),
            (AttributeType::Integer64, Some("INTEGER")),
            (AttributeType::ObjectId, Some("INTEGER")),
            (AttributeType::String, Some("TEXT")),
            (AttributeType::Uri, Some("TEXT")),
            (AttributeType::Uuid, Some("TEXT")),
            (AttributeType::BinaryData, Some("BLOB")),
            (AttributeType::Double, Some("REAL")),
            (AttributeType::Float, Some("REAL")),
            (AttributeType::Decimal, Some("NUMERIC")),
            (AttributeType::Date, Some("NUMERIC")),
            (AttributeType::Boolean, Some("NUMERIC")),
            (AttributeType::Transformable, None),
            (AttributeType::Undefined, None),
        ];
        assert_eq!(expected.len(), AttributeType::ALL.len());
        for (attribute_type, affinity) in expected {
            assert_eq!(
                dialect.column_affinity(attribute_type),
                affinity,
                "{:?}",
                attribute_type
            );
        }
    }

    #[test]
    fn test_delete_clauses() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.on_delete_clause(DeleteRule::Restrict), " ON DELETE RESTRICT");
        assert_eq!(dialect.on_delete_clause(DeleteRule::Nullify), " ON DELETE SET NULL");
        assert_eq!(dialect.on_delete_clause(DeleteRule::Cascade), " ON DELETE CASCADE");
        assert_eq!(dialect.on_delete_clause(DeleteRule::NoAction), "");
    }

    #[test]
    fn test_identifier_quoting_and_table_statements() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.quote_identifier("Person"), "\"Person\"");
        assert_eq!(dialect.quote_identifier("odd\"name"), "\"odd\"\"name\"");
        assert_eq!(dialect.drop_table_sql("Person"), "DROP TABLE \"Person\"");
        assert_eq!(
            dialect.rename_table_sql("Person", "Human"),
            "ALTER TABLE \"Person\" RENAME TO \"Human\""
        );
    }

    #[test]
    fn test_dialect_name_matches_backend() {
        use crate::database::DatabaseType;

        assert_eq!(SqliteDialect::new().name(), DatabaseType::Sqlite.to_string());
    }
}
