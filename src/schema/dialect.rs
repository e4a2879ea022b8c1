use crate::model::{AttributeType, DeleteRule};

/// SQL dialect operations the table generator needs
pub trait SqlDialect: Send + Sync {
    /// Name of the database type this dialect targets
    fn name(&self) -> &'static str;

    /// Column affinity keyword for an attribute type, or `None` for no keyword
    fn column_affinity(&self, attribute_type: AttributeType) -> Option<&'static str>;

    /// `ON DELETE` action for a delete rule, or `None` to omit the clause
    fn delete_action(&self, rule: DeleteRule) -> Option<&'static str>;

    /// Column referenced when a relationship names no explicit key
    fn implicit_key(&self) -> &'static str;

    /// Table suffix for storage without an implicit row identifier
    fn keyless_storage_suffix(&self) -> &'static str;

    /// Get the character used to quote identifiers
    fn identifier_quote_char(&self) -> char {
        '"'
    }

    /// Quote an identifier (table, column name), doubling embedded quote characters
    fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.identifier_quote_char();
        let escaped = identifier.replace(quote, &format!("{}{}", quote, quote));
        format!("{}{}{}", quote, escaped, quote)
    }

    /// ` ON DELETE <action>` including the leading space, or an empty string
    fn on_delete_clause(&self, rule: DeleteRule) -> String {
        self.delete_action(rule)
            .map(|action| format!(" ON DELETE {}", action))
            .unwrap_or_default()
    }

    fn drop_table_sql(&self, table_name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table_name))
    }

    fn rename_table_sql(&self, old_table_name: &str, new_table_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_table_name),
            self.quote_identifier(new_table_name)
        )
    }
}
