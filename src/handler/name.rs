//! Handle names and table references

use std::fmt;

use crate::engine::TableKey;

/// Schema that holds virtual system views; direct handles on it are refused
pub const SYSTEM_SCHEMA: &str = "information_schema";

/// A handle name: the table it opens plus the session-unique alias.
///
/// The alias defaults to the table name and is compared ASCII
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleName {
    schema: String,
    table: String,
    alias: String,
}

impl HandleName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            schema: schema.into(),
            alias: table.clone(),
            table,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Cache key for this name
    pub fn alias_key(&self) -> String {
        alias_key(&self.alias)
    }

    pub fn table_key(&self) -> TableKey {
        TableKey::new(&self.schema, &self.table)
    }

    pub fn is_system_schema(&self) -> bool {
        self.schema.eq_ignore_ascii_case(SYSTEM_SCHEMA)
    }
}

impl fmt::Display for HandleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)?;
        if !self.alias.eq_ignore_ascii_case(&self.table) {
            write!(f, " AS {}", self.alias)?;
        }
        Ok(())
    }
}

/// Normalise an alias for cache lookups
pub fn alias_key(alias: &str) -> String {
    alias.to_ascii_lowercase()
}

/// A (schema, table) pattern used by bulk removal.
///
/// An empty schema matches every schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Match `table` in any schema
    pub fn any_schema(table: impl Into<String>) -> Self {
        Self::new("", table)
    }

    /// True if `name` refers to this table. The alias is ignored.
    pub fn matches(&self, name: &HandleName) -> bool {
        (self.schema.is_empty() || self.schema.eq_ignore_ascii_case(name.schema()))
            && self.table.eq_ignore_ascii_case(name.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_defaults_to_table() {
        let name = HandleName::new("test", "t1");
        assert_eq!(name.alias(), "t1");
        assert_eq!(name.to_string(), "test.t1");
    }

    #[test]
    fn test_alias_key_is_case_insensitive() {
        let a = HandleName::new("test", "t1").with_alias("H1");
        let b = HandleName::new("other", "t2").with_alias("h1");
        assert_eq!(a.alias_key(), b.alias_key());
        assert_eq!(a.to_string(), "test.t1 AS H1");
    }

    #[test]
    fn test_system_schema() {
        assert!(HandleName::new("INFORMATION_SCHEMA", "tables").is_system_schema());
        assert!(!HandleName::new("test", "tables").is_system_schema());
    }

    #[test]
    fn test_table_ref_ignores_alias() {
        let name = HandleName::new("test", "t1").with_alias("anything");
        assert!(TableRef::new("test", "t1").matches(&name));
        assert!(TableRef::new("TEST", "T1").matches(&name));
        assert!(!TableRef::new("test", "anything").matches(&name));
        assert!(!TableRef::new("other", "t1").matches(&name));
    }

    #[test]
    fn test_table_ref_empty_schema_matches_any() {
        assert!(TableRef::any_schema("t1").matches(&HandleName::new("a", "t1")));
        assert!(TableRef::any_schema("t1").matches(&HandleName::new("b", "t1")));
        assert!(!TableRef::any_schema("t1").matches(&HandleName::new("a", "t2")));
    }
}
