//! Model descriptors consumed by the query builder

use std::collections::BTreeMap;

use crate::query::value::TypeTag;
use crate::schema::types::{KeyRole, Table, TypeFamily};

/// A table as seen by the query builder.
///
/// Usually implemented with `#[derive(Model)]`; [`ModelDescriptor`] covers
/// tables known only at runtime.
pub trait Model {
    fn table_name(&self) -> &str;

    /// Column names in declaration order
    fn columns(&self) -> Vec<&str>;

    fn column_type(&self, column: &str) -> Option<TypeTag>;

    fn primary_key(&self) -> &str;

    fn column_types(&self) -> BTreeMap<String, TypeTag> {
        self.columns()
            .into_iter()
            .filter_map(|c| self.column_type(c).map(|tag| (c.to_string(), tag)))
            .collect()
    }
}

/// Type tag used for values of a schema column
pub fn tag_for(family: TypeFamily) -> TypeTag {
    match family {
        TypeFamily::Integer => TypeTag::Int,
        TypeFamily::FixedPoint | TypeFamily::FloatingPoint => TypeTag::Float,
        _ => TypeTag::Text,
    }
}

/// Owned model description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelDescriptor {
    table: String,
    columns: Vec<(String, TypeTag)>,
    primary_key: String,
}

impl ModelDescriptor {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Add a column; re-adding an existing name replaces its tag
    pub fn column(mut self, name: &str, tag: TypeTag) -> Self {
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = tag,
            None => self.columns.push((name.to_string(), tag)),
        }
        self
    }

    pub fn with_primary_key(mut self, name: &str) -> Self {
        self.primary_key = name.to_string();
        self
    }

    /// Describe a schema table, columns in ordinal order
    pub fn from_table(table: &Table) -> Self {
        let mut descriptor = Self::new(&table.name);
        for column in table.columns_by_position() {
            descriptor = descriptor.column(&column.name, tag_for(column.data_type.family()));
            if column.column_key == KeyRole::Primary {
                descriptor.primary_key = column.name.clone();
            }
        }
        descriptor
    }
}

impl Model for ModelDescriptor {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn column_type(&self, column: &str) -> Option<TypeTag> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, tag)| *tag)
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }
}
