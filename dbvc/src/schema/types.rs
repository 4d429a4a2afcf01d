//! Type definitions for database schema objects

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One row of an enum-valued table, keyed by column name
pub type EnumRow = BTreeMap<String, serde_json::Value>;

/// Represents a complete database schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub name: String,
    /// Where the schema was read from; never compared
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
    /// Row contents of enum-valued tables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enums: BTreeMap<String, Vec<EnumRow>>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: String::new(),
            tables: BTreeMap::new(),
            enums: BTreeMap::new(),
        }
    }

    /// Add a table to the schema
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    /// Mark `table` as enum-valued with the given rows
    pub fn with_enum_rows(mut self, table: &str, rows: Vec<EnumRow>) -> Self {
        self.enums.insert(table.to_string(), rows);
        self
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn is_enum_table(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    /// Check every model invariant, reporting all violations at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("schema name is empty".to_string());
        }

        for (key, table) in &self.tables {
            if key != &table.name {
                problems.push(format!(
                    "table keyed as `{}` is named `{}`",
                    key, table.name
                ));
            }
            table.collect_problems(&mut problems);
        }

        for (table_name, rows) in &self.enums {
            let Some(table) = self.tables.get(table_name) else {
                problems.push(format!("enum rows given for unknown table `{}`", table_name));
                continue;
            };
            for row in rows {
                for column in row.keys() {
                    if !table.columns.contains_key(column) {
                        problems.push(format!(
                            "enum row for `{}` references unknown column `{}`",
                            table_name, column
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::MalformedSchema(problems.join("; ")))
        }
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub engine: String,
    pub row_format: String,
    pub collation: String,
    pub auto_increment: u64,
    pub columns: BTreeMap<String, Column>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            engine: String::new(),
            row_format: String::new(),
            collation: String::new(),
            auto_increment: 0,
            columns: BTreeMap::new(),
        }
    }

    pub fn engine(mut self, engine: &str) -> Self {
        self.engine = engine.to_string();
        self
    }

    pub fn collation(mut self, collation: &str) -> Self {
        self.collation = collation.to_string();
        self
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Add a column, placing it after the existing ones when it has no position
    pub fn with_column(mut self, mut column: Column) -> Self {
        if column.position == 0 {
            column.position = self.columns.values().map(|c| c.position).max().unwrap_or(0) + 1;
        }
        self.add_column(column);
        self
    }

    /// Columns in ascending ordinal position, ties broken by name
    pub fn columns_by_position(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.values().collect();
        columns.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        columns
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns_by_position()
            .into_iter()
            .find(|c| c.column_key == KeyRole::Primary)
    }

    fn collect_problems(&self, problems: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            problems.push("table with empty name".to_string());
        }

        let primaries = self
            .columns
            .values()
            .filter(|c| c.column_key == KeyRole::Primary)
            .count();
        if primaries > 1 {
            problems.push(format!(
                "table `{}` has {} primary-key columns",
                self.name, primaries
            ));
        }

        let mut positions = BTreeSet::new();
        for (key, column) in &self.columns {
            if key != &column.name {
                problems.push(format!(
                    "column keyed as `{}`.`{}` is named `{}`",
                    self.name, key, column.name
                ));
            }
            if !positions.insert(column.position) {
                problems.push(format!(
                    "table `{}` reuses ordinal position {}",
                    self.name, column.position
                ));
            }
            if column.column_key == KeyRole::Primary && column.is_nullable {
                problems.push(format!(
                    "primary-key column `{}`.`{}` is nullable",
                    self.name, column.name
                ));
            }
            if !column.data_type.is_numeric() && (column.precision != 0 || column.numeric_scale != 0) {
                problems.push(format!(
                    "non-numeric column `{}`.`{}` carries precision/scale",
                    self.name, column.name
                ));
            }
            if column.data_type.family() == TypeFamily::Textual
                && !column.is_nullable
                && column.default.eq_ignore_ascii_case("null")
            {
                problems.push(format!(
                    "textual column `{}`.`{}` is NOT NULL but defaults to NULL",
                    self.name, column.name
                ));
            }
        }
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub position: u32,
    /// Default expression, empty when absent
    pub default: String,
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unsigned: bool,
    pub data_type: DataType,
    /// Native type expression, e.g. `varchar(32)` or `int(10) unsigned`
    #[serde(rename = "type")]
    pub column_type: String,
    pub max_length: u64,
    pub precision: u32,
    #[serde(default)]
    pub numeric_scale: u32,
    pub char_set: String,
    pub column_key: KeyRole,
    pub extra: String,
}

impl Column {
    /// Create a new column with the given name and type
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            position: 0,
            default: String::new(),
            is_nullable: false,
            is_unsigned: false,
            data_type,
            column_type: String::new(),
            max_length: 0,
            precision: 0,
            numeric_scale: 0,
            char_set: String::new(),
            column_key: KeyRole::None,
            extra: String::new(),
        }
    }

    pub fn position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    /// Set the native type expression
    pub fn native(mut self, column_type: &str) -> Self {
        self.column_type = column_type.to_string();
        self
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = default.to_string();
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.is_unsigned = true;
        self
    }

    pub fn key(mut self, role: KeyRole) -> Self {
        self.column_key = role;
        self
    }

    pub fn extra(mut self, extra: &str) -> Self {
        self.extra = extra.to_string();
        self
    }

    pub fn max_length(mut self, max_length: u64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = precision;
        self.numeric_scale = scale;
        self
    }

    pub fn is_auto_increment(&self) -> bool {
        self.extra.to_ascii_lowercase().contains("auto_increment")
    }
}

/// Broad grouping of canonical types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    FixedPoint,
    FloatingPoint,
    Textual,
    Temporal,
    Enum,
    Other,
}

/// Dialect-independent column type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal,
    Numeric,
    Float,
    Double,
    Char,
    Varchar,
    Text,
    Date,
    DateTime,
    Enum,
    /// A catalog type outside the canonical set, kept lowercase
    Other(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            DataType::TinyInt => "tinyint",
            DataType::SmallInt => "smallint",
            DataType::MediumInt => "mediumint",
            DataType::Int => "int",
            DataType::BigInt => "bigint",
            DataType::Decimal => "decimal",
            DataType::Numeric => "numeric",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Char => "char",
            DataType::Varchar => "varchar",
            DataType::Text => "text",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Enum => "enum",
            DataType::Other(name) => name,
        }
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            DataType::TinyInt
            | DataType::SmallInt
            | DataType::MediumInt
            | DataType::Int
            | DataType::BigInt => TypeFamily::Integer,
            DataType::Decimal | DataType::Numeric => TypeFamily::FixedPoint,
            DataType::Float | DataType::Double => TypeFamily::FloatingPoint,
            DataType::Char | DataType::Varchar | DataType::Text => TypeFamily::Textual,
            DataType::Date | DataType::DateTime => TypeFamily::Temporal,
            DataType::Enum => TypeFamily::Enum,
            DataType::Other(_) => TypeFamily::Other,
        }
    }

    /// Integer, fixed-point and floating-point types; catalog types outside
    /// the canonical set are given the benefit of the doubt
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.family(),
            TypeFamily::Integer | TypeFamily::FixedPoint | TypeFamily::FloatingPoint | TypeFamily::Other
        )
    }

    /// Types whose values travel as quoted strings
    pub fn is_string_like(&self) -> bool {
        matches!(
            self.family(),
            TypeFamily::Textual | TypeFamily::Temporal | TypeFamily::Enum
        )
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let data_type = match lowered.as_str() {
            "" => {
                return Err(Error::MalformedSchema("empty data type".to_string()));
            }
            "tinyint" => DataType::TinyInt,
            "smallint" => DataType::SmallInt,
            "mediumint" => DataType::MediumInt,
            "int" | "integer" => DataType::Int,
            "bigint" => DataType::BigInt,
            "decimal" => DataType::Decimal,
            "numeric" => DataType::Numeric,
            "float" => DataType::Float,
            "double" => DataType::Double,
            "char" => DataType::Char,
            "varchar" => DataType::Varchar,
            "text" => DataType::Text,
            "date" => DataType::Date,
            "datetime" => DataType::DateTime,
            "enum" => DataType::Enum,
            _ => DataType::Other(lowered),
        };
        Ok(data_type)
    }
}

impl TryFrom<String> for DataType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column's index participation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyRole {
    #[default]
    None,
    Primary,
    Unique,
    Multi,
}

impl KeyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRole::None => "",
            KeyRole::Primary => "PRI",
            KeyRole::Unique => "UNI",
            KeyRole::Multi => "MUL",
        }
    }

    /// Unique and multi roles are backed by a named secondary index
    pub fn is_indexed(&self) -> bool {
        matches!(self, KeyRole::Unique | KeyRole::Multi)
    }
}

impl FromStr for KeyRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" => Ok(KeyRole::None),
            "PRI" => Ok(KeyRole::Primary),
            "UNI" => Ok(KeyRole::Unique),
            "MUL" => Ok(KeyRole::Multi),
            other => Err(Error::MalformedSchema(format!("unknown key role `{}`", other))),
        }
    }
}

impl TryFrom<String> for KeyRole {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<KeyRole> for String {
    fn from(value: KeyRole) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::None => f.write_str("none"),
            role => f.write_str(role.as_str()),
        }
    }
}
