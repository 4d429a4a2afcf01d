//! Dialect translation
//!
//! Maps canonical column types onto the native declarations of a target
//! dialect and renders column definitions with that dialect's quoting rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::types::{Column, DataType, KeyRole, TypeFamily};
use crate::utils::naming::{quote_escaped_literal, quote_ident, quote_literal};

/// Defaults that are expressions rather than literals
static KEYWORD_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(null|current_timestamp(\(\d*\))?|current_date|current_time|now\(\d*\)|localtime(stamp)?|true|false)$",
    )
    .expect("keyword default pattern is valid")
});

/// MySQL reports this marker in EXTRA for expression defaults; it is not DDL
static GENERATED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdefault_generated\b").expect("generated marker pattern is valid")
});

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Rich dialect: native types, inline indexes, information_schema catalog
    MySql,
    /// Simple dialect: promoted types, standalone indexes, pragma catalog
    Sqlite,
}

/// The attributes of a column that a dialect can tell apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSignature {
    pub data_type: String,
    pub native: String,
    pub nullable: bool,
    pub default: String,
    pub unsigned: bool,
    pub extra: String,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    fn ambiguous(&self, table: &str, column: &Column) -> Error {
        Error::AmbiguousTypeMapping {
            table: table.to_string(),
            column: column.name.clone(),
            data_type: column.data_type.to_string(),
            dialect: self.name().to_string(),
        }
    }

    /// Native type declaration of `column` in this dialect
    pub fn native_type(&self, table: &str, column: &Column) -> Result<String> {
        match self {
            Dialect::MySql => {
                if !column.column_type.trim().is_empty() {
                    return Ok(column.column_type.trim().to_string());
                }
                self.derive_rich_type(table, column)
            }
            Dialect::Sqlite => {
                let native = match (&column.data_type, column.data_type.family()) {
                    (DataType::Decimal | DataType::Float, _) => "NUMERIC",
                    (_, TypeFamily::Integer) => "INTEGER",
                    (_, TypeFamily::Textual | TypeFamily::Temporal | TypeFamily::Enum) => "TEXT",
                    _ => return Err(self.ambiguous(table, column)),
                };
                Ok(native.to_string())
            }
        }
    }

    fn derive_rich_type(&self, table: &str, column: &Column) -> Result<String> {
        let name = column.data_type.as_str();
        let native = match column.data_type.family() {
            TypeFamily::Integer if column.is_unsigned => format!("{} unsigned", name),
            TypeFamily::Integer => name.to_string(),
            TypeFamily::FixedPoint | TypeFamily::FloatingPoint if column.precision > 0 => {
                format!("{}({},{})", name, column.precision, column.numeric_scale)
            }
            TypeFamily::FixedPoint | TypeFamily::FloatingPoint => name.to_string(),
            TypeFamily::Textual if column.data_type == DataType::Text => name.to_string(),
            TypeFamily::Textual if column.max_length > 0 => {
                format!("{}({})", name, column.max_length)
            }
            // varchar/char without a length and enum without its value list
            TypeFamily::Textual | TypeFamily::Enum => return Err(self.ambiguous(table, column)),
            TypeFamily::Temporal | TypeFamily::Other => name.to_string(),
        };
        Ok(native)
    }

    /// Whether a backslash inside a quoted literal starts an escape sequence
    pub fn backslash_escapes(&self) -> bool {
        *self == Dialect::MySql
    }

    /// Quote an identifier. MySQL always uses backticks; SQLite leaves plain
    /// names bare and backticks the rest.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => quote_ident(name),
            Dialect::Sqlite if is_plain_sqlite_ident(name) => name.to_string(),
            Dialect::Sqlite => quote_ident(name),
        }
    }

    /// Quote a string literal
    pub fn quote_literal(&self, value: &str) -> String {
        if self.backslash_escapes() {
            quote_escaped_literal(value)
        } else {
            quote_literal(value)
        }
    }

    /// Whether defaults of this column are written as string literals
    fn quotes_default(&self, table: &str, column: &Column) -> Result<bool> {
        Ok(match self {
            Dialect::MySql => column.data_type.is_string_like(),
            Dialect::Sqlite => self.native_type(table, column)? == "TEXT",
        })
    }

    /// SQLite refuses `ADD COLUMN ... NOT NULL` without a default on a table
    /// that holds rows, so plain NOT NULL columns get a zero default
    fn fills_default(&self, column: &Column) -> bool {
        *self == Dialect::Sqlite
            && !column.is_nullable
            && column.default.is_empty()
            && column.column_key != KeyRole::Primary
            && !column.is_auto_increment()
    }

    /// The default value of `column` as it is written after `DEFAULT`
    pub fn default_literal(&self, table: &str, column: &Column) -> Result<Option<String>> {
        let default = column.default.as_str();
        let quoted = self.quotes_default(table, column)?;

        let rich_temporal = *self == Dialect::MySql && column.data_type.family() == TypeFamily::Temporal;
        if !quoted || rich_temporal {
            if default.is_empty() {
                return Ok(self.fills_default(column).then(|| "0".to_string()));
            }
            if !quoted || KEYWORD_DEFAULT.is_match(default) || is_quoted(default) {
                return Ok(Some(default.to_string()));
            }
            return Ok(Some(self.quote_literal(default)));
        }

        // Textual columns: a NOT NULL column always gets a literal, even an
        // empty one; a nullable column only when it has a value.
        let text_without_default = *self == Dialect::MySql
            && matches!(column.data_type, DataType::Text | DataType::Enum)
            && default.is_empty();
        if text_without_default || column.is_nullable && default.is_empty() {
            return Ok(None);
        }
        if KEYWORD_DEFAULT.is_match(default) || is_quoted(default) {
            return Ok(Some(default.to_string()));
        }
        Ok(Some(self.quote_literal(default)))
    }

    /// The `DEFAULT ...` clause for `column`, if any
    pub fn render_default(&self, table: &str, column: &Column) -> Result<Option<String>> {
        Ok(self
            .default_literal(table, column)?
            .map(|literal| format!("DEFAULT {}", literal)))
    }

    /// Expression that copies `source` into `column` during a rebuild; NULLs
    /// are replaced by the default when the column no longer accepts them
    pub fn copy_expression(&self, table: &str, column: &Column, source: &str) -> Result<String> {
        let source = self.quote_ident(source);
        if column.is_nullable {
            return Ok(source);
        }
        Ok(match self.default_literal(table, column)? {
            Some(literal) if !literal.eq_ignore_ascii_case("null") => {
                format!("COALESCE({}, {})", source, literal)
            }
            _ => source,
        })
    }

    /// Full column definition as it appears in CREATE TABLE and ADD COLUMN
    pub fn column_definition(&self, table: &str, column: &Column) -> Result<String> {
        let native = self.native_type(table, column)?;
        let null = if column.is_nullable { "NULL" } else { "NOT NULL" };
        let mut parts = vec![self.quote_ident(&column.name), native.clone(), null.to_string()];

        if let Some(default) = self.render_default(table, column)? {
            parts.push(default);
        }

        match self {
            Dialect::MySql => {
                let extra = rich_extra(&column.extra);
                if !extra.is_empty() {
                    parts.push(extra);
                }
            }
            Dialect::Sqlite => {
                if column.column_key == KeyRole::Primary {
                    parts.push("PRIMARY KEY".to_string());
                    if column.is_auto_increment() && native == "INTEGER" {
                        parts.push("AUTOINCREMENT".to_string());
                    }
                }
            }
        }

        Ok(parts.join(" "))
    }

    /// Reduce a column to the attributes this dialect preserves, so that
    /// a file column and its introspected counterpart compare equal
    pub fn signature(&self, table: &str, column: &Column) -> Result<ColumnSignature> {
        let signature = match self {
            Dialect::MySql => ColumnSignature {
                data_type: column.data_type.as_str().to_string(),
                native: self.native_type(table, column)?.to_ascii_lowercase(),
                nullable: column.is_nullable,
                default: normalize_default(&column.default),
                unsigned: column.is_unsigned,
                extra: rich_extra(&column.extra).to_ascii_lowercase(),
            },
            Dialect::Sqlite => ColumnSignature {
                data_type: String::new(),
                native: self.native_type(table, column)?,
                nullable: column.is_nullable,
                default: normalize_default(&self.default_literal(table, column)?.unwrap_or_default()),
                unsigned: false,
                extra: if column.is_auto_increment() {
                    "auto_increment".to_string()
                } else {
                    String::new()
                },
            },
        };
        Ok(signature)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SQLite keywords; a column or table named after one has to be quoted
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS", "CURRENT",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT", "DEFERRABLE",
    "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH", "ELSE", "END",
    "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL", "FILTER", "FIRST",
    "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB", "GROUP", "GROUPS", "HAVING",
    "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED", "INITIALLY", "INNER", "INSERT",
    "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY", "LAST", "LEFT", "LIKE", "LIMIT",
    "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT", "NOTHING", "NOTNULL", "NULL", "NULLS", "OF",
    "OFFSET", "ON", "OR", "ORDER", "OTHERS", "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA",
    "PRECEDING", "PRIMARY", "QUERY", "RAISE", "RANGE", "RECURSIVE", "REFERENCES", "REGEXP",
    "REINDEX", "RELEASE", "RENAME", "REPLACE", "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW",
    "ROWS", "SAVEPOINT", "SELECT", "SET", "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO",
    "TRANSACTION", "TRIGGER", "UNBOUNDED", "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES",
    "VIEW", "VIRTUAL", "WHEN", "WHERE", "WINDOW", "WITH", "WITHOUT",
];

fn is_plain_sqlite_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && SQLITE_KEYWORDS
            .binary_search(&name.to_ascii_uppercase().as_str())
            .is_err()
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'')
}

fn rich_extra(extra: &str) -> String {
    GENERATED_MARKER
        .replace_all(extra, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip literal quoting and fold an explicit NULL onto "no default"
pub fn normalize_default(default: &str) -> String {
    let trimmed = default.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return String::new();
    }
    if is_quoted(trimmed) {
        return trimmed[1..trimmed.len() - 1].replace("''", "'");
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(DataType::TinyInt, "INTEGER")]
    #[case(DataType::BigInt, "INTEGER")]
    #[case(DataType::Varchar, "TEXT")]
    #[case(DataType::Text, "TEXT")]
    #[case(DataType::DateTime, "TEXT")]
    #[case(DataType::Date, "TEXT")]
    #[case(DataType::Enum, "TEXT")]
    #[case(DataType::Decimal, "NUMERIC")]
    #[case(DataType::Float, "NUMERIC")]
    fn sqlite_type_mapping(#[case] data_type: DataType, #[case] expected: &str) {
        let column = Column::new("c", data_type);
        assert_eq!(Dialect::Sqlite.native_type("t", &column).unwrap(), expected);
    }

    #[rstest]
    #[case(DataType::Double)]
    #[case(DataType::Numeric)]
    #[case(DataType::Other("json".to_string()))]
    fn sqlite_rejects_unmapped_types(#[case] data_type: DataType) {
        let column = Column::new("c", data_type);
        assert!(matches!(
            Dialect::Sqlite.native_type("t", &column),
            Err(Error::AmbiguousTypeMapping { .. })
        ));
    }

    #[test]
    fn mysql_passes_native_type_through() {
        let column = Column::new("c", DataType::Int).native("int(10) unsigned");
        assert_eq!(Dialect::MySql.native_type("t", &column).unwrap(), "int(10) unsigned");
    }

    #[rstest]
    #[case(Column::new("c", DataType::Int).unsigned(), "int unsigned")]
    #[case(Column::new("c", DataType::Decimal).precision(10, 2), "decimal(10,2)")]
    #[case(Column::new("c", DataType::Varchar).max_length(32), "varchar(32)")]
    #[case(Column::new("c", DataType::Text), "text")]
    #[case(Column::new("c", DataType::DateTime), "datetime")]
    fn mysql_derives_missing_native_type(#[case] column: Column, #[case] expected: &str) {
        assert_eq!(Dialect::MySql.native_type("t", &column).unwrap(), expected);
    }

    #[test]
    fn mysql_enum_needs_its_value_list() {
        let column = Column::new("c", DataType::Enum);
        assert!(Dialect::MySql.native_type("t", &column).is_err());
    }

    #[rstest]
    #[case(Column::new("Name", DataType::Varchar).native("varchar(32)"), "`Name` varchar(32) NOT NULL DEFAULT ''")]
    #[case(Column::new("Name", DataType::Varchar).native("varchar(32)").nullable(true), "`Name` varchar(32) NULL")]
    #[case(Column::new("Qty", DataType::Int).native("int(11)").default("0"), "`Qty` int(11) NOT NULL DEFAULT 0")]
    #[case(Column::new("Id", DataType::Int).native("int(11)").extra("auto_increment"), "`Id` int(11) NOT NULL auto_increment")]
    #[case(Column::new("Note", DataType::Text).native("text"), "`Note` text NOT NULL")]
    #[case(Column::new("Nick", DataType::Varchar).native("varchar(8)").default("O'B"), "`Nick` varchar(8) NOT NULL DEFAULT 'O''B'")]
    #[case(
        Column::new("At", DataType::DateTime).native("datetime").default("CURRENT_TIMESTAMP").extra("DEFAULT_GENERATED"),
        "`At` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP"
    )]
    #[case(Column::new("On", DataType::Date).native("date").default("2020-01-01"), "`On` date NOT NULL DEFAULT '2020-01-01'")]
    #[case(Column::new("Path", DataType::Varchar).native("varchar(8)").default(r"C:\"), r"`Path` varchar(8) NOT NULL DEFAULT 'C:\\'")]
    #[case(Column::new("Qty", DataType::Int).native("int(11)"), "`Qty` int(11) NOT NULL")]
    fn mysql_column_definitions(#[case] column: Column, #[case] expected: &str) {
        assert_eq!(Dialect::MySql.column_definition("t", &column).unwrap(), expected);
    }

    #[rstest]
    #[case(
        Column::new("UserID", DataType::Int).key(KeyRole::Primary).extra("auto_increment"),
        "UserID INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT"
    )]
    #[case(Column::new("Email", DataType::Varchar), "Email TEXT NOT NULL DEFAULT ''")]
    #[case(Column::new("Email", DataType::Varchar).nullable(true), "Email TEXT NULL")]
    #[case(Column::new("Price", DataType::Decimal).default("0.00"), "Price NUMERIC NOT NULL DEFAULT 0.00")]
    #[case(Column::new("Qty", DataType::Int), "Qty INTEGER NOT NULL DEFAULT 0")]
    #[case(Column::new("Qty", DataType::Int).nullable(true), "Qty INTEGER NULL")]
    #[case(Column::new("Price", DataType::Decimal), "Price NUMERIC NOT NULL DEFAULT 0")]
    #[case(Column::new("Order", DataType::Varchar).nullable(true), "`Order` TEXT NULL")]
    #[case(Column::new("Path", DataType::Varchar).default(r"C:\"), r"Path TEXT NOT NULL DEFAULT 'C:\'")]
    fn sqlite_column_definitions(#[case] column: Column, #[case] expected: &str) {
        assert_eq!(Dialect::Sqlite.column_definition("t", &column).unwrap(), expected);
    }

    #[rstest]
    #[case("", "")]
    #[case("NULL", "")]
    #[case("''", "")]
    #[case("'O''B'", "O'B")]
    #[case(" 0 ", "0")]
    #[case("CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP")]
    fn default_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_default(input), expected);
    }

    #[test]
    fn sqlite_signature_ignores_canonical_spelling() {
        let file = Column::new("Email", DataType::Varchar).native("varchar(255)").max_length(255);
        let live = Column::new("Email", DataType::Text).native("TEXT").default("''");
        assert_eq!(
            Dialect::Sqlite.signature("t", &file).unwrap(),
            Dialect::Sqlite.signature("t", &live).unwrap()
        );
        assert_ne!(
            Dialect::MySql.signature("t", &file).unwrap(),
            Dialect::MySql.signature("t", &live).unwrap()
        );
    }

    #[rstest]
    #[case("Users", "Users")]
    #[case("user_roles", "user_roles")]
    #[case("Order", "`Order`")]
    #[case("group", "`group`")]
    #[case("Unit Price", "`Unit Price`")]
    #[case("2fa", "`2fa`")]
    fn sqlite_quotes_only_identifiers_that_need_it(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(Dialect::Sqlite.quote_ident(name), expected);
        assert_eq!(Dialect::MySql.quote_ident(name), format!("`{}`", name));
    }

    #[test]
    fn sqlite_keywords_are_sorted_for_lookup() {
        let mut sorted = SQLITE_KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, SQLITE_KEYWORDS);
    }

    #[test]
    fn sqlite_fill_default_matches_an_introspected_zero() {
        let file = Column::new("Qty", DataType::Int);
        let live = Column::new("Qty", DataType::Int).native("INTEGER").default("0");
        assert_eq!(
            Dialect::Sqlite.signature("t", &file).unwrap(),
            Dialect::Sqlite.signature("t", &live).unwrap()
        );
        assert_ne!(
            Dialect::MySql.signature("t", &file).unwrap(),
            Dialect::MySql.signature("t", &live).unwrap()
        );
    }

    #[rstest]
    #[case(Column::new("Qty", DataType::Int), "COALESCE(Qty__old, 0)")]
    #[case(Column::new("Qty", DataType::Int).nullable(true), "Qty__old")]
    #[case(Column::new("Name", DataType::Varchar), "COALESCE(Name__old, '')")]
    #[case(Column::new("Id", DataType::Int).key(KeyRole::Primary), "Id__old")]
    fn rebuild_copies_fill_nulls_for_not_null_columns(#[case] column: Column, #[case] expected: &str) {
        let source = format!("{}__old", column.name);
        assert_eq!(
            Dialect::Sqlite.copy_expression("t", &column, &source).unwrap(),
            expected
        );
    }
}
