//! DDL generator
//!
//! Renders a [`SchemaDiff`] as a script of dialect-specific statements, each
//! terminated with `;\n`, in change-set order.

use tracing::debug;

use crate::error::Result;
use crate::query::{delete, insert, ModelDescriptor, Value};
use crate::schema::dialect::Dialect;
use crate::schema::diff::{Change, SchemaDiff};
use crate::schema::signature::fingerprint_schema;
use crate::schema::types::{Column, EnumRow, KeyRole, Schema, Table};
use crate::utils::naming::index_name;

/// Suffix of the temporary column used when SQLite rebuilds a column
const REBUILD_SUFFIX: &str = "__old";

/// Diff `target` against `authoritative` and render the resulting script.
///
/// Returns an empty script straight away when both schemas fingerprint
/// identically.
pub fn create_change_sql(authoritative: &Schema, target: &Schema, dialect: Dialect) -> Result<String> {
    if fingerprint_schema(authoritative)? == fingerprint_schema(target)? {
        debug!(schema = %authoritative.name, "fingerprints match, nothing to change");
        return Ok(String::new());
    }

    let diff = SchemaDiff::generate(authoritative, target, dialect)?;
    DdlGenerator::new(dialect).generate(&diff)
}

/// Full creation script for `schema`, including enum rows
pub fn export_sql(schema: &Schema, dialect: Dialect) -> Result<String> {
    create_change_sql(schema, &Schema::new(&schema.name), dialect)
}

/// Change-set renderer for one dialect
pub struct DdlGenerator {
    dialect: Dialect,
}

impl DdlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Render the whole change set as one script
    pub fn generate(&self, diff: &SchemaDiff) -> Result<String> {
        let mut script = String::new();
        for change in diff.iter() {
            for statement in self.statements(change)? {
                script.push_str(&statement);
                script.push_str(";\n");
            }
        }
        Ok(script)
    }

    /// Statements for a single change, without terminators
    pub fn statements(&self, change: &Change) -> Result<Vec<String>> {
        let statements = match change {
            Change::CreateTable(table) => self.create_table(table)?,
            Change::DropTable(name) => vec![format!("DROP TABLE {}", self.ident(name))],
            Change::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.ident(table),
                self.dialect.column_definition(table, column)?
            )],
            Change::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.ident(table),
                self.ident(column)
            )],
            Change::ModifyColumn { table, before, after } => self.modify_column(table, before, after)?,
            Change::AddIndex { table, column, unique } => vec![self.add_index(table, column, *unique)],
            Change::DropIndex { table, column, unique } => vec![self.drop_index(table, column, *unique)],
            Change::ReplaceRows { table, rows } => replace_rows(table, rows, self.dialect)?,
        };
        Ok(statements)
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_ident(name)
    }

    fn create_table(&self, table: &Table) -> Result<Vec<String>> {
        let columns = table.columns_by_position();
        let mut lines = Vec::new();
        for column in &columns {
            lines.push(self.dialect.column_definition(&table.name, column)?);
        }

        match self.dialect {
            Dialect::MySql => {
                for column in &columns {
                    match column.column_key {
                        KeyRole::Primary => {
                            lines.push(format!("PRIMARY KEY ({})", self.ident(&column.name)))
                        }
                        KeyRole::Unique => lines.push(format!(
                            "UNIQUE KEY {} ({})",
                            self.ident(&index_name(&table.name, &column.name, true)),
                            self.ident(&column.name)
                        )),
                        KeyRole::Multi => lines.push(format!(
                            "KEY {} ({})",
                            self.ident(&index_name(&table.name, &column.name, false)),
                            self.ident(&column.name)
                        )),
                        KeyRole::None => {}
                    }
                }

                let mut sql = format!(
                    "CREATE TABLE {} (\n\t{}\n)",
                    self.ident(&table.name),
                    lines.join(",\n\t")
                );
                if !table.engine.is_empty() {
                    sql.push_str(&format!(" ENGINE = {}", table.engine));
                }
                if !table.row_format.is_empty() {
                    sql.push_str(&format!(" ROW_FORMAT = {}", table.row_format));
                }
                if !table.collation.is_empty() {
                    sql.push_str(&format!(" COLLATE = {}", table.collation));
                }
                Ok(vec![sql])
            }
            Dialect::Sqlite => {
                let mut statements = vec![format!(
                    "CREATE TABLE {} (\n\t{}\n)",
                    self.ident(&table.name),
                    lines.join(",\n\t")
                )];
                for column in &columns {
                    if column.column_key.is_indexed() {
                        statements.push(self.add_index(
                            &table.name,
                            &column.name,
                            column.column_key == KeyRole::Unique,
                        ));
                    }
                }
                Ok(statements)
            }
        }
    }

    fn modify_column(&self, table: &str, before: &Column, after: &Column) -> Result<Vec<String>> {
        match self.dialect {
            Dialect::MySql => Ok(vec![format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                self.ident(table),
                self.dialect.column_definition(table, after)?
            )]),
            Dialect::Sqlite => {
                // SQLite has no MODIFY COLUMN: move the old column aside, add
                // the new definition, copy the data across and drop the old one.
                let keeps_index =
                    before.column_key == after.column_key && after.column_key.is_indexed();
                let unique = after.column_key == KeyRole::Unique;
                let old = format!("{}{}", after.name, REBUILD_SUFFIX);

                let mut statements = Vec::new();
                if keeps_index {
                    statements.push(self.drop_index(table, &after.name, unique));
                }
                statements.push(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    self.ident(table),
                    self.ident(&before.name),
                    self.ident(&old)
                ));
                statements.push(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.ident(table),
                    self.dialect.column_definition(table, after)?
                ));
                statements.push(format!(
                    "UPDATE {} SET {} = {}",
                    self.ident(table),
                    self.ident(&after.name),
                    self.dialect.copy_expression(table, after, &old)?
                ));
                statements.push(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.ident(table),
                    self.ident(&old)
                ));
                if keeps_index {
                    statements.push(self.add_index(table, &after.name, unique));
                }
                Ok(statements)
            }
        }
    }

    fn add_index(&self, table: &str, column: &str, unique: bool) -> String {
        let name = index_name(table, column, unique);
        let kind = if unique { "UNIQUE INDEX" } else { "INDEX" };
        match self.dialect {
            Dialect::MySql => format!(
                "ALTER TABLE {} ADD {} {} ({})",
                self.ident(table),
                kind,
                self.ident(&name),
                self.ident(column)
            ),
            Dialect::Sqlite => format!(
                "CREATE {} {} ON {} ({})",
                kind,
                self.ident(&name),
                self.ident(table),
                self.ident(column)
            ),
        }
    }

    fn drop_index(&self, table: &str, column: &str, unique: bool) -> String {
        let name = index_name(table, column, unique);
        match self.dialect {
            Dialect::MySql => format!("ALTER TABLE {} DROP INDEX {}", self.ident(table), self.ident(&name)),
            Dialect::Sqlite => format!("DROP INDEX {}", self.ident(&name)),
        }
    }
}

/// Wipe an enum-valued table and insert its rows, columns in ordinal order
fn replace_rows(table: &Table, rows: &[EnumRow], dialect: Dialect) -> Result<Vec<String>> {
    let model = ModelDescriptor::from_table(table);
    let mut statements = vec![delete(&model).dialect(dialect).try_to_sql()?];

    for row in rows {
        let mut query = insert(&model).dialect(dialect);
        for column in table.columns_by_position() {
            if let Some(value) = row.get(&column.name) {
                query = query.set(&column.name, Value::from_json(value));
            }
        }
        statements.push(query.try_to_sql()?);
    }

    Ok(statements)
}
