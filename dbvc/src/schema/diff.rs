//! Schema difference calculator
//!
//! Compares an authoritative schema against a target schema and produces
//! the ordered list of changes that turns the target into the authoritative
//! one. Tables are visited in name order and columns in ordinal order, so
//! identical inputs always produce the identical change list.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;
use crate::schema::signature::fingerprint_rows;
use crate::schema::types::{Column, EnumRow, KeyRole, Schema, Table};

/// A single change record
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateTable(Table),
    DropTable(String),
    AddColumn { table: String, column: Column },
    DropColumn { table: String, column: String },
    ModifyColumn { table: String, before: Column, after: Column },
    AddIndex { table: String, column: String, unique: bool },
    DropIndex { table: String, column: String, unique: bool },
    /// Replace the contents of an enum-valued table
    ReplaceRows { table: Table, rows: Vec<EnumRow> },
}

impl Change {
    /// Name of the table the change applies to
    pub fn table_name(&self) -> &str {
        match self {
            Change::CreateTable(table) | Change::ReplaceRows { table, .. } => &table.name,
            Change::DropTable(name) => name,
            Change::AddColumn { table, .. }
            | Change::DropColumn { table, .. }
            | Change::ModifyColumn { table, .. }
            | Change::AddIndex { table, .. }
            | Change::DropIndex { table, .. } => table,
        }
    }
}

/// Ordered change set between two schemas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    pub changes: Vec<Change>,
}

impl SchemaDiff {
    /// Generate the changes that bring `target` in line with `authoritative`.
    ///
    /// Every primary-key transition and every column the dialect cannot
    /// express is collected; if there are any, they are returned together
    /// as [`Error::Conflicts`] instead of a partial change set.
    pub fn generate(authoritative: &Schema, target: &Schema, dialect: Dialect) -> Result<Self> {
        let mut differ = Differ {
            dialect,
            changes: Vec::new(),
            conflicts: Vec::new(),
        };

        for (name, table) in &authoritative.tables {
            if !target.tables.contains_key(name) {
                differ.create_table(table, authoritative.enums.get(name));
            }
        }

        for (name, auth_table) in &authoritative.tables {
            let Some(target_table) = target.tables.get(name) else {
                continue;
            };
            differ.diff_table(auth_table, target_table);

            if let (Some(auth_rows), Some(target_rows)) =
                (authoritative.enums.get(name), target.enums.get(name))
            {
                differ.diff_rows(auth_table, auth_rows, target_rows);
            }
        }

        for name in target.tables.keys() {
            if !authoritative.tables.contains_key(name) {
                differ.changes.push(Change::DropTable(name.clone()));
            }
        }

        if !differ.conflicts.is_empty() {
            info!(
                conflicts = differ.conflicts.len(),
                "schema diff found unsupported changes"
            );
            return Err(Error::Conflicts(differ.conflicts));
        }

        info!(
            changes = differ.changes.len(),
            dialect = %dialect,
            "schema diff computed"
        );
        Ok(Self {
            changes: differ.changes,
        })
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }
}

struct Differ {
    dialect: Dialect,
    changes: Vec<Change>,
    conflicts: Vec<Error>,
}

impl Differ {
    fn unsupported(&mut self, table: &str, reason: String) {
        self.conflicts.push(Error::UnsupportedTransition {
            table: table.to_string(),
            reason,
        });
    }

    /// Record a mapping failure for any column this dialect cannot declare
    fn check_mapping(&mut self, table: &str, column: &Column) -> bool {
        match self.dialect.native_type(table, column) {
            Ok(_) => true,
            Err(err) => {
                self.conflicts.push(err);
                false
            }
        }
    }

    fn create_table(&mut self, table: &Table, rows: Option<&Vec<EnumRow>>) {
        let mut mappable = true;
        for column in table.columns_by_position() {
            mappable &= self.check_mapping(&table.name, column);
        }
        if !mappable {
            return;
        }

        debug!(table = %table.name, "table missing from target");
        self.changes.push(Change::CreateTable(table.clone()));
        if let Some(rows) = rows.filter(|rows| !rows.is_empty()) {
            self.changes.push(Change::ReplaceRows {
                table: table.clone(),
                rows: rows.clone(),
            });
        }
    }

    fn diff_table(&mut self, auth: &Table, target: &Table) {
        let table = auth.name.as_str();

        for column in auth.columns_by_position() {
            match target.columns.get(&column.name) {
                None => self.add_column(table, column),
                Some(existing) => self.diff_column(table, column, existing),
            }
        }

        for existing in target.columns_by_position() {
            if auth.columns.contains_key(&existing.name) {
                continue;
            }
            match existing.column_key {
                KeyRole::Primary => self.unsupported(
                    table,
                    format!("dropping primary-key column `{}` requires recreating the table", existing.name),
                ),
                role => {
                    if role.is_indexed() {
                        self.changes.push(Change::DropIndex {
                            table: table.to_string(),
                            column: existing.name.clone(),
                            unique: role == KeyRole::Unique,
                        });
                    }
                    self.changes.push(Change::DropColumn {
                        table: table.to_string(),
                        column: existing.name.clone(),
                    });
                }
            }
        }
    }

    fn add_column(&mut self, table: &str, column: &Column) {
        if column.column_key == KeyRole::Primary {
            self.unsupported(
                table,
                format!("adding primary-key column `{}` requires recreating the table", column.name),
            );
            return;
        }
        if !self.check_mapping(table, column) {
            return;
        }

        self.changes.push(Change::AddColumn {
            table: table.to_string(),
            column: column.clone(),
        });
        if column.column_key.is_indexed() {
            self.changes.push(Change::AddIndex {
                table: table.to_string(),
                column: column.name.clone(),
                unique: column.column_key == KeyRole::Unique,
            });
        }
    }

    fn diff_column(&mut self, table: &str, auth: &Column, target: &Column) {
        let auth_primary = auth.column_key == KeyRole::Primary;
        let target_primary = target.column_key == KeyRole::Primary;
        if auth_primary != target_primary {
            self.unsupported(
                table,
                format!(
                    "primary-key change on `{}` ({} -> {})",
                    auth.name, target.column_key, auth.column_key
                ),
            );
            return;
        }

        let signatures = (
            self.dialect.signature(table, auth),
            self.dialect.signature(table, target),
        );
        let modified = match signatures {
            (Ok(a), Ok(t)) => a != t,
            (a, t) => {
                self.conflicts.extend(a.err());
                self.conflicts.extend(t.err());
                return;
            }
        };

        if modified && auth_primary && self.dialect == Dialect::Sqlite {
            self.unsupported(
                table,
                format!("changing primary-key column `{}` requires recreating the table", auth.name),
            );
            return;
        }

        let (drop, add) = index_transition(target.column_key, auth.column_key);
        if let Some(unique) = drop {
            self.changes.push(Change::DropIndex {
                table: table.to_string(),
                column: auth.name.clone(),
                unique,
            });
        }
        if modified {
            debug!(table, column = %auth.name, "column definition differs");
            self.changes.push(Change::ModifyColumn {
                table: table.to_string(),
                before: target.clone(),
                after: auth.clone(),
            });
        }
        if let Some(unique) = add {
            self.changes.push(Change::AddIndex {
                table: table.to_string(),
                column: auth.name.clone(),
                unique,
            });
        }
    }

    fn diff_rows(&mut self, table: &Table, auth_rows: &[EnumRow], target_rows: &[EnumRow]) {
        let fingerprints = (fingerprint_rows(auth_rows), fingerprint_rows(target_rows));
        match fingerprints {
            (Ok(a), Ok(t)) if a == t => {}
            (Ok(_), Ok(_)) => {
                debug!(table = %table.name, rows = auth_rows.len(), "enum rows differ");
                self.changes.push(Change::ReplaceRows {
                    table: table.clone(),
                    rows: auth_rows.to_vec(),
                });
            }
            (a, t) => {
                self.conflicts.extend(a.err());
                self.conflicts.extend(t.err());
            }
        }
    }
}

/// Index records for a key-role transition from `target` to `authoritative`.
///
/// Returns the uniqueness of the index to drop and of the index to add.
/// Primary-key roles never reach this point.
pub fn index_transition(target: KeyRole, authoritative: KeyRole) -> (Option<bool>, Option<bool>) {
    if target == authoritative {
        return (None, None);
    }
    let drop = target.is_indexed().then_some(target == KeyRole::Unique);
    let add = authoritative
        .is_indexed()
        .then_some(authoritative == KeyRole::Unique);
    (drop, add)
}

/// Apply a change set to an in-memory copy of `schema`
pub fn simulate(diff: &SchemaDiff, schema: &Schema) -> Result<Schema> {
    let mut result = schema.clone();

    for change in diff.iter() {
        if let Change::CreateTable(table) = change {
            result.add_table(table.clone());
            continue;
        }
        if let Change::DropTable(name) = change {
            result.tables.remove(name);
            result.enums.remove(name);
            continue;
        }
        if let Change::ReplaceRows { table, rows } = change {
            result.enums.insert(table.name.clone(), rows.clone());
            continue;
        }

        let name = change.table_name().to_string();
        let table = result.tables.get_mut(&name).ok_or_else(|| Error::UnsupportedTransition {
            table: name.clone(),
            reason: "change targets a table that does not exist".to_string(),
        })?;
        let missing_column = |column: &str| Error::UnsupportedTransition {
            table: name.clone(),
            reason: format!("change targets missing column `{}`", column),
        };

        match change {
            Change::AddColumn { column, .. } => {
                table.add_column(column.clone().key(KeyRole::None));
            }
            Change::DropColumn { column, .. } => {
                table
                    .columns
                    .remove(column)
                    .ok_or_else(|| missing_column(column))?;
            }
            Change::ModifyColumn { after, .. } => {
                let role = table
                    .columns
                    .get(&after.name)
                    .map(|c| c.column_key)
                    .ok_or_else(|| missing_column(&after.name))?;
                table.add_column(after.clone().key(role));
            }
            Change::AddIndex { column, unique, .. } => {
                let existing = table
                    .columns
                    .get_mut(column)
                    .ok_or_else(|| missing_column(column))?;
                existing.column_key = if *unique { KeyRole::Unique } else { KeyRole::Multi };
            }
            Change::DropIndex { column, .. } => {
                let existing = table
                    .columns
                    .get_mut(column)
                    .ok_or_else(|| missing_column(column))?;
                existing.column_key = KeyRole::None;
            }
            Change::CreateTable(_) | Change::DropTable(_) | Change::ReplaceRows { .. } => {}
        }
    }

    Ok(result)
}
