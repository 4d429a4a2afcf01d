//! Schema loading and saving
//!
//! Schemas come from two places: a JSON document on disk, or a live
//! database read through a [`Connector`].

use serde_json::Value as Json;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::db::connection::DatabaseConnection;
use crate::db::connector::Connector;
use crate::error::{Error, Result};
use crate::schema::types::{Column, Schema, TypeFamily};

/// Conventional file name of a database's schema document
pub fn schema_file_name(database_name: &str) -> String {
    format!("{}.schema.json", database_name)
}

/// Parse and validate a schema document
pub fn parse_schema(json: &str) -> Result<Schema> {
    let mut schema: Schema =
        serde_json::from_str(json).map_err(|e| Error::MalformedSchema(e.to_string()))?;
    schema.validate()?;
    normalize_enum_rows(&mut schema);
    Ok(schema)
}

/// Read a schema document from disk
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let schema = parse_schema(&contents)?;
    debug!(path = %path.display(), tables = schema.tables.len(), "loaded schema file");
    Ok(schema)
}

/// Write a schema document as pretty-printed JSON
pub fn save_to_file(schema: &Schema, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut contents = serde_json::to_string_pretty(schema)?;
    contents.push('\n');
    fs::write(path, contents)?;
    info!(path = %path.display(), tables = schema.tables.len(), "saved schema file");
    Ok(())
}

/// Read the current schema of `database_name`, including the rows of every
/// table listed in `enum_tables`.
///
/// Any failed catalog query aborts the whole load.
pub async fn load_from_live(
    connector: &dyn Connector,
    conn: &mut DatabaseConnection,
    database_name: &str,
    enum_tables: &[String],
) -> Result<Schema> {
    connector.use_database(conn, database_name).await?;

    let mut schema = Schema::new(database_name);
    schema.tables = connector.fetch_tables(conn, database_name).await?;

    for table_name in enum_tables {
        if !schema.tables.contains_key(table_name) {
            return Err(Error::Introspection(format!(
                "enum table `{}` does not exist in `{}`",
                table_name, database_name
            )));
        }
        let rows = connector
            .fetch_enum_rows(conn, database_name, table_name)
            .await?;
        schema.enums.insert(table_name.clone(), rows);
    }

    schema.validate().map_err(|e| match e {
        Error::MalformedSchema(message) => Error::Introspection(message),
        other => other,
    })?;

    info!(
        database = database_name,
        dialect = %connector.dialect(),
        tables = schema.tables.len(),
        enums = schema.enums.len(),
        "loaded live schema"
    );
    Ok(schema)
}

/// Bring a stored value into the JSON shape used for `column`'s type family,
/// so that rows read back from a database compare equal to the document's.
pub fn coerce_enum_value(column: &Column, value: Json) -> Json {
    match (column.data_type.family(), value) {
        (_, Json::Null) => Json::Null,
        (TypeFamily::Integer, Json::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Json::from(n),
            Err(_) => Json::String(s),
        },
        (TypeFamily::Integer, Json::Bool(b)) => Json::from(i64::from(b)),
        (TypeFamily::FixedPoint | TypeFamily::FloatingPoint, Json::String(s)) => {
            match s.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(n) => Json::Number(n),
                None => Json::String(s),
            }
        }
        (TypeFamily::FixedPoint | TypeFamily::FloatingPoint, Json::Number(n)) => {
            match n.as_f64().and_then(serde_json::Number::from_f64) {
                Some(f) => Json::Number(f),
                None => Json::Number(n),
            }
        }
        (TypeFamily::Textual | TypeFamily::Temporal | TypeFamily::Enum, Json::Number(n)) => {
            Json::String(n.to_string())
        }
        (TypeFamily::Textual | TypeFamily::Temporal | TypeFamily::Enum, Json::Bool(b)) => {
            Json::String(String::from(if b { "1" } else { "0" }))
        }
        (_, other) => other,
    }
}

/// Coerce every enum row value of a loaded document
fn normalize_enum_rows(schema: &mut Schema) {
    for (table_name, rows) in schema.enums.iter_mut() {
        let Some(table) = schema.tables.get(table_name) else {
            continue;
        };
        for row in rows.iter_mut() {
            for (column_name, value) in row.iter_mut() {
                if let Some(column) = table.columns.get(column_name) {
                    *value = coerce_enum_value(column, value.take());
                }
            }
        }
    }
}
