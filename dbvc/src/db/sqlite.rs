//! SQLite catalog access through `sqlite_master` and the pragma functions

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{FromRow, Row};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::db::connection::DatabaseConnection;
use crate::db::connector::Connector;
use crate::error::{Error, Result};
use crate::schema::dialect::{normalize_default, Dialect};
use crate::schema::loader::coerce_enum_value;
use crate::schema::types::{Column, DataType, EnumRow, KeyRole, Table};
use crate::utils::naming::{parse_index_name, quote_ident};

static AUTOINCREMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bautoincrement\b").expect("autoincrement pattern is valid"));

static TYPE_LENGTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(\d+)\s*\)").expect("type length pattern is valid"));

const TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const TABLE_SQL: &str = "SELECT COALESCE(sql, '') FROM sqlite_master WHERE type = 'table' AND name = ?1";

const TABLE_INFO_SQL: &str = r#"SELECT cid, name, type AS declared_type, "notnull" AS not_null, dflt_value AS default_value, pk FROM pragma_table_info(?1)"#;

const INDEX_LIST_SQL: &str = r#"SELECT name, "unique" AS is_unique, origin FROM pragma_index_list(?1)"#;

const INDEX_INFO_SQL: &str = "SELECT name FROM pragma_index_info(?1) ORDER BY seqno";

#[derive(Debug, FromRow)]
struct TableInfoRow {
    cid: i64,
    name: String,
    declared_type: String,
    not_null: i64,
    default_value: Option<String>,
    pk: i64,
}

#[derive(Debug, FromRow)]
struct IndexRow {
    name: String,
    is_unique: i64,
    origin: String,
}

/// Connector for the simple dialect
pub struct SqliteConnector {
    config: ConnectionConfig,
}

impl SqliteConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Key role per column, derived from the table's single-column indexes
    async fn fetch_key_roles(
        &self,
        conn: &mut DatabaseConnection,
        table_name: &str,
    ) -> Result<BTreeMap<String, KeyRole>> {
        let indexes = sqlx::query_as::<_, IndexRow>(INDEX_LIST_SQL)
            .bind(table_name)
            .fetch_all(&mut *conn.as_sqlite()?)
            .await?;

        let mut roles = BTreeMap::new();
        for index in indexes {
            let columns: Vec<Option<String>> = sqlx::query_scalar(INDEX_INFO_SQL)
                .bind(&index.name)
                .fetch_all(&mut *conn.as_sqlite()?)
                .await?;
            let [Some(column)] = columns.as_slice() else {
                warn!(table = table_name, index = %index.name, "skipping multi-column or expression index");
                continue;
            };

            let role = index_role(table_name, &index, column);
            // A primary key outranks any secondary index on the same column
            let entry = roles.entry(column.clone()).or_insert(role);
            if role == KeyRole::Primary || (role == KeyRole::Unique && *entry == KeyRole::Multi) {
                *entry = role;
            }
        }
        Ok(roles)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<DatabaseConnection> {
        DatabaseConnection::connect_sqlite(&self.config).await
    }

    /// One database per file, so there is nothing to switch
    async fn use_database(&self, conn: &mut DatabaseConnection, database_name: &str) -> Result<()> {
        conn.as_sqlite()?;
        debug!(database = database_name, "sqlite database selected by file");
        Ok(())
    }

    async fn fetch_tables(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
    ) -> Result<BTreeMap<String, Table>> {
        let names: Vec<String> = sqlx::query_scalar(TABLES_SQL)
            .fetch_all(&mut *conn.as_sqlite()?)
            .await?;

        let mut tables = BTreeMap::new();
        for name in names {
            let mut table = Table::new(&name);
            table.columns = self.fetch_columns(conn, database_name, &name).await?;
            tables.insert(name, table);
        }

        debug!(database = database_name, count = tables.len(), "fetched tables");
        Ok(tables)
    }

    async fn fetch_columns(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
        table_name: &str,
    ) -> Result<BTreeMap<String, Column>> {
        let rows = sqlx::query_as::<_, TableInfoRow>(TABLE_INFO_SQL)
            .bind(table_name)
            .fetch_all(&mut *conn.as_sqlite()?)
            .await?;
        if rows.is_empty() {
            return Err(Error::Introspection(format!(
                "no columns found for `{}`.`{}`",
                database_name, table_name
            )));
        }

        let primaries = rows.iter().filter(|r| r.pk > 0).count();
        if primaries > 1 {
            return Err(Error::Introspection(format!(
                "table `{}` has a composite primary key",
                table_name
            )));
        }

        let create_sql: Option<String> = sqlx::query_scalar(TABLE_SQL)
            .bind(table_name)
            .fetch_optional(&mut *conn.as_sqlite()?)
            .await?;
        let autoincrement = create_sql.map_or(false, |sql| AUTOINCREMENT.is_match(&sql));
        let roles = self.fetch_key_roles(conn, table_name).await?;

        let mut columns = BTreeMap::new();
        for row in rows {
            let role = if row.pk > 0 {
                KeyRole::Primary
            } else {
                roles.get(&row.name).copied().unwrap_or_default()
            };
            let column = column_from_row(row, role, autoincrement);
            columns.insert(column.name.clone(), column);
        }
        Ok(columns)
    }

    async fn fetch_enum_rows(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
        table_name: &str,
    ) -> Result<Vec<EnumRow>> {
        let columns = self.fetch_columns(conn, database_name, table_name).await?;
        let table = Table {
            columns,
            ..Table::new(table_name)
        };
        let ordered = table.columns_by_position();

        let projection = ordered
            .iter()
            .map(|c| format!("CAST({0} AS TEXT) AS {0}", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let order_column = table.primary_key().unwrap_or(ordered[0]);
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            projection,
            quote_ident(table_name),
            quote_ident(&order_column.name)
        );

        let rows = sqlx::query(&sql).fetch_all(&mut *conn.as_sqlite()?).await?;
        let mut enum_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = EnumRow::new();
            for (index, column) in ordered.iter().enumerate() {
                let raw: Option<String> = row.try_get(index)?;
                let value = raw.map(serde_json::Value::String).unwrap_or_default();
                values.insert(column.name.clone(), coerce_enum_value(column, value));
            }
            enum_rows.push(values);
        }

        debug!(table = table_name, rows = enum_rows.len(), "fetched enum rows");
        Ok(enum_rows)
    }
}

fn index_role(table_name: &str, index: &IndexRow, column: &str) -> KeyRole {
    if index.origin == "pk" {
        return KeyRole::Primary;
    }
    let by_flag = if index.is_unique != 0 {
        KeyRole::Unique
    } else {
        KeyRole::Multi
    };
    match parse_index_name(table_name, &index.name) {
        Some((role, named_column)) if role == by_flag && named_column == column => role,
        Some(_) => {
            warn!(table = table_name, index = %index.name, "index name disagrees with its definition");
            by_flag
        }
        None => by_flag,
    }
}

/// Canonical type of a declared SQLite column type.
///
/// Declarations this tool writes map back exactly; anything else falls
/// through SQLite's own affinity rules.
pub fn sqlite_data_type(declared: &str) -> DataType {
    let upper = declared.trim().to_ascii_uppercase();
    let base = upper.split('(').next().unwrap_or_default().trim();
    match base {
        "INTEGER" | "INT" => return DataType::Int,
        "TEXT" => return DataType::Text,
        "NUMERIC" | "DECIMAL" => return DataType::Decimal,
        "REAL" | "FLOAT" | "DOUBLE" => return DataType::Float,
        _ => {}
    }
    if let Ok(data_type) = base.parse::<DataType>() {
        if !matches!(data_type, DataType::Other(_)) {
            return data_type;
        }
    }

    if upper.contains("INT") {
        DataType::Int
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        DataType::Text
    } else if upper.is_empty() || upper.contains("BLOB") {
        DataType::Other("blob".to_string())
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        DataType::Float
    } else {
        DataType::Decimal
    }
}

fn column_from_row(row: TableInfoRow, column_key: KeyRole, autoincrement: bool) -> Column {
    let data_type = sqlite_data_type(&row.declared_type);
    let max_length = if data_type.is_string_like() {
        TYPE_LENGTH
            .captures(&row.declared_type)
            .and_then(|c| c[1].parse::<u64>().ok())
            .unwrap_or_default()
    } else {
        0
    };
    let is_primary = column_key == KeyRole::Primary;

    Column {
        position: u32::try_from(row.cid + 1).unwrap_or_default(),
        default: row.default_value.as_deref().map(normalize_default).unwrap_or_default(),
        is_nullable: row.not_null == 0 && !is_primary,
        data_type,
        column_type: row.declared_type.to_ascii_uppercase(),
        max_length,
        column_key,
        extra: if is_primary && autoincrement {
            "auto_increment".to_string()
        } else {
            String::new()
        },
        ..Column::new(&row.name, DataType::Int)
    }
}
