//! MySQL catalog access through `information_schema`

use async_trait::async_trait;
use sqlx::{Executor, FromRow, Row};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::db::connection::DatabaseConnection;
use crate::db::connector::Connector;
use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;
use crate::schema::loader::coerce_enum_value;
use crate::schema::types::{Column, DataType, EnumRow, KeyRole, Table};
use crate::utils::naming::quote_ident;

const TABLES_SQL: &str = r#"
SELECT CAST(TABLE_NAME AS CHAR) AS name,
       CAST(COALESCE(ENGINE, '') AS CHAR) AS engine,
       CAST(COALESCE(ROW_FORMAT, '') AS CHAR) AS row_format,
       CAST(COALESCE(TABLE_COLLATION, '') AS CHAR) AS collation,
       CAST(COALESCE(AUTO_INCREMENT, 0) AS SIGNED) AS auto_increment
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME
"#;

const COLUMNS_SQL: &str = r#"
SELECT CAST(COLUMN_NAME AS CHAR) AS name,
       CAST(ORDINAL_POSITION AS SIGNED) AS position,
       CAST(COALESCE(COLUMN_DEFAULT, '') AS CHAR) AS default_value,
       CAST(IF(IS_NULLABLE = 'YES', 1, 0) AS SIGNED) AS is_nullable,
       CAST(DATA_TYPE AS CHAR) AS data_type,
       CAST(COALESCE(CHARACTER_MAXIMUM_LENGTH, 0) AS SIGNED) AS max_length,
       CAST(COALESCE(NUMERIC_PRECISION, 0) AS SIGNED) AS numeric_precision,
       CAST(COALESCE(NUMERIC_SCALE, 0) AS SIGNED) AS numeric_scale,
       CAST(COALESCE(CHARACTER_SET_NAME, '') AS CHAR) AS char_set,
       CAST(COLUMN_TYPE AS CHAR) AS column_type,
       CAST(COLUMN_KEY AS CHAR) AS column_key,
       CAST(EXTRA AS CHAR) AS extra
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION
"#;

#[derive(Debug, FromRow)]
struct TableRow {
    name: String,
    engine: String,
    row_format: String,
    collation: String,
    auto_increment: i64,
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    name: String,
    position: i64,
    default_value: String,
    is_nullable: i64,
    data_type: String,
    max_length: i64,
    numeric_precision: i64,
    numeric_scale: i64,
    char_set: String,
    column_type: String,
    column_key: String,
    extra: String,
}

/// Connector for the rich dialect
pub struct MySqlConnector {
    config: ConnectionConfig,
}

impl MySqlConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn connect(&self) -> Result<DatabaseConnection> {
        DatabaseConnection::connect_mysql(&self.config).await
    }

    async fn use_database(&self, conn: &mut DatabaseConnection, database_name: &str) -> Result<()> {
        let conn = conn.as_mysql()?;
        conn.execute(format!("USE {}", quote_ident(database_name)).as_str())
            .await?;
        debug!(database = database_name, "switched database");
        Ok(())
    }

    async fn fetch_tables(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
    ) -> Result<BTreeMap<String, Table>> {
        let rows = sqlx::query_as::<_, TableRow>(TABLES_SQL)
            .bind(database_name)
            .fetch_all(&mut *conn.as_mysql()?)
            .await?;

        let mut tables = BTreeMap::new();
        for row in rows {
            let mut table = table_from_row(row);
            table.columns = self.fetch_columns(conn, database_name, &table.name).await?;
            tables.insert(table.name.clone(), table);
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
        let rows = sqlx::query_as::<_, ColumnRow>(COLUMNS_SQL)
            .bind(database_name)
            .bind(table_name)
            .fetch_all(&mut *conn.as_mysql()?)
            .await?;

        if rows.is_empty() {
            return Err(Error::Introspection(format!(
                "no columns found for `{}`.`{}`",
                database_name, table_name
            )));
        }

        let mut columns = BTreeMap::new();
        for row in rows {
            let column = column_from_row(table_name, row)?;
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
            .map(|c| format!("CAST({0} AS CHAR) AS {0}", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let order_column = table.primary_key().unwrap_or(ordered[0]);
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            projection,
            quote_ident(table_name),
            quote_ident(&order_column.name)
        );

        let rows = sqlx::query(&sql).fetch_all(&mut *conn.as_mysql()?).await?;
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

fn table_from_row(row: TableRow) -> Table {
    Table {
        engine: row.engine,
        row_format: row.row_format,
        collation: row.collation,
        auto_increment: u64::try_from(row.auto_increment).unwrap_or_default(),
        ..Table::new(&row.name)
    }
}

fn column_from_row(table_name: &str, row: ColumnRow) -> Result<Column> {
    let data_type = row.data_type.parse::<DataType>().map_err(|e| {
        Error::Introspection(format!("`{}`.`{}`: {}", table_name, row.name, e))
    })?;
    if let DataType::Other(name) = &data_type {
        warn!(table = table_name, column = %row.name, data_type = %name, "non-canonical column type");
    }

    let column_key = row.column_key.parse::<KeyRole>().map_err(|_| {
        Error::Introspection(format!(
            "`{}`.`{}` has unknown key role `{}`",
            table_name, row.name, row.column_key
        ))
    })?;

    // Non-numeric columns never carry precision; the catalog reports it for
    // some temporal types.
    let (precision, numeric_scale) = if data_type.is_numeric() {
        (
            u32::try_from(row.numeric_precision).unwrap_or_default(),
            u32::try_from(row.numeric_scale).unwrap_or_default(),
        )
    } else {
        (0, 0)
    };

    Ok(Column {
        name: row.name,
        position: u32::try_from(row.position).unwrap_or_default(),
        default: row.default_value,
        is_nullable: row.is_nullable != 0,
        is_unsigned: row.column_type.to_ascii_lowercase().contains(" unsigned"),
        data_type,
        column_type: row.column_type,
        max_length: u64::try_from(row.max_length).unwrap_or_default(),
        precision,
        numeric_scale,
        char_set: row.char_set,
        column_key,
        extra: row.extra,
    })
}
