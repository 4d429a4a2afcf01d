//! Per-dialect catalog access
//!
//! A [`Connector`] knows how to open a connection for its dialect and how to
//! read tables, columns and enum rows back out of that dialect's catalog.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::{Config, ConnectionConfig};
use crate::db::connection::DatabaseConnection;
use crate::db::mysql::MySqlConnector;
use crate::db::sqlite::SqliteConnector;
use crate::error::Result;
use crate::schema::dialect::Dialect;
use crate::schema::generator;
use crate::schema::types::{Column, EnumRow, Schema, Table};

/// Catalog access for one dialect
#[async_trait]
pub trait Connector: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Open a connection using this connector's settings
    async fn connect(&self) -> Result<DatabaseConnection>;

    /// Make `database_name` the current database of `conn`
    async fn use_database(&self, conn: &mut DatabaseConnection, database_name: &str) -> Result<()>;

    /// Every base table of the database, columns included, keyed by name
    async fn fetch_tables(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
    ) -> Result<BTreeMap<String, Table>>;

    /// Columns of one table keyed by name
    async fn fetch_columns(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
        table_name: &str,
    ) -> Result<BTreeMap<String, Column>>;

    /// All rows of an enum-valued table, ordered by primary key
    async fn fetch_enum_rows(
        &self,
        conn: &mut DatabaseConnection,
        database_name: &str,
        table_name: &str,
    ) -> Result<Vec<EnumRow>>;

    /// Script moving `target` to `authoritative` in this connector's dialect
    fn create_change_sql(&self, authoritative: &Schema, target: &Schema) -> Result<String> {
        generator::create_change_sql(authoritative, target, self.dialect())
    }
}

/// Connector for the configured database type
pub fn connector_for(config: &Config) -> Box<dyn Connector> {
    connector_for_dialect(config.database_type, config.connection.clone())
}

pub fn connector_for_dialect(dialect: Dialect, connection: ConnectionConfig) -> Box<dyn Connector> {
    match dialect {
        Dialect::MySql => Box::new(MySqlConnector::new(connection)),
        Dialect::Sqlite => Box::new(SqliteConnector::new(connection)),
    }
}
