//! Database connection handling
//!
//! A single connection per run, owned by the caller and lent to the loader
//! and the apply runner.

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Executor};
use std::path::PathBuf;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::schema::dialect::Dialect;

const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Enumeration of supported database connections
#[derive(Debug)]
pub enum DatabaseConnection {
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

impl DatabaseConnection {
    /// Open a MySQL connection; `host` may carry a `:port` suffix
    pub async fn connect_mysql(config: &ConnectionConfig) -> Result<Self> {
        let (host, port) = split_host(&config.host)?;
        let mut options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&config.username)
            .database(&config.database_name);
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }

        debug!(host, port, database = %config.database_name, "connecting to mysql");
        let connection = options.connect().await?;
        Ok(DatabaseConnection::MySql(connection))
    }

    /// Open (creating if needed) `<host>/<database_name>.db`
    pub async fn connect_sqlite(config: &ConnectionConfig) -> Result<Self> {
        let path = sqlite_path(config);
        debug!(path = %path.display(), "opening sqlite database");
        let connection = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await?;
        Ok(DatabaseConnection::Sqlite(connection))
    }

    /// In-memory SQLite database, mostly useful for tests and dry runs
    pub async fn sqlite_in_memory() -> Result<Self> {
        let connection = SqliteConnection::connect("sqlite::memory:").await?;
        Ok(DatabaseConnection::Sqlite(connection))
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DatabaseConnection::MySql(_) => Dialect::MySql,
            DatabaseConnection::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Execute a statement over the text protocol, returning affected rows
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = match self {
            DatabaseConnection::MySql(conn) => conn.execute(sql).await?.rows_affected(),
            DatabaseConnection::Sqlite(conn) => conn.execute(sql).await?.rows_affected(),
        };
        Ok(result)
    }

    pub fn as_mysql(&mut self) -> Result<&mut MySqlConnection> {
        match self {
            DatabaseConnection::MySql(conn) => Ok(conn),
            other => Err(Error::Introspection(format!(
                "expected a mysql connection, got {}",
                other.dialect()
            ))),
        }
    }

    pub fn as_sqlite(&mut self) -> Result<&mut SqliteConnection> {
        match self {
            DatabaseConnection::Sqlite(conn) => Ok(conn),
            other => Err(Error::Introspection(format!(
                "expected a sqlite connection, got {}",
                other.dialect()
            ))),
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            DatabaseConnection::MySql(conn) => conn.close().await?,
            DatabaseConnection::Sqlite(conn) => conn.close().await?,
        }
        Ok(())
    }
}

fn split_host(host: &str) -> Result<(&str, u16)> {
    let host = host.trim();
    if host.is_empty() {
        return Ok(("localhost", DEFAULT_MYSQL_PORT));
    }
    match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port in host `{}`", host)))?;
            Ok((name, port))
        }
        None => Ok((host, DEFAULT_MYSQL_PORT)),
    }
}

fn sqlite_path(config: &ConnectionConfig) -> PathBuf {
    let file = format!("{}.db", config.database_name);
    if config.host.trim().is_empty() {
        PathBuf::from(file)
    } else {
        PathBuf::from(config.host.trim()).join(file)
    }
}
