//! Database module for dbvc
//!
//! Connections, per-dialect catalog access and the apply runner.

pub mod connection;
pub mod connector;
pub mod executor;
pub mod mysql;
pub mod sqlite;

// Re-export key types
pub use connection::DatabaseConnection;
pub use connector::{connector_for, connector_for_dialect, Connector};
pub use executor::{apply_script, split_statements, CancellationToken, SqlExecutor};
pub use mysql::MySqlConnector;
pub use sqlite::SqliteConnector;
