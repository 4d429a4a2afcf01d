//! dbvc: version control for relational database schemas
//!
//! A schema is kept as a JSON document next to the code. dbvc reads the
//! live schema of a MySQL or SQLite database, diffs it against that
//! document, and emits the dialect-specific DDL that brings one in line with
//! the other. The same crate carries a small model-driven query builder.

extern crate self as dbvc;

pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod schema;
pub mod utils;

use tracing::info;

// Re-export main types for easier access
pub use config::Config;
pub use db::{apply_script, connector_for, CancellationToken, Connector, DatabaseConnection};
pub use dbvc_macros::Model;
pub use error::{Error, Result};
pub use schema::{Dialect, Schema, SchemaDiff, SignatureCache};

/// Initialize dbvc with the specified configuration file
pub async fn init(config_path: &str) -> Result<DbvcClient> {
    let config = config::load_from_file(config_path)?;
    DbvcClient::new(config).await
}

/// The main client: one configuration, one connection
pub struct DbvcClient {
    config: Config,
    connector: Box<dyn Connector>,
    connection: DatabaseConnection,
}

impl DbvcClient {
    /// Connect using the configured dialect and connection settings
    pub async fn new(config: Config) -> Result<Self> {
        let connector = connector_for(&config);
        let connection = connector.connect().await?;
        Ok(Self {
            config,
            connector,
            connection,
        })
    }

    /// Wrap an already open connection
    pub fn with_connection(config: Config, connection: DatabaseConnection) -> Self {
        let connector = connector_for(&config);
        Self {
            config,
            connector,
            connection,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.connector.dialect()
    }

    /// Current schema of the configured database
    pub async fn live_schema(&mut self) -> Result<Schema> {
        let mut schema = schema::load_from_live(
            self.connector.as_ref(),
            &mut self.connection,
            &self.config.connection.database_name,
            &self.config.enums,
        )
        .await?;
        schema.host = self.config.connection.host.clone();
        Ok(schema)
    }

    /// The authoritative schema document
    pub fn file_schema(&self) -> Result<Schema> {
        schema::load_from_file(self.config.schema_path())
    }

    /// Read the live schema, write it as the schema document and refresh
    /// the signature cache
    pub async fn import_schema(&mut self) -> Result<Schema> {
        let live = self.live_schema().await?;
        schema::save_to_file(&live, self.config.schema_path())?;

        let cache_path = self.config.cache_path();
        let mut cache = SignatureCache::load(&cache_path)?;
        let stale: Vec<String> = cache
            .stale_tables(&live)?
            .into_iter()
            .map(|t| t.name.clone())
            .collect();
        for name in &stale {
            if let Some(table) = live.table(name) {
                cache.record(table)?;
            }
        }
        cache.retain_existing(&live);
        cache.save(&cache_path)?;

        info!(
            database = %live.name,
            tables = live.tables.len(),
            changed = stale.len(),
            "imported schema"
        );
        Ok(live)
    }

    /// Change script between the schema document and the live database.
    ///
    /// By default the document is authoritative and the script migrates the
    /// database; `reverse` swaps the roles.
    pub async fn compare(&mut self, reverse: bool) -> Result<String> {
        let file = self.file_schema()?;
        let live = self.live_schema().await?;
        if reverse {
            self.connector.create_change_sql(&live, &file)
        } else {
            self.connector.create_change_sql(&file, &live)
        }
    }

    /// Full creation script for the schema document
    pub fn export_sql(&self) -> Result<String> {
        schema::export_sql(&self.file_schema()?, self.dialect())
    }

    /// Run a change script in one transaction; in dry-run mode the script is
    /// only logged
    pub async fn apply_script(&mut self, script: &str, cancel: &CancellationToken) -> Result<usize> {
        if self.config.dry_run() {
            let statements = db::split_statements(script, self.dialect());
            for (i, statement) in statements.iter().enumerate() {
                info!(number = i + 1, sql = %statement, "statement (dry run)");
            }
            return Ok(0);
        }
        apply_script(&mut self.connection, script, cancel).await
    }

    pub async fn close(self) -> Result<()> {
        self.connection.close().await
    }
}
