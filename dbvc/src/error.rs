//! Error types for dbvc

use thiserror::Error;

use crate::query::RenderError;

/// Result type for dbvc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for dbvc
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The authoritative schema document violates a model invariant
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    /// A catalog query failed or returned something unexpected
    #[error("Introspection error: {0}")]
    Introspection(String),

    #[error("Unsupported transition on `{table}`: {reason}")]
    UnsupportedTransition { table: String, reason: String },

    #[error("No native mapping for `{table}`.`{column}` of type {data_type} in the {dialect} dialect")]
    AmbiguousTypeMapping {
        table: String,
        column: String,
        data_type: String,
        dialect: String,
    },

    /// Several diff findings reported together
    #[error("{}", join_conflicts(.0))]
    Conflicts(Vec<Error>),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to apply statement `{statement}`: {message}")]
    Apply { statement: String, message: String },

    #[error("Apply cancelled before statement `{statement}` completed")]
    Cancelled { statement: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn join_conflicts(errors: &[Error]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
    format!("{} diff conflict(s):\n{}", errors.len(), lines.join("\n"))
}

impl Error {
    /// Flatten a conflict list back into its individual findings
    pub fn findings(&self) -> Vec<&Error> {
        match self {
            Error::Conflicts(errors) => errors.iter().flat_map(|e| e.findings()).collect(),
            other => vec![other],
        }
    }
}

/// Convert Serde JSON errors to dbvc errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

/// Convert TOML deserialization errors to dbvc errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}
