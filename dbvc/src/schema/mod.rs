//! Schema module for dbvc
//!
//! The schema model, its loaders, the dialect translator, the diff engine
//! and the DDL emitter.

pub mod dialect;
pub mod diff;
pub mod generator;
pub mod loader;
pub mod signature;
pub mod types;

// Re-export key types
pub use dialect::Dialect;
pub use diff::{simulate, Change, SchemaDiff};
pub use generator::{create_change_sql, export_sql, DdlGenerator};
pub use loader::{load_from_file, load_from_live, save_to_file};
pub use signature::{fingerprint_schema, SignatureCache};
pub use types::{Column, DataType, EnumRow, KeyRole, Schema, Table, TypeFamily};
