//! Content fingerprints for schemas and tables
//!
//! A fingerprint is the SHA-256 of an object's canonical JSON form. Maps in
//! the schema model are ordered, so the JSON and therefore the hash are
//! stable across runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::schema::types::{EnumRow, Schema, Table};

/// The parts of a schema that make up its content
#[derive(Serialize)]
struct CanonicalSchema<'a> {
    name: &'a str,
    tables: &'a BTreeMap<String, Table>,
    enums: &'a BTreeMap<String, Vec<EnumRow>>,
}

fn digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint a whole schema; the host reference is not part of it
pub fn fingerprint_schema(schema: &Schema) -> Result<String> {
    digest(&CanonicalSchema {
        name: &schema.name,
        tables: &schema.tables,
        enums: &schema.enums,
    })
}

pub fn fingerprint_table(table: &Table) -> Result<String> {
    digest(table)
}

/// Fingerprint the ordered rows of an enum-valued table
pub fn fingerprint_rows(rows: &[EnumRow]) -> Result<String> {
    digest(rows)
}

/// Table fingerprints persisted between runs, so that callers generating
/// code per table can skip the ones that have not changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureCache {
    tables: BTreeMap<String, String>,
}

impl SignatureCache {
    /// Load a cache file; a missing file yields an empty cache
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn get(&self, table: &str) -> Option<&str> {
        self.tables.get(table).map(String::as_str)
    }

    /// Tables of `schema` whose fingerprint differs from the recorded one
    pub fn stale_tables<'a>(&self, schema: &'a Schema) -> Result<Vec<&'a Table>> {
        let mut stale = Vec::new();
        for table in schema.tables.values() {
            let current = fingerprint_table(table)?;
            if self.get(&table.name) != Some(current.as_str()) {
                stale.push(table);
            }
        }
        Ok(stale)
    }

    /// Remember the current fingerprint of `table`
    pub fn record(&mut self, table: &Table) -> Result<()> {
        let fingerprint = fingerprint_table(table)?;
        self.tables.insert(table.name.clone(), fingerprint);
        Ok(())
    }

    /// Forget tables that no longer exist in `schema`
    pub fn retain_existing(&mut self, schema: &Schema) {
        self.tables.retain(|name, _| schema.tables.contains_key(name));
    }
}
