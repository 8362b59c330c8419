//! IDL parsing utilities

use crate::error::SchemaError;
use crate::schema::Schema;
use crate::types::IdlSpec;
use std::fs;
use std::path::Path;

pub fn parse_idl_content(content: &str) -> Result<IdlSpec, SchemaError> {
    serde_json::from_str(content).map_err(|e| SchemaError::Parse {
        source: e.to_string(),
    })
}

/// Reads an IDL file and converts it into a [`Schema`].
pub fn parse_schema_file<P: AsRef<Path>>(path: P) -> Result<Schema, SchemaError> {
    let content = fs::read_to_string(&path).map_err(|e| SchemaError::Read {
        path: format!("{:?}", path.as_ref()),
        source: e.to_string(),
    })?;

    parse_schema_content(&content)
}

pub fn parse_schema_content(content: &str) -> Result<Schema, SchemaError> {
    Schema::from_idl(&parse_idl_content(content)?)
}
