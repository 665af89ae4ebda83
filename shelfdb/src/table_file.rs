// Table file I/O - one JSON object per file, keyed by the table name

use crate::error::{Result, ShelfDbError};
use crate::paths;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

/// A single table row: a schemaless mapping from field name to JSON value.
pub type Record = Map<String, Value>;

/// Read a table file and return its ordered records.
/// Fails with `TableNotFound` when the file does not exist and with
/// `Decode` when the content is not a single-key object holding an array
/// of records.
pub fn read(root: &Path, table: &str) -> Result<Vec<Record>> {
    let path = paths::table_file(root, table);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ShelfDbError::TableNotFound(table.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    decode(table, &text).map_err(|message| ShelfDbError::Decode {
        file: format!("{table}.json"),
        message,
    })
}

/// Serialize `{ table: records }` with two-space indentation and replace
/// the table file atomically (temp file in the same directory + rename),
/// keeping the on-disk form human-diffable.
pub fn write(root: &Path, table: &str, records: &[Record]) -> Result<()> {
    let mut doc = Map::new();
    doc.insert(table.to_string(), serde_json::to_value(records)?);
    let text = serde_json::to_string_pretty(&Value::Object(doc))?;

    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(text.as_bytes())?;
    tmp.persist(paths::table_file(root, table))
        .map_err(|e| ShelfDbError::Io(e.error))?;
    Ok(())
}

/// True iff the table's file exists and is a regular file.
pub fn exists(root: &Path, table: &str) -> bool {
    std::fs::metadata(paths::table_file(root, table))
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Parse the file content of `table`: a JSON object whose `table` key holds
/// the record array. Returns a plain message so callers can attach the
/// offending file name.
pub(crate) fn decode(table: &str, text: &str) -> std::result::Result<Vec<Record>, String> {
    let mut doc: Map<String, Value> =
        serde_json::from_str(text).map_err(|e| e.to_string())?;
    let rows = doc
        .remove(table)
        .ok_or_else(|| format!("missing top-level key '{table}'"))?;
    serde_json::from_value(rows)
        .map_err(|e| format!("table value is not an array of records: {e}"))
}
