use crate::error::{Result, ShelfDbError};
use crate::paths;
use crate::query;
use crate::table_file::{self, Record};
use chrono::Utc;
use serde_json::map::Entry;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Table that is always created alongside any explicitly requested ones.
pub const DEFAULT_TABLE: &str = "public";

/// Reserved identity field, assigned at insertion when absent.
const ID_FIELD: &str = "_id";

/// Configuration for opening a [`Store`]. The database root defaults to the
/// platform data directory for `app_name`; `directory` overrides it.
pub struct StoreOptions {
    app_name: String,
    directory: Option<PathBuf>,
}

impl StoreOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        StoreOptions {
            app_name: app_name.into(),
            directory: None,
        }
    }

    /// Use an explicit database directory instead of the platform default.
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }
}

type Cache = HashMap<String, Vec<Record>>;

/// The main entry point for shelfdb.
/// Owns a database directory of one JSON file per table and provides the
/// CRUD, search, and path-query operations. An optional in-memory snapshot
/// of every table ("linked" mode) serves reads without touching disk;
/// writes always persist to disk first and are carried through to the
/// snapshot under the same per-table lock.
pub struct Store {
    root: PathBuf,
    cache: RwLock<Option<Cache>>,
    table_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Store {
    /// Open a store from options. Resolves the database root but performs
    /// no I/O; directories and files appear on [`Store::create_table`].
    pub fn open(options: StoreOptions) -> Result<Self> {
        let root = match options.directory {
            Some(dir) => dir,
            None => paths::database_root(&options.app_name)?,
        };
        Ok(Store {
            root,
            cache: RwLock::new(None),
            table_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The database root directory this store reads and writes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Table lifecycle ────────────────────────────────────────────

    /// Create the given tables (plus [`DEFAULT_TABLE`]) as empty files.
    /// Creation is idempotent: a table whose file already exists is left
    /// untouched and reported as a warning, not an error.
    pub fn create_table<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;

        for name in names.iter().map(|n| n.as_ref()).chain([DEFAULT_TABLE]) {
            if table_file::exists(&self.root, name) {
                log::warn!("{name}.json already exists");
                continue;
            }
            table_file::write(&self.root, name, &[])?;
            if let Some(cache) = self.cache_write().as_mut() {
                cache.entry(name.to_string()).or_default();
            }
        }
        Ok(())
    }

    /// True iff the table's file exists and is a regular file.
    pub fn table_exists(&self, table: &str) -> bool {
        table_file::exists(&self.root, table)
    }

    // ── Record operations ──────────────────────────────────────────

    /// Append records to a table, assigning the identity field (a
    /// millisecond timestamp) to each record that lacks one. Returns the
    /// identities in insertion order. Two inserts within the same
    /// millisecond collide silently; uniqueness is best-effort.
    pub fn insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Value>> {
        if !self.table_exists(table) {
            return Err(ShelfDbError::TableNotFound(table.to_string()));
        }

        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut rows = self.load(table)?;
        let mut ids = Vec::with_capacity(records.len());
        for mut record in records {
            let id = match record.entry(ID_FIELD) {
                Entry::Occupied(e) => e.get().clone(),
                Entry::Vacant(e) => e
                    .insert(Value::from(Utc::now().timestamp_millis()))
                    .clone(),
            };
            ids.push(id);
            rows.push(record);
        }

        self.persist(table, rows)?;
        Ok(ids)
    }

    /// Insert a single record. See [`Store::insert`].
    pub fn insert_one(&self, table: &str, record: Record) -> Result<Value> {
        let mut ids = self.insert(table, vec![record])?;
        Ok(ids.remove(0))
    }

    /// The full ordered record sequence of a table.
    pub fn get_all(&self, table: &str) -> Result<Vec<Record>> {
        self.load(table)
    }

    /// Number of records in a table.
    pub fn count(&self, table: &str) -> Result<usize> {
        Ok(self.load(table)?.len())
    }

    /// Project one field across all records that carry it. Fails with
    /// `FieldNotFound` when no record has the field.
    pub fn get_field(&self, table: &str, field: &str) -> Result<Vec<Value>> {
        let rows = self.load(table)?;
        let values: Vec<Value> = rows.iter().filter_map(|r| r.get(field).cloned()).collect();
        if values.is_empty() {
            return Err(ShelfDbError::FieldNotFound(field.to_string()));
        }
        Ok(values)
    }

    /// All records matching every predicate equality, in table order.
    pub fn get_rows(&self, table: &str, predicate: &Record) -> Result<Vec<Record>> {
        if predicate.is_empty() {
            return Err(ShelfDbError::EmptyPredicate);
        }
        let rows = self.load(table)?;
        Ok(rows.into_iter().filter(|r| matches(r, predicate)).collect())
    }

    /// Patch the single record matching the predicate; when several match,
    /// the last one in table order wins. Every patch field is added or
    /// overwritten on that record.
    pub fn update_row(&self, table: &str, predicate: &Record, patch: &Record) -> Result<()> {
        if predicate.is_empty() {
            return Err(ShelfDbError::EmptyPredicate);
        }

        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut rows = self.load(table)?;
        let mut target = None;
        for (i, row) in rows.iter().enumerate() {
            if matches(row, predicate) {
                target = Some(i);
            }
        }
        let i = target.ok_or(ShelfDbError::RecordNotFound)?;

        for (field, value) in patch {
            rows[i].insert(field.clone(), value.clone());
        }
        self.persist(table, rows)
    }

    /// Case-insensitive substring search over one field. Every value is
    /// stringified and lower-cased before matching. A record lacking the
    /// field aborts the scan with `FieldNotFound`; an empty table yields an
    /// empty result.
    pub fn search(&self, table: &str, field: &str, keyword: &str) -> Result<Vec<Record>> {
        let rows = self.load(table)?;
        let needle = keyword.to_lowercase();

        let mut found = Vec::new();
        for row in rows {
            let matched = match row.get(field) {
                Some(value) => value_text(value).to_lowercase().contains(&needle),
                None => return Err(ShelfDbError::FieldNotFound(field.to_string())),
            };
            if matched {
                found.push(row);
            }
        }
        Ok(found)
    }

    /// Delete every record matching the predicate (unlike update, delete is
    /// multi-match), removing from the highest index downward. Returns the
    /// number of records removed.
    pub fn delete_row(&self, table: &str, predicate: &Record) -> Result<usize> {
        if predicate.is_empty() {
            return Err(ShelfDbError::EmptyPredicate);
        }

        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut rows = self.load(table)?;
        if rows.is_empty() {
            return Err(ShelfDbError::EmptyTable(table.to_string()));
        }

        let matched: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches(row, predicate))
            .map(|(i, _)| i)
            .collect();
        if matched.is_empty() {
            return Err(ShelfDbError::RecordNotFound);
        }

        for &i in matched.iter().rev() {
            rows.remove(i);
        }
        let removed = matched.len();
        self.persist(table, rows)?;
        Ok(removed)
    }

    /// Replace a table's contents with an empty sequence.
    pub fn clear_table(&self, table: &str) -> Result<()> {
        if !self.table_exists(table) {
            return Err(ShelfDbError::TableNotFound(table.to_string()));
        }
        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.persist(table, Vec::new())
    }

    // ── Linked (cached) mode ───────────────────────────────────────

    /// Read every table file into an in-memory snapshot and serve
    /// subsequent reads from it. Fails with `LinkFailed` on the first file
    /// that does not validate, in which case no cache is installed.
    pub fn link(&self) -> Result<()> {
        let snapshot = self.scan()?;
        *self.cache_write() = Some(snapshot);
        Ok(())
    }

    /// Discard the in-memory snapshot. Idempotent.
    pub fn unlink(&self) {
        *self.cache_write() = None;
    }

    /// Whether reads are currently served from memory.
    pub fn is_linked(&self) -> bool {
        self.cache_read().is_some()
    }

    /// Check that every file in the database directory parses as a table
    /// file. Returns false on the first failure (after logging a warning
    /// naming the file) instead of raising.
    pub fn validate_all(&self) -> bool {
        self.scan().is_ok()
    }

    // ── Path queries ───────────────────────────────────────────────

    /// Evaluate a JSONPath expression. While linked the root is the whole
    /// snapshot (one object keyed by table name, so `table` is not
    /// consulted); otherwise the root is the named table's on-disk record
    /// array. [`query::DEFAULT_QUERY`] selects the entire data set.
    pub fn query_path(&self, table: &str, expr: &str) -> Result<Vec<Value>> {
        {
            let cache = self.cache_read();
            if let Some(snapshot) = cache.as_ref() {
                let root = serde_json::to_value(snapshot)?;
                return query::eval(&root, expr);
            }
        }

        let rows = table_file::read(&self.root, table)?;
        let root = Value::Array(rows.into_iter().map(Value::Object).collect());
        query::eval(&root, expr)
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Records of a table: the snapshot when linked, the file otherwise.
    fn load(&self, table: &str) -> Result<Vec<Record>> {
        if let Some(cache) = self.cache_read().as_ref() {
            return cache
                .get(table)
                .cloned()
                .ok_or_else(|| ShelfDbError::TableNotFound(table.to_string()));
        }
        table_file::read(&self.root, table)
    }

    /// Durably write a table, then carry the new contents into the
    /// snapshot. Disk first: a failed write never leaves memory ahead of
    /// disk.
    fn persist(&self, table: &str, rows: Vec<Record>) -> Result<()> {
        table_file::write(&self.root, table, &rows)?;
        if let Some(cache) = self.cache_write().as_mut() {
            cache.insert(table.to_string(), rows);
        }
        Ok(())
    }

    /// Parse every file under the root into a snapshot. The first file
    /// that fails aborts the scan; glob yields sorted paths, so the
    /// failure is deterministic.
    fn scan(&self) -> Result<Cache> {
        let pattern = format!("{}/*", self.root.display());
        let entries = glob::glob(&pattern)
            .map_err(|e| ShelfDbError::Environment(format!("glob error: {e}")))?;

        let mut snapshot = Cache::new();
        for path in entries.filter_map(|r| r.ok()).filter(|p| p.is_file()) {
            let file = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let text = std::fs::read_to_string(&path)?;
            match table_file::decode(&stem, &text) {
                Ok(rows) => {
                    snapshot.insert(stem, rows);
                }
                Err(message) => {
                    log::warn!("{file} failed validation: {message}");
                    return Err(ShelfDbError::LinkFailed(file));
                }
            }
        }
        Ok(snapshot)
    }

    /// One mutex per table name; mutating operations hold it across their
    /// read-modify-write cycle so in-process callers cannot lose updates.
    fn table_lock(&self, table: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .table_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(table.to_string()).or_default().clone()
    }

    fn cache_read(&self) -> RwLockReadGuard<'_, Option<Cache>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, Option<Cache>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A record matches when it carries every predicate field with an exactly
/// equal value. No coercion: `1` and `"1"` differ, `"Done"` and `"done"`
/// differ.
fn matches(row: &Record, predicate: &Record) -> bool {
    predicate
        .iter()
        .all(|(field, expected)| row.get(field) == Some(expected))
}

/// Search text for a value: strings as-is, everything else in its JSON
/// rendering.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
