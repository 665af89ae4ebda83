// Path resolution - platform data directory, database root, table files

use crate::error::{Result, ShelfDbError};
use std::env;
use std::path::{Path, PathBuf};

/// Fixed subdirectory of the application data directory that holds the
/// table files.
pub const DATABASE_DIR: &str = "Database";

/// Per-platform application data directory for the given app name:
/// `%APPDATA%\<app>` on Windows, `~/Library/Application Support/<app>` on
/// macOS, `/var/local/<app>` everywhere else.
pub fn data_dir(app: &str) -> Result<PathBuf> {
    if cfg!(windows) {
        let base = env::var_os("APPDATA")
            .ok_or_else(|| ShelfDbError::Environment("APPDATA is not set".into()))?;
        Ok(PathBuf::from(base).join(app))
    } else if cfg!(target_os = "macos") {
        let home = env::var_os("HOME")
            .ok_or_else(|| ShelfDbError::Environment("HOME is not set".into()))?;
        Ok(PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join(app))
    } else {
        Ok(Path::new("/var/local").join(app))
    }
}

/// Default database root for the given app name.
pub fn database_root(app: &str) -> Result<PathBuf> {
    Ok(data_dir(app)?.join(DATABASE_DIR))
}

/// File path for a table under a database root. Pure; performs no I/O and
/// no validation of the table name (callers supply filesystem-safe names).
pub fn table_file(root: &Path, table: &str) -> PathBuf {
    root.join(format!("{table}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_file_appends_json_extension() {
        let path = table_file(Path::new("/tmp/db"), "items");
        assert_eq!(path, PathBuf::from("/tmp/db/items.json"));
    }

    #[test]
    fn database_root_ends_with_app_and_database() {
        let root = database_root("craftbench").unwrap();
        assert!(root.ends_with(Path::new("craftbench").join(DATABASE_DIR)));
    }

    #[test]
    fn table_file_is_deterministic() {
        let root = Path::new("/tmp/db");
        assert_eq!(table_file(root, "recipes"), table_file(root, "recipes"));
    }
}
