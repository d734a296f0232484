//! SQLite-backed admin password hash lookup.
//!
//! The hash lives in a single row: `admin_password.id = 1`.

use std::path::Path;

use admin_auth::{AuthError, HashStore};
use rusqlite::{Connection, OpenFlags, OptionalExtension};

const ADMIN_ROW_ID: i64 = 1;

/// Reads the stored hash from a SQLite file on every lookup, so an
/// out-of-band rotation takes effect without a restart.
#[derive(Debug, Clone)]
pub struct SqliteHashStore {
    db_path: String,
}

impl SqliteHashStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_string_lossy().into_owned(),
        }
    }

    fn open_connection(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
    }

    fn fetch(&self) -> Result<Option<String>, rusqlite::Error> {
        let conn = self.open_connection()?;
        conn.query_row(
            "SELECT password_hash FROM admin_password WHERE id = ?",
            [ADMIN_ROW_ID],
            |row| row.get(0),
        )
        .optional()
    }
}

impl HashStore for SqliteHashStore {
    fn password_hash(&self) -> admin_auth::Result<String> {
        match self.fetch() {
            Ok(Some(hash)) => Ok(hash),
            Ok(None) => Err(AuthError::Store(format!(
                "no admin_password row in {}",
                self.db_path
            ))),
            Err(e) => Err(AuthError::Store(format!("{}: {}", self.db_path, e))),
        }
    }
}

/// SQL an operator can run by hand to rotate the stored hash.
pub fn update_statement(hash: &str) -> String {
    format!("UPDATE admin_password SET password_hash = '{hash}' WHERE id = {ADMIN_ROW_ID};")
}

/// Create the table if needed and store `hash` as the admin password.
pub fn write_password_hash<P: AsRef<Path>>(db_path: P, hash: &str) -> Result<(), rusqlite::Error> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS admin_password (
            id INTEGER PRIMARY KEY,
            password_hash TEXT NOT NULL,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    conn.execute(
        r#"
        INSERT INTO admin_password (id, password_hash) VALUES (?1, ?2)
        ON CONFLICT(id) DO UPDATE SET
            password_hash = excluded.password_hash,
            updated_at = CURRENT_TIMESTAMP
        "#,
        rusqlite::params![ADMIN_ROW_ID, hash],
    )?;
    log::info!("Stored admin password hash in {}", conn.path().unwrap_or("<memory>"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_then_read() {
        let db = NamedTempFile::new().unwrap();
        write_password_hash(db.path(), "1000$AAAA$BBBB").unwrap();

        let store = SqliteHashStore::new(db.path());
        assert_eq!(store.password_hash().unwrap(), "1000$AAAA$BBBB");
    }

    #[test]
    fn test_rotation_replaces_row() {
        let db = NamedTempFile::new().unwrap();
        write_password_hash(db.path(), "1000$AAAA$BBBB").unwrap();
        write_password_hash(db.path(), "2000$CCCC$DDDD").unwrap();

        let conn = Connection::open(db.path()).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM admin_password", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let store = SqliteHashStore::new(db.path());
        assert_eq!(store.password_hash().unwrap(), "2000$CCCC$DDDD");
    }

    #[test]
    fn test_missing_row_is_store_error() {
        let db = NamedTempFile::new().unwrap();
        let conn = Connection::open(db.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE admin_password (id INTEGER PRIMARY KEY, password_hash TEXT NOT NULL);",
        )
        .unwrap();

        let store = SqliteHashStore::new(db.path());
        assert!(matches!(store.password_hash(), Err(AuthError::Store(_))));
    }

    #[test]
    fn test_update_statement_runs_against_minimal_schema() {
        let db = NamedTempFile::new().unwrap();
        let conn = Connection::open(db.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE admin_password (id INTEGER PRIMARY KEY, password_hash TEXT NOT NULL);
             INSERT INTO admin_password (id, password_hash) VALUES (1, 'old');",
        )
        .unwrap();

        conn.execute_batch(&update_statement("1000$AAAA$BBBB")).unwrap();

        let store = SqliteHashStore::new(db.path());
        assert_eq!(store.password_hash().unwrap(), "1000$AAAA$BBBB");
    }

    #[test]
    fn test_missing_file_is_store_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteHashStore::new(dir.path().join("absent.db"));
        assert!(matches!(store.password_hash(), Err(AuthError::Store(_))));
    }
}
