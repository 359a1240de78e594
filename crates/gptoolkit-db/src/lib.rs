//! Database layer for gptoolkit.
//!
//! Provides a `Database` struct that owns the SQLite connection and hands
//! out the parameter store. The schema has four tables: `prompts`, `engines`,
//! `use_cases` and `parameters`, where every parameter row links exactly one
//! row of each of the other three.

mod parameters;

pub use parameters::{NewParameter, ParameterFilter, ParameterRecord, Parameters, TextMatch};

/// Errors surfaced by the store. Storage faults are never retried.
pub use rusqlite::Error as DbError;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Directory name under the home directory holding gptoolkit data.
pub const APP_DIR_NAME: &str = ".gptoolkit";

/// File name of the SQLite database inside the data directory.
pub const DB_FILE_NAME: &str = "gptoolkit.db";

/// The main database struct that owns the SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at a specific path.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        debug!(path = %path.display(), "Opening prompt database");
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Access the parameters store.
    ///
    /// The returned store holds the connection lock until dropped.
    pub fn parameters(&self) -> Parameters<'_> {
        let conn = self.conn.lock().expect("Database lock poisoned");
        Parameters::new(conn)
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> Result<(), DbError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS prompts (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS engines (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                api_key TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS use_cases (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS parameters (
                id INTEGER PRIMARY KEY,
                prompt_id INTEGER NOT NULL REFERENCES prompts(id),
                engine_id INTEGER NOT NULL REFERENCES engines(id),
                use_case_id INTEGER NOT NULL REFERENCES use_cases(id),
                max_tokens INTEGER NOT NULL,
                temperature REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_parameters_prompt_id ON parameters(prompt_id);
            CREATE INDEX IF NOT EXISTS idx_parameters_engine_id ON parameters(engine_id);
            CREATE INDEX IF NOT EXISTS idx_parameters_use_case_id ON parameters(use_case_id);
            "#,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summarize() -> NewParameter {
        NewParameter::new(
            "Summarize: ",
            "text-davinci-003",
            "sk-test",
            "summarization",
            "Condense long text",
        )
    }

    #[test]
    fn test_insert_and_query_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let new = summarize().with_max_tokens(100).with_temperature(0.3);

        db.parameters().insert(&new).unwrap();

        let records = db
            .parameters()
            .query(&ParameterFilter {
                engine_name: Some(TextMatch::Exact("text-davinci-003".to_string())),
                use_case_name: Some(TextMatch::Exact("summarization".to_string())),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.prompt_text, "Summarize: ");
        assert_eq!(record.engine_name, "text-davinci-003");
        assert_eq!(record.api_key, "sk-test");
        assert_eq!(record.use_case_name, "summarization");
        assert_eq!(record.use_case_description, "Condense long text");
        assert_eq!(record.max_tokens, 100);
        assert_eq!(record.temperature, 0.3);
    }

    #[test]
    fn test_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.parameters().insert(&summarize()).unwrap();

        let records = db.parameters().query(&ParameterFilter::default()).unwrap();
        assert_eq!(records[0].max_tokens, 256);
        assert_eq!(records[0].temperature, 0.5);
    }

    #[test]
    fn test_insert_creates_one_row_per_table() {
        let db = Database::open_in_memory().unwrap();
        let id = db.parameters().insert(&summarize()).unwrap();
        assert_eq!(id, 1);

        let conn = db.conn.lock().unwrap();
        for table in ["prompts", "engines", "use_cases", "parameters"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 1, "table {}", table);
        }
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();

        let result = conn.execute(
            "INSERT INTO parameters (prompt_id, engine_id, use_case_id, max_tokens, temperature) VALUES (42, 42, 42, 10, 0.1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_open_at_creates_file_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE_NAME);

        {
            let db = Database::open_at(&path).unwrap();
            db.parameters().insert(&summarize()).unwrap();
        }
        assert!(path.exists());

        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(reopened.parameters().count().unwrap(), 1);
    }
}
