//! SQLite corpus provider.
//!
//! Reads the pipeline's database: a technique-description table
//! (`technique_id`, `name`, `description`) as the reference collection
//! and a synthetic-sample table (`technique_id`, `name`, `text`) as
//! the query collection. Sample rows are not unique per technique, so
//! query records take their identity from the rowid.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use techsim_types::{validate_collection, CorpusSettings, TextRecord};

use crate::error::CorpusError;
use crate::provider::CorpusProvider;

/// Corpus provider over the SQLite database.
#[derive(Debug)]
pub struct SqliteCorpus {
    conn: Connection,
    path: PathBuf,
    reference_table: String,
    query_table: String,
}

impl SqliteCorpus {
    /// Open the corpus database read-only.
    ///
    /// A missing or unopenable file fails with
    /// `CorpusError::Unavailable`.
    pub fn open(path: &Path, settings: &CorpusSettings) -> Result<Self, CorpusError> {
        if !path.exists() {
            return Err(CorpusError::Unavailable(format!(
                "no such database: {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|e| CorpusError::Unavailable(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            reference_table: settings.reference_table.clone(),
            query_table: settings.query_table.clone(),
        })
    }

    /// Open using the path configured in `settings`.
    pub fn open_configured(settings: &CorpusSettings) -> Result<Self, CorpusError> {
        Self::open(Path::new(&settings.db_path), settings)
    }

    fn fetch_reference_rows(&self) -> Result<Vec<TextRecord>, CorpusError> {
        let sql = format!(
            "SELECT technique_id, name, description FROM {} ORDER BY technique_id",
            self.reference_table
        );
        let mut stmt = self.conn.prepare(&sql).map_err(|e| {
            CorpusError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let records = stmt
            .query_map([], |row| {
                Ok(TextRecord::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn fetch_query_rows(&self) -> Result<Vec<TextRecord>, CorpusError> {
        let sql = format!(
            "SELECT rowid, technique_id, name, text FROM {} ORDER BY rowid",
            self.query_table
        );
        let mut stmt = self.conn.prepare(&sql).map_err(|e| {
            CorpusError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let records = stmt
            .query_map([], |row| {
                let rowid: i64 = row.get(0)?;
                let technique_id: String = row.get(1)?;
                let name: String = row.get(2)?;
                let text: String = row.get(3)?;
                Ok(TextRecord::new(
                    format!("S{}", rowid),
                    format!("{} ({})", name, technique_id),
                    text,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl CorpusProvider for SqliteCorpus {
    fn fetch_reference_texts(&self) -> Result<Vec<TextRecord>, CorpusError> {
        let records = self.fetch_reference_rows()?;
        validate_collection(&records)?;
        debug!(
            count = records.len(),
            table = %self.reference_table,
            "Fetched reference texts"
        );
        Ok(records)
    }

    fn fetch_query_texts(&self) -> Result<Vec<TextRecord>, CorpusError> {
        let records = self.fetch_query_rows()?;
        validate_collection(&records)?;
        debug!(
            count = records.len(),
            table = %self.query_table,
            "Fetched query texts"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mitre_technique_descriptions (
                 technique_id TEXT PRIMARY KEY,
                 name TEXT,
                 description TEXT
             );
             CREATE TABLE synthetic_texts (
                 technique_id TEXT,
                 name TEXT,
                 text TEXT
             );
             INSERT INTO mitre_technique_descriptions VALUES
                 ('T1566', 'Phishing', 'Adversaries may send phishing messages.'),
                 ('T1059', 'Command and Scripting Interpreter', 'Adversaries may abuse interpreters.');
             INSERT INTO synthetic_texts VALUES
                 ('T1566', 'Phishing', 'Employees received a convincing invoice email.'),
                 ('T1566', 'Phishing', 'A link in the message led to a fake login page.');",
        )
        .unwrap();
    }

    fn open_seeded(dir: &TempDir) -> SqliteCorpus {
        let path = dir.path().join("corpus.db");
        seed_db(&path);
        SqliteCorpus::open(&path, &CorpusSettings::default()).unwrap()
    }

    #[test]
    fn test_fetch_reference_texts() {
        let dir = TempDir::new().unwrap();
        let corpus = open_seeded(&dir);

        let records = corpus.fetch_reference_texts().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_id, "T1059");
        assert_eq!(records[1].entity_id, "T1566");
        assert_eq!(records[1].label, "Phishing");
        assert!(records[1].content.contains("phishing messages"));
    }

    #[test]
    fn test_fetch_query_texts_have_unique_ids() {
        let dir = TempDir::new().unwrap();
        let corpus = open_seeded(&dir);

        let records = corpus.fetch_query_texts().unwrap();
        assert_eq!(records.len(), 2);
        // Two samples for the same technique still get distinct ids.
        assert_eq!(records[0].entity_id, "S1");
        assert_eq!(records[1].entity_id, "S2");
        assert!(records[0].label.contains("T1566"));
    }

    #[test]
    fn test_missing_database_is_unavailable() {
        let err = SqliteCorpus::open(
            Path::new("/nonexistent/corpus.db"),
            &CorpusSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CorpusError::Unavailable(_)));
    }

    #[test]
    fn test_missing_table_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.db");
        Connection::open(&path).unwrap(); // empty database

        let corpus = SqliteCorpus::open(&path, &CorpusSettings::default()).unwrap();
        let err = corpus.fetch_reference_texts().unwrap_err();
        assert!(matches!(err, CorpusError::Unavailable(_)));
    }

    #[test]
    fn test_empty_tables_are_empty_collections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mitre_technique_descriptions (
                 technique_id TEXT PRIMARY KEY, name TEXT, description TEXT
             );
             CREATE TABLE synthetic_texts (technique_id TEXT, name TEXT, text TEXT);",
        )
        .unwrap();
        drop(conn);

        let corpus = SqliteCorpus::open(&path, &CorpusSettings::default()).unwrap();
        assert!(corpus.fetch_reference_texts().unwrap().is_empty());
        assert!(corpus.fetch_query_texts().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_reference_id_is_invalid_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.db");
        let conn = Connection::open(&path).unwrap();
        // No PRIMARY KEY constraint, so duplicates can appear.
        conn.execute_batch(
            "CREATE TABLE mitre_technique_descriptions (
                 technique_id TEXT, name TEXT, description TEXT
             );
             INSERT INTO mitre_technique_descriptions VALUES
                 ('T1566', 'Phishing', 'a'),
                 ('T1566', 'Phishing', 'b');",
        )
        .unwrap();
        drop(conn);

        let corpus = SqliteCorpus::open(&path, &CorpusSettings::default()).unwrap();
        let err = corpus.fetch_reference_texts().unwrap_err();
        assert!(matches!(err, CorpusError::InvalidRecord(_)));
    }
}
