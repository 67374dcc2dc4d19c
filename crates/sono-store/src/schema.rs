use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // In-memory databases legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS species (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            scientific_name  TEXT,
            category         TEXT NOT NULL,
            description      TEXT NOT NULL DEFAULT '',
            freq_low         REAL NOT NULL,
            freq_high        REAL NOT NULL,
            typical_duration REAL NOT NULL,
            date_added       TEXT NOT NULL DEFAULT '',
            tags             TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS signatures (
            id         TEXT PRIMARY KEY,
            species_id TEXT NOT NULL REFERENCES species(id) ON DELETE CASCADE,
            timestamp  TEXT NOT NULL,
            payload    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sig_species ON signatures(species_id);
        CREATE INDEX IF NOT EXISTS idx_species_category ON species(category);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &["metadata", "species", "signatures"] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_signatures_cascade_with_species() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO species (id, name, category, freq_low, freq_high, typical_duration)
             VALUES ('wren', 'Wren', 'bird', 2000, 8000, 2);
             INSERT INTO signatures (id, species_id, timestamp, payload)
             VALUES ('s1', 'wren', '', '{}');
             DELETE FROM species WHERE id = 'wren';",
        )
        .unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM signatures", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_signature_requires_species() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let res = conn.execute(
            "INSERT INTO signatures (id, species_id, timestamp, payload)
             VALUES ('s1', 'ghost', '', '{}')",
            [],
        );
        assert!(res.is_err(), "foreign key should reject orphan signature");
    }
}
