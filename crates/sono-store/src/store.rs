use std::path::Path;

use rusqlite::{Connection, params};

use sono_core::{Signature, SpeciesLibrary, SpeciesRecord, SpeciesStats};

use crate::error::Result;
use crate::schema;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!(path = %path.display(), "opened species store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn species_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM species", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    // --- Save ---

    /// Replace the stored library with `library`.
    pub fn save_library(&self, library: &SpeciesLibrary) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("DELETE FROM signatures; DELETE FROM species;")?;
        for record in library.species() {
            save_species_on(&tx, record)?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('saved_at', ?1)",
            [sono_core::time::now_iso8601()],
        )?;
        tx.commit()?;
        tracing::debug!(species = library.len(), "saved species library");
        Ok(())
    }

    /// Insert or replace one species and all of its signatures.
    pub fn save_species(&self, record: &SpeciesRecord) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        save_species_on(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    // --- Load ---

    /// Load every species. A store that holds no species yields the seeded
    /// default library.
    pub fn load_library(&self) -> Result<SpeciesLibrary> {
        if self.species_count()? == 0 {
            tracing::info!("species store is empty, seeding default species");
            return Ok(SpeciesLibrary::new());
        }

        let mut library = SpeciesLibrary::empty();
        let mut stmt = self.conn.prepare(
            "SELECT id, name, scientific_name, category, description, freq_low, freq_high,
                    typical_duration, date_added, tags
             FROM species ORDER BY id",
        )?;
        let rows: Vec<SpeciesRow> = stmt
            .query_map([], |row| {
                Ok(SpeciesRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    scientific_name: row.get(2)?,
                    category: row.get(3)?,
                    description: row.get(4)?,
                    frequency_range: [row.get(5)?, row.get(6)?],
                    typical_duration: row.get(7)?,
                    date_added: row.get(8)?,
                    tags: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        for row in rows {
            let signatures = self.load_signatures(&row.id)?;
            let mut record = SpeciesRecord {
                tags: serde_json::from_str(&row.tags)?,
                id: row.id,
                name: row.name,
                scientific_name: row.scientific_name,
                category: row.category,
                description: row.description,
                frequency_range: row.frequency_range,
                typical_duration: row.typical_duration,
                signatures,
                stats: SpeciesStats::default(),
                date_added: row.date_added,
            };
            record.recompute_stats();
            library.insert_record(record);
        }

        tracing::debug!(species = library.len(), "loaded species library");
        Ok(library)
    }

    fn load_signatures(&self, species_id: &str) -> Result<Vec<Signature>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM signatures WHERE species_id = ?1 ORDER BY rowid")?;
        let payloads: Vec<String> = stmt
            .query_map([species_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(Into::into))
            .collect()
    }
}

struct SpeciesRow {
    id: String,
    name: String,
    scientific_name: Option<String>,
    category: String,
    description: String,
    frequency_range: [f64; 2],
    typical_duration: f64,
    date_added: String,
    tags: String,
}

fn save_species_on(conn: &Connection, record: &SpeciesRecord) -> Result<()> {
    conn.execute("DELETE FROM signatures WHERE species_id = ?1", [&record.id])?;
    conn.execute(
        "INSERT OR REPLACE INTO species
            (id, name, scientific_name, category, description, freq_low, freq_high,
             typical_duration, date_added, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.id,
            record.name,
            record.scientific_name,
            record.category,
            record.description,
            record.frequency_range[0],
            record.frequency_range[1],
            record.typical_duration,
            record.date_added,
            serde_json::to_string(&record.tags)?,
        ],
    )?;

    let mut insert = conn.prepare(
        "INSERT INTO signatures (id, species_id, timestamp, payload) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for sig in &record.signatures {
        insert.execute(params![
            sig.id.to_string(),
            record.id,
            sig.timestamp,
            serde_json::to_string(sig)?,
        ])?;
    }
    Ok(())
}
